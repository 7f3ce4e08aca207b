//! Shared error types for the services crate.

use thiserror::Error;

use course_core::model::{ChapterError, ChapterId, CourseError, CourseId, LessonError, LessonId, Role};
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted while loading course trees or recording completion.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("lesson {0} not found")]
    LessonNotFound(LessonId),
    #[error(transparent)]
    Backend(#[from] StorageError),
}

impl ProgressError {
    /// True when the same call may succeed later without any change of input.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Backend(err) => err.is_transient(),
            Self::CourseNotFound(_) | Self::LessonNotFound(_) => false,
        }
    }

    /// True for unknown course or lesson ids.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::CourseNotFound(_) | Self::LessonNotFound(_) | Self::Backend(StorageError::NotFound)
        )
    }
}

/// Errors emitted by `EnrollmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EnrollmentError {
    #[error("role {0} cannot enroll in courses")]
    NotPermitted(Role),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AuthoringService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthoringError {
    #[error("role {0} cannot author courses")]
    NotPermitted(Role),
    #[error("course {0} not found")]
    CourseNotFound(CourseId),
    #[error("chapter {0} not found")]
    ChapterNotFound(ChapterId),
    #[error("lesson order must list every lesson of chapter {0} exactly once")]
    OrderMismatch(ChapterId),
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
