use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{ChapterId, CourseId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ChapterError {
    #[error("chapter title cannot be empty")]
    EmptyTitle,
}

/// Ordered grouping of lessons within a course.
///
/// `order_index` is expected to be unique per course. Gaps and duplicates are
/// tolerated; ties sort by id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    id: ChapterId,
    course_id: CourseId,
    title: String,
    order_index: i32,
}

impl Chapter {
    /// Creates a new Chapter.
    ///
    /// # Errors
    ///
    /// Returns `ChapterError::EmptyTitle` if title is empty or whitespace-only.
    pub fn new(
        id: ChapterId,
        course_id: CourseId,
        title: impl Into<String>,
        order_index: i32,
    ) -> Result<Self, ChapterError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(ChapterError::EmptyTitle);
        }
        Ok(Self {
            id,
            course_id,
            title: title.trim().to_owned(),
            order_index,
        })
    }

    #[must_use]
    pub fn id(&self) -> ChapterId {
        self.id
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn order_index(&self) -> i32 {
        self.order_index
    }
}
