use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::authoring_service::AuthoringService;
use crate::completion::{CompletionRecorder, LessonOpenHandler};
use crate::course_tree::CourseTreeService;
use crate::enrollment_service::EnrollmentService;
use crate::error::AppServicesError;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    course_trees: Arc<CourseTreeService>,
    recorder: Arc<CompletionRecorder>,
    lesson_open: Arc<LessonOpenHandler>,
    enrollment: Arc<EnrollmentService>,
    authoring: Arc<AuthoringService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over an already constructed backend.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        let course_trees = CourseTreeService::new(
            Arc::clone(&storage.courses),
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
        );
        let recorder = CompletionRecorder::new(
            clock,
            Arc::clone(&storage.curriculum),
            Arc::clone(&storage.progress),
        );
        let lesson_open = LessonOpenHandler::new(Arc::clone(&storage.curriculum), recorder.clone());
        let enrollment = EnrollmentService::new(
            clock,
            Arc::clone(&storage.enrollments),
            course_trees.clone(),
        );
        let authoring = AuthoringService::new(
            clock,
            Arc::clone(&storage.courses),
            Arc::clone(&storage.curriculum),
        );

        Self {
            course_trees: Arc::new(course_trees),
            recorder: Arc::new(recorder),
            lesson_open: Arc::new(lesson_open),
            enrollment: Arc::new(enrollment),
            authoring: Arc::new(authoring),
        }
    }

    #[must_use]
    pub fn course_trees(&self) -> Arc<CourseTreeService> {
        Arc::clone(&self.course_trees)
    }

    #[must_use]
    pub fn recorder(&self) -> Arc<CompletionRecorder> {
        Arc::clone(&self.recorder)
    }

    #[must_use]
    pub fn lesson_open(&self) -> Arc<LessonOpenHandler> {
        Arc::clone(&self.lesson_open)
    }

    #[must_use]
    pub fn enrollment(&self) -> Arc<EnrollmentService> {
        Arc::clone(&self.enrollment)
    }

    #[must_use]
    pub fn authoring(&self) -> Arc<AuthoringService> {
        Arc::clone(&self.authoring)
    }
}
