#![forbid(unsafe_code)]

pub mod app_services;
pub mod authoring_service;
pub mod completion;
pub mod course_tree;
pub mod enrollment_service;
pub mod error;

pub use course_core::Clock;

pub use app_services::AppServices;
pub use authoring_service::AuthoringService;
pub use completion::{CompletionOutcome, CompletionRecorder, LessonOpenHandler, LessonOpened};
pub use course_tree::{CourseOverview, CourseTreeService};
pub use enrollment_service::{EnrolledCourse, EnrollmentService};
pub use error::{AppServicesError, AuthoringError, EnrollmentError, ProgressError};
