mod chapter;
mod completion;
mod course;
mod enrollment;
mod ids;
mod lesson;
mod role;

pub use ids::{ChapterId, CourseId, LearnerId, LessonId, ParseIdError};

pub use chapter::{Chapter, ChapterError};
pub use completion::{CompletionPolicy, CompletionRecord};
pub use course::{Course, CourseError, CourseMetadata};
pub use enrollment::Enrollment;
pub use lesson::{ContentBucket, ContentLocator, ContentType, Lesson, LessonDraft, LessonError};
pub use role::{LearnerContext, Role};
