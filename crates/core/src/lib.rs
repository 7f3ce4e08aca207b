#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod stats;
pub mod time;
pub mod tree;

pub use error::Error;
pub use stats::{ContentCounts, CourseStats};
pub use time::Clock;
pub use tree::{
    ChapterNode, ChapterWithLessons, CompletionState, CourseTree, IntegrityWarning, LessonNode,
    RejectedLesson,
};
