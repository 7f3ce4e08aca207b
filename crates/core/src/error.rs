use thiserror::Error;

use crate::model::{ChapterError, CourseError, LessonError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Course(#[from] CourseError),
    #[error(transparent)]
    Chapter(#[from] ChapterError),
    #[error(transparent)]
    Lesson(#[from] LessonError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chapter, ChapterId, CourseId};

    fn build_chapter(title: &str) -> Result<Chapter, Error> {
        Ok(Chapter::new(ChapterId::new(1), CourseId::new(1), title, 0)?)
    }

    #[test]
    fn domain_errors_convert_into_crate_error() {
        let err = build_chapter(" ").unwrap_err();
        assert!(matches!(err, Error::Chapter(ChapterError::EmptyTitle)));
        assert_eq!(err.to_string(), "chapter title cannot be empty");
    }
}
