use chrono::{DateTime, Utc};
use course_core::model::{
    Chapter, ChapterId, CompletionRecord, ContentLocator, ContentType, Course, CourseId,
    CourseMetadata, Enrollment, LearnerId, Lesson, LessonDraft, LessonId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

/// Maps driver errors: constraint violations become `Conflict`, everything
/// else is treated as a backend availability problem.
pub(crate) fn db_err(e: sqlx::Error) -> StorageError {
    match &e {
        sqlx::Error::Database(db)
            if db.is_unique_violation()
                || db.is_foreign_key_violation()
                || db.is_check_violation() =>
        {
            StorageError::Conflict
        }
        sqlx::Error::RowNotFound => StorageError::NotFound,
        _ => StorageError::Connection(e.to_string()),
    }
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn course_id_from_i64(v: i64) -> Result<CourseId, StorageError> {
    Ok(CourseId::new(i64_to_u64("course_id", v)?))
}

pub(crate) fn chapter_id_from_i64(v: i64) -> Result<ChapterId, StorageError> {
    Ok(ChapterId::new(i64_to_u64("chapter_id", v)?))
}

pub(crate) fn lesson_id_from_i64(v: i64) -> Result<LessonId, StorageError> {
    Ok(LessonId::new(i64_to_u64("lesson_id", v)?))
}

pub(crate) fn learner_id_from_i64(v: i64) -> Result<LearnerId, StorageError> {
    Ok(LearnerId::new(i64_to_u64("learner_id", v)?))
}

pub(crate) fn order_index_to_i64(v: i32) -> i64 {
    i64::from(v)
}

fn order_index_from_i64(field: &'static str, v: i64) -> Result<i32, StorageError> {
    i32::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn map_course_row(row: &SqliteRow) -> Result<Course, StorageError> {
    let metadata = CourseMetadata::new(
        row.try_get("level").map_err(ser)?,
        row.try_get("language").map_err(ser)?,
        row.try_get::<Option<String>, _>("thumbnail_url")
            .map_err(ser)?
            .as_deref(),
        row.try_get::<Option<String>, _>("welcome_video_url")
            .map_err(ser)?
            .as_deref(),
    )
    .map_err(ser)?;

    Course::new(
        course_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description").map_err(ser)?,
        metadata,
        row.try_get::<DateTime<Utc>, _>("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

/// Reads the chapter columns of a curriculum row (`chapter_*` aliases).
pub(crate) fn map_chapter_row(row: &SqliteRow) -> Result<Chapter, StorageError> {
    Chapter::new(
        chapter_id_from_i64(row.try_get::<i64, _>("chapter_id").map_err(ser)?)?,
        course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        row.try_get::<String, _>("chapter_title").map_err(ser)?,
        order_index_from_i64(
            "chapter order_index",
            row.try_get::<i64, _>("chapter_order").map_err(ser)?,
        )?,
    )
    .map_err(ser)
}

/// Reads the lesson columns of a curriculum row (`lesson_*` aliases).
pub(crate) fn map_lesson_row(row: &SqliteRow, id: LessonId) -> Result<Lesson, StorageError> {
    let content_url: Option<String> = row.try_get("content_url").map_err(ser)?;
    let file_key: Option<String> = row.try_get("file_key").map_err(ser)?;
    let locator =
        ContentLocator::from_parts(content_url.as_deref(), file_key.as_deref()).map_err(ser)?;

    let duration_minutes = row
        .try_get::<Option<i64>, _>("duration_minutes")
        .map_err(ser)?
        .map(|d| {
            u32::try_from(d)
                .map_err(|_| StorageError::Serialization(format!("invalid duration: {d}")))
        })
        .transpose()?;

    LessonDraft {
        chapter_id: chapter_id_from_i64(row.try_get::<i64, _>("chapter_id").map_err(ser)?)?,
        title: row.try_get::<String, _>("lesson_title").map_err(ser)?,
        content_type: ContentType::parse(
            row.try_get::<String, _>("content_type").map_err(ser)?.as_str(),
        ),
        locator,
        duration_minutes,
        order_index: order_index_from_i64(
            "lesson order_index",
            row.try_get::<i64, _>("lesson_order").map_err(ser)?,
        )?,
        mandatory: row.try_get::<i64, _>("is_mandatory").map_err(ser)? != 0,
    }
    .validate(id)
    .map_err(ser)
}

pub(crate) fn map_completion_row(row: &SqliteRow) -> Result<CompletionRecord, StorageError> {
    Ok(CompletionRecord {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        lesson_id: lesson_id_from_i64(row.try_get::<i64, _>("lesson_id").map_err(ser)?)?,
        is_completed: row.try_get::<i64, _>("is_completed").map_err(ser)? != 0,
        completed_at: row.try_get("completed_at").map_err(ser)?,
    })
}

pub(crate) fn map_enrollment_row(row: &SqliteRow) -> Result<Enrollment, StorageError> {
    Ok(Enrollment {
        learner_id: learner_id_from_i64(row.try_get::<i64, _>("learner_id").map_err(ser)?)?,
        course_id: course_id_from_i64(row.try_get::<i64, _>("course_id").map_err(ser)?)?,
        enrolled_at: row.try_get("enrolled_at").map_err(ser)?,
    })
}
