use course_core::model::{Course, CourseId};

use super::SqliteRepository;
use super::mapping::{course_id_from_i64, db_err, id_to_i64, map_course_row};
use crate::repository::{CourseRepository, NewCourseRecord, StorageError};

#[async_trait::async_trait]
impl CourseRepository for SqliteRepository {
    async fn insert_new_course(&self, record: NewCourseRecord) -> Result<CourseId, StorageError> {
        let course = record.course;
        let meta = course.metadata();

        let res = sqlx::query(
            r"
            INSERT INTO courses (title, description, level, language, thumbnail_url, welcome_video_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ",
        )
        .bind(course.title())
        .bind(course.description())
        .bind(meta.level())
        .bind(meta.language())
        .bind(meta.thumbnail_url().map(url::Url::as_str))
        .bind(meta.welcome_video_url().map(url::Url::as_str))
        .bind(course.created_at())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        course_id_from_i64(res.last_insert_rowid())
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, title, description, level, language, thumbnail_url, welcome_video_url, created_at
            FROM courses WHERE id = ?1
            ",
        )
        .bind(id_to_i64("course_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_course_row).transpose()
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, title, description, level, language, thumbnail_url, welcome_video_url, created_at
            FROM courses
            ORDER BY id ASC
            LIMIT ?1
            ",
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_course_row).collect()
    }
}
