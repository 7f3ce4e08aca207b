use std::collections::HashMap;

use course_core::model::{Chapter, ChapterId, ContentLocator, CourseId, Lesson, LessonId};
use course_core::tree::{ChapterWithLessons, RejectedLesson};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    chapter_id_from_i64, db_err, id_to_i64, lesson_id_from_i64, map_chapter_row, map_lesson_row,
    order_index_to_i64, ser,
};
use crate::repository::{CurriculumRepository, NewChapterRecord, NewLessonRecord, StorageError};

fn locator_columns(locator: Option<&ContentLocator>) -> (Option<String>, Option<String>) {
    match locator {
        Some(ContentLocator::Url(u)) => (Some(u.to_string()), None),
        Some(ContentLocator::StoredFile(key)) => (None, Some(key.clone())),
        None => (None, None),
    }
}

fn duration_to_i64(minutes: Option<u32>) -> Option<i64> {
    minutes.map(i64::from)
}

#[async_trait::async_trait]
impl CurriculumRepository for SqliteRepository {
    async fn insert_new_chapter(
        &self,
        record: NewChapterRecord,
    ) -> Result<ChapterId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO course_chapters (course_id, title, order_index)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(id_to_i64("course_id", record.course_id.value())?)
        .bind(record.title.trim())
        .bind(order_index_to_i64(record.order_index))
        .execute(&self.pool)
        .await
        .map_err(|e| match db_err(e) {
            StorageError::Conflict => StorageError::NotFound,
            other => other,
        })?;

        chapter_id_from_i64(res.last_insert_rowid())
    }

    async fn insert_new_lesson(&self, record: NewLessonRecord) -> Result<LessonId, StorageError> {
        let draft = record.draft;
        let (content_url, file_key) = locator_columns(draft.locator.as_ref());

        let res = sqlx::query(
            r"
            INSERT INTO course_lessons (
                chapter_id, title, content_type, content_url, file_key,
                duration_minutes, order_index, is_mandatory
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ",
        )
        .bind(id_to_i64("chapter_id", draft.chapter_id.value())?)
        .bind(draft.title.trim())
        .bind(draft.content_type.as_str())
        .bind(content_url)
        .bind(file_key)
        .bind(duration_to_i64(draft.duration_minutes))
        .bind(order_index_to_i64(draft.order_index))
        .bind(i64::from(draft.mandatory))
        .execute(&self.pool)
        .await
        .map_err(|e| match db_err(e) {
            StorageError::Conflict => StorageError::NotFound,
            other => other,
        })?;

        lesson_id_from_i64(res.last_insert_rowid())
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id AS chapter_id, course_id, title AS chapter_title, order_index AS chapter_order
            FROM course_chapters WHERE id = ?1
            ",
        )
        .bind(id_to_i64("chapter_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_chapter_row).transpose()
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT
                id AS lesson_id, chapter_id, title AS lesson_title, content_type,
                content_url, file_key, duration_minutes, order_index AS lesson_order, is_mandatory
            FROM course_lessons WHERE id = ?1
            ",
        )
        .bind(id_to_i64("lesson_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(|r| map_lesson_row(r, id)).transpose()
    }

    async fn chapters_with_lessons(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<ChapterWithLessons>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT
                c.id AS chapter_id, c.course_id, c.title AS chapter_title, c.order_index AS chapter_order,
                l.id AS lesson_id, l.title AS lesson_title, l.content_type, l.content_url, l.file_key,
                l.duration_minutes, l.order_index AS lesson_order, l.is_mandatory
            FROM course_chapters c
            LEFT JOIN course_lessons l ON l.chapter_id = c.id
            WHERE c.course_id = ?1
            ORDER BY c.order_index ASC, c.id ASC, l.order_index ASC, l.id ASC
            ",
        )
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut out: Vec<ChapterWithLessons> = Vec::new();
        let mut index_by_chapter: HashMap<ChapterId, usize> = HashMap::new();
        for row in &rows {
            let chapter = map_chapter_row(row)?;
            let slot = *index_by_chapter.entry(chapter.id()).or_insert_with(|| {
                out.push(ChapterWithLessons {
                    chapter,
                    rejected: Vec::new(),
                    lessons: Vec::new(),
                });
                out.len() - 1
            });

            // LEFT JOIN: chapters without lessons yield one row with NULL lesson columns.
            if let Some(raw_id) = row.try_get::<Option<i64>, _>("lesson_id").map_err(ser)? {
                let lesson_id = lesson_id_from_i64(raw_id)?;
                match map_lesson_row(row, lesson_id) {
                    Ok(lesson) => out[slot].lessons.push(lesson),
                    // Malformed rows are reported, not fatal.
                    Err(err) => out[slot].rejected.push(RejectedLesson {
                        lesson_id,
                        reason: err.to_string(),
                    }),
                }
            }
        }
        Ok(out)
    }

    async fn set_lesson_order(
        &self,
        chapter_id: ChapterId,
        order: &[(LessonId, i32)],
    ) -> Result<(), StorageError> {
        let chapter = id_to_i64("chapter_id", chapter_id.value())?;
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for (lesson_id, index) in order {
            let res = sqlx::query(
                r"
                UPDATE course_lessons SET order_index = ?1
                WHERE id = ?2 AND chapter_id = ?3
                ",
            )
            .bind(order_index_to_i64(*index))
            .bind(id_to_i64("lesson_id", lesson_id.value())?)
            .bind(chapter)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

            if res.rows_affected() == 0 {
                // Dropping the transaction rolls back the earlier updates.
                return Err(StorageError::NotFound);
            }
        }

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }
}
