use course_core::model::{CompletionRecord, LearnerId, LessonId};
use sqlx::{QueryBuilder, Sqlite};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_completion_row};
use crate::repository::{ProgressRepository, StorageError};

/// Upper bound on bound parameters per `IN (...)` lookup.
const LOOKUP_CHUNK: usize = 500;

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn completions_for_lessons(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let learner = id_to_i64("learner_id", learner_id.value())?;
        let mut out = Vec::new();

        for chunk in lesson_ids.chunks(LOOKUP_CHUNK) {
            let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
                "SELECT learner_id, lesson_id, is_completed, completed_at \
                 FROM student_lesson_progress WHERE learner_id = ",
            );
            qb.push_bind(learner);
            qb.push(" AND lesson_id IN (");
            let mut ids = qb.separated(", ");
            for id in chunk {
                ids.push_bind(id_to_i64("lesson_id", id.value())?);
            }
            ids.push_unseparated(")");

            let rows = qb.build().fetch_all(&self.pool).await.map_err(db_err)?;
            for row in &rows {
                out.push(map_completion_row(row)?);
            }
        }

        Ok(out)
    }

    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO student_lesson_progress (learner_id, lesson_id, is_completed, completed_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(learner_id, lesson_id) DO UPDATE SET
                is_completed = excluded.is_completed,
                completed_at = excluded.completed_at
            ",
        )
        .bind(id_to_i64("learner_id", record.learner_id.value())?)
        .bind(id_to_i64("lesson_id", record.lesson_id.value())?)
        .bind(i64::from(record.is_completed))
        .bind(record.completed_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }
}
