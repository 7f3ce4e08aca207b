use chrono::{DateTime, Utc};
use course_core::model::{CourseId, Enrollment, LearnerId};

use super::SqliteRepository;
use super::mapping::{db_err, id_to_i64, map_enrollment_row};
use crate::repository::{EnrollmentRepository, StorageError};

#[async_trait::async_trait]
impl EnrollmentRepository for SqliteRepository {
    async fn enroll(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO course_enrollments (learner_id, course_id, enrolled_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(learner_id, course_id) DO NOTHING
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .bind(enrolled_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(res.rows_affected() > 0)
    }

    async fn get_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT learner_id, course_id, enrolled_at
            FROM course_enrollments
            WHERE learner_id = ?1 AND course_id = ?2
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .bind(id_to_i64("course_id", course_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(map_enrollment_row).transpose()
    }

    async fn enrollments_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT learner_id, course_id, enrolled_at
            FROM course_enrollments
            WHERE learner_id = ?1
            ORDER BY enrolled_at DESC, course_id ASC
            ",
        )
        .bind(id_to_i64("learner_id", learner_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter().map(map_enrollment_row).collect()
    }
}
