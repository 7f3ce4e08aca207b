use std::sync::Arc;

use course_core::model::{CourseId, Enrollment, LearnerContext, LearnerId};
use serde::Serialize;
use storage::repository::{EnrollmentRepository, StorageError};

use crate::Clock;
use crate::course_tree::{CourseOverview, CourseTreeService};
use crate::error::{EnrollmentError, ProgressError};

/// One row of a learner's dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledCourse {
    pub enrollment: Enrollment,
    pub overview: CourseOverview,
}

/// Enrolls learners in courses and lists what they are enrolled in.
#[derive(Clone)]
pub struct EnrollmentService {
    clock: Clock,
    enrollments: Arc<dyn EnrollmentRepository>,
    trees: CourseTreeService,
}

impl EnrollmentService {
    #[must_use]
    pub fn new(
        clock: Clock,
        enrollments: Arc<dyn EnrollmentRepository>,
        trees: CourseTreeService,
    ) -> Self {
        Self {
            clock,
            enrollments,
            trees,
        }
    }

    /// Enroll the acting learner. Returns `false` if already enrolled.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::NotPermitted` for staff roles.
    /// Returns `EnrollmentError::CourseNotFound` for an unknown course.
    /// Returns `EnrollmentError::Storage` if persistence fails.
    pub async fn enroll(
        &self,
        ctx: &LearnerContext,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentError> {
        if !ctx.can_record_progress() {
            return Err(EnrollmentError::NotPermitted(ctx.role));
        }

        let created = self
            .enrollments
            .enroll(ctx.learner_id, course_id, self.clock.now())
            .await
            .map_err(|err| match err {
                StorageError::Conflict => EnrollmentError::CourseNotFound(course_id),
                other => EnrollmentError::Storage(other),
            })?;

        if created {
            tracing::info!(learner_id = %ctx.learner_id, course_id = %course_id, "learner enrolled");
        }
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns `EnrollmentError::Storage` if repository access fails.
    pub async fn is_enrolled(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<bool, EnrollmentError> {
        Ok(self
            .enrollments
            .get_enrollment(learner_id, course_id)
            .await?
            .is_some())
    }

    /// Enrolled courses with the learner's progress, newest enrollment first.
    ///
    /// Enrollments whose course no longer exists are skipped.
    ///
    /// # Errors
    ///
    /// Returns `EnrollmentError::Storage` or `EnrollmentError::Progress` if
    /// enrollments or course trees cannot be read.
    pub async fn list_enrolled(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<EnrolledCourse>, EnrollmentError> {
        let enrollments = self.enrollments.enrollments_for_learner(learner_id).await?;

        let mut out = Vec::with_capacity(enrollments.len());
        for enrollment in enrollments {
            match self
                .trees
                .load_overview(enrollment.course_id, Some(learner_id))
                .await
            {
                Ok(overview) => out.push(EnrolledCourse {
                    enrollment,
                    overview,
                }),
                Err(ProgressError::CourseNotFound(course_id)) => {
                    tracing::warn!(learner_id = %learner_id, course_id = %course_id, "enrollment references missing course");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::{Course, CourseMetadata, Role};
    use course_core::time::{fixed_clock, fixed_now};
    use storage::repository::{CourseRepository, InMemoryRepository, NewCourseRecord};

    fn service(repo: &InMemoryRepository) -> EnrollmentService {
        let trees = CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        );
        EnrollmentService::new(fixed_clock(), Arc::new(repo.clone()), trees)
    }

    async fn course(repo: &InMemoryRepository, title: &str) -> CourseId {
        let course = Course::new(
            CourseId::new(1),
            title,
            None,
            CourseMetadata::default(),
            fixed_now(),
        )
        .unwrap();
        repo.insert_new_course(NewCourseRecord::from_course(&course))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn enroll_is_idempotent() {
        let repo = InMemoryRepository::new();
        let course_id = course(&repo, "Rust").await;
        let ctx = LearnerContext::student(LearnerId::new(1));
        let service = service(&repo);

        assert!(service.enroll(&ctx, course_id).await.unwrap());
        assert!(!service.enroll(&ctx, course_id).await.unwrap());
        assert!(service.is_enrolled(ctx.learner_id, course_id).await.unwrap());
        assert!(
            !service
                .is_enrolled(LearnerId::new(2), course_id)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn staff_cannot_enroll() {
        let repo = InMemoryRepository::new();
        let course_id = course(&repo, "Rust").await;
        let ctx = LearnerContext::new(LearnerId::new(1), Role::Admin);

        let err = service(&repo).enroll(&ctx, course_id).await.unwrap_err();
        assert!(matches!(err, EnrollmentError::NotPermitted(Role::Admin)));
    }

    #[tokio::test]
    async fn unknown_course_cannot_be_enrolled() {
        let repo = InMemoryRepository::new();
        let ctx = LearnerContext::student(LearnerId::new(1));

        let err = service(&repo)
            .enroll(&ctx, CourseId::new(404))
            .await
            .unwrap_err();
        assert!(matches!(err, EnrollmentError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn list_enrolled_carries_overviews() {
        let repo = InMemoryRepository::new();
        let first = course(&repo, "First").await;
        let second = course(&repo, "Second").await;
        let ctx = LearnerContext::student(LearnerId::new(7));
        let service = service(&repo);
        service.enroll(&ctx, first).await.unwrap();
        service.enroll(&ctx, second).await.unwrap();

        let listed = service.list_enrolled(ctx.learner_id).await.unwrap();
        let mut titles: Vec<&str> = listed.iter().map(|e| e.overview.course.title()).collect();
        titles.sort_unstable();
        assert_eq!(titles, vec!["First", "Second"]);
        assert!(listed.iter().all(|e| e.overview.stats.total_lessons == 0));
    }
}
