use std::collections::HashSet;
use std::sync::Arc;

use course_core::model::{
    Chapter, ChapterId, Course, CourseId, CourseMetadata, LearnerContext, LessonDraft, LessonId,
};
use course_core::tree::ChapterWithLessons;
use storage::repository::{
    CourseRepository, CurriculumRepository, NewChapterRecord, NewCourseRecord, NewLessonRecord,
    StorageError,
};

use crate::Clock;
use crate::error::AuthoringError;

/// Builds course curricula: courses, chapters appended in order, lessons
/// appended within a chapter, and lesson reordering.
#[derive(Clone)]
pub struct AuthoringService {
    clock: Clock,
    courses: Arc<dyn CourseRepository>,
    curriculum: Arc<dyn CurriculumRepository>,
}

impl AuthoringService {
    #[must_use]
    pub fn new(
        clock: Clock,
        courses: Arc<dyn CourseRepository>,
        curriculum: Arc<dyn CurriculumRepository>,
    ) -> Self {
        Self {
            clock,
            courses,
            curriculum,
        }
    }

    /// # Errors
    ///
    /// Returns `AuthoringError::NotPermitted` unless the role may author.
    /// Returns `AuthoringError::Course` for validation failures.
    /// Returns `AuthoringError::Storage` if persistence fails.
    pub async fn create_course(
        &self,
        ctx: &LearnerContext,
        title: String,
        description: Option<String>,
        metadata: CourseMetadata,
    ) -> Result<CourseId, AuthoringError> {
        ensure_author(ctx)?;
        let course = Course::new(
            CourseId::new(1),
            title,
            description,
            metadata,
            self.clock.now(),
        )?;
        let course_id = self
            .courses
            .insert_new_course(NewCourseRecord::from_course(&course))
            .await?;
        tracing::info!(course_id = %course_id, author = %ctx.learner_id, "course created");
        Ok(course_id)
    }

    /// Append a chapter after the course's last chapter.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::NotPermitted` unless the role may author.
    /// Returns `AuthoringError::CourseNotFound` for an unknown course.
    /// Returns `AuthoringError::Chapter` for validation failures.
    pub async fn add_chapter(
        &self,
        ctx: &LearnerContext,
        course_id: CourseId,
        title: String,
    ) -> Result<ChapterId, AuthoringError> {
        ensure_author(ctx)?;
        if self.courses.get_course(course_id).await?.is_none() {
            return Err(AuthoringError::CourseNotFound(course_id));
        }

        let rows = self.curriculum.chapters_with_lessons(course_id).await?;
        let order_index = next_index(rows.iter().map(|row| row.chapter.order_index()));
        let chapter = Chapter::new(ChapterId::new(1), course_id, title, order_index)?;

        let chapter_id = self
            .curriculum
            .insert_new_chapter(NewChapterRecord {
                course_id,
                title: chapter.title().to_owned(),
                order_index,
            })
            .await
            .map_err(|err| match err {
                StorageError::NotFound => AuthoringError::CourseNotFound(course_id),
                other => other.into(),
            })?;
        tracing::info!(course_id = %course_id, chapter_id = %chapter_id, order_index, "chapter added");
        Ok(chapter_id)
    }

    /// Append a lesson at the end of its chapter.
    ///
    /// The draft's `order_index` is ignored and replaced with the next free index.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::NotPermitted` unless the role may author.
    /// Returns `AuthoringError::ChapterNotFound` for an unknown chapter.
    /// Returns `AuthoringError::Lesson` for validation failures.
    pub async fn add_lesson(
        &self,
        ctx: &LearnerContext,
        mut draft: LessonDraft,
    ) -> Result<LessonId, AuthoringError> {
        ensure_author(ctx)?;
        let chapter_id = draft.chapter_id;
        let row = self.chapter_row(chapter_id).await?;
        draft.order_index = next_index(row.lessons.iter().map(|l| l.order_index()));

        // Surface validation errors before touching storage.
        draft.clone().validate(LessonId::new(1))?;

        let lesson_id = self
            .curriculum
            .insert_new_lesson(NewLessonRecord::from_draft(&draft))
            .await
            .map_err(|err| match err {
                StorageError::NotFound => AuthoringError::ChapterNotFound(chapter_id),
                other => other.into(),
            })?;
        tracing::info!(
            chapter_id = %chapter_id,
            lesson_id = %lesson_id,
            content_type = %draft.content_type,
            order_index = draft.order_index,
            "lesson added"
        );
        Ok(lesson_id)
    }

    /// Rewrite a chapter's lesson order to `0..n` following `order`.
    ///
    /// `order` must list every lesson of the chapter exactly once.
    ///
    /// # Errors
    ///
    /// Returns `AuthoringError::NotPermitted` unless the role may author.
    /// Returns `AuthoringError::ChapterNotFound` for an unknown chapter.
    /// Returns `AuthoringError::OrderMismatch` if `order` is not a permutation
    /// of the chapter's lessons.
    pub async fn reorder_lessons(
        &self,
        ctx: &LearnerContext,
        chapter_id: ChapterId,
        order: &[LessonId],
    ) -> Result<(), AuthoringError> {
        ensure_author(ctx)?;
        let row = self.chapter_row(chapter_id).await?;

        let existing: HashSet<LessonId> = row.lessons.iter().map(|l| l.id()).collect();
        let requested: HashSet<LessonId> = order.iter().copied().collect();
        if requested.len() != order.len() || requested != existing {
            return Err(AuthoringError::OrderMismatch(chapter_id));
        }

        let mut indexed = Vec::with_capacity(order.len());
        for (index, lesson_id) in order.iter().enumerate() {
            let index = i32::try_from(index).map_err(|_| AuthoringError::OrderMismatch(chapter_id))?;
            indexed.push((*lesson_id, index));
        }
        self.curriculum
            .set_lesson_order(chapter_id, &indexed)
            .await
            .map_err(|err| match err {
                StorageError::NotFound => AuthoringError::OrderMismatch(chapter_id),
                other => other.into(),
            })?;
        tracing::info!(chapter_id = %chapter_id, lessons = order.len(), "lessons reordered");
        Ok(())
    }

    async fn chapter_row(&self, chapter_id: ChapterId) -> Result<ChapterWithLessons, AuthoringError> {
        let chapter = self
            .curriculum
            .get_chapter(chapter_id)
            .await?
            .ok_or(AuthoringError::ChapterNotFound(chapter_id))?;
        let rows = self
            .curriculum
            .chapters_with_lessons(chapter.course_id())
            .await?;
        Ok(rows
            .into_iter()
            .find(|row| row.chapter.id() == chapter_id)
            .unwrap_or(ChapterWithLessons {
                chapter,
                rejected: Vec::new(),
                lessons: Vec::new(),
            }))
    }
}

fn ensure_author(ctx: &LearnerContext) -> Result<(), AuthoringError> {
    if ctx.role.can_author() {
        Ok(())
    } else {
        Err(AuthoringError::NotPermitted(ctx.role))
    }
}

/// One past the highest existing index, or 0 for an empty parent.
fn next_index(existing: impl Iterator<Item = i32>) -> i32 {
    existing.max().map_or(0, |max| max.saturating_add(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    use course_core::model::{ContentLocator, ContentType, LearnerId, LessonError, Role};
    use course_core::time::fixed_clock;
    use storage::repository::InMemoryRepository;

    fn service(repo: &InMemoryRepository) -> AuthoringService {
        AuthoringService::new(fixed_clock(), Arc::new(repo.clone()), Arc::new(repo.clone()))
    }

    fn teacher() -> LearnerContext {
        LearnerContext::new(LearnerId::new(100), Role::Teacher)
    }

    fn draft(chapter_id: ChapterId, title: &str) -> LessonDraft {
        LessonDraft {
            chapter_id,
            title: title.to_string(),
            content_type: ContentType::Video,
            locator: None,
            duration_minutes: Some(12),
            order_index: 99,
            mandatory: true,
        }
    }

    async fn course_with_chapter(service: &AuthoringService) -> (CourseId, ChapterId) {
        let course_id = service
            .create_course(&teacher(), "Rust".into(), None, CourseMetadata::default())
            .await
            .unwrap();
        let chapter_id = service
            .add_chapter(&teacher(), course_id, "Basics".into())
            .await
            .unwrap();
        (course_id, chapter_id)
    }

    #[tokio::test]
    async fn students_cannot_author() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .create_course(
                &LearnerContext::student(LearnerId::new(1)),
                "Rust".into(),
                None,
                CourseMetadata::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthoringError::NotPermitted(Role::Student)));
    }

    #[tokio::test]
    async fn chapters_are_appended_in_order() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (course_id, first) = course_with_chapter(&service).await;
        let second = service
            .add_chapter(&teacher(), course_id, "Traits".into())
            .await
            .unwrap();

        let rows = repo.chapters_with_lessons(course_id).await.unwrap();
        let order_of = |id: ChapterId| {
            rows.iter()
                .find(|r| r.chapter.id() == id)
                .unwrap()
                .chapter
                .order_index()
        };
        assert_eq!(order_of(first), 0);
        assert_eq!(order_of(second), 1);
    }

    #[tokio::test]
    async fn chapter_for_unknown_course_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .add_chapter(&teacher(), CourseId::new(5), "Lost".into())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthoringError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn lessons_are_appended_after_the_last_one() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (_, chapter_id) = course_with_chapter(&service).await;

        let a = service
            .add_lesson(&teacher(), draft(chapter_id, "A"))
            .await
            .unwrap();
        let b = service
            .add_lesson(&teacher(), draft(chapter_id, "B"))
            .await
            .unwrap();

        assert_eq!(repo.get_lesson(a).await.unwrap().unwrap().order_index(), 0);
        assert_eq!(repo.get_lesson(b).await.unwrap().unwrap().order_index(), 1);
    }

    #[tokio::test]
    async fn invalid_lesson_is_rejected_before_storage() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (course_id, chapter_id) = course_with_chapter(&service).await;

        let mut bad = draft(chapter_id, "  ");
        bad.locator = ContentLocator::from_parts(Some("https://example.com/a.mp4"), None).unwrap();
        let err = service.add_lesson(&teacher(), bad).await.unwrap_err();
        assert!(matches!(err, AuthoringError::Lesson(LessonError::EmptyTitle)));

        let rows = repo.chapters_with_lessons(course_id).await.unwrap();
        assert!(rows[0].lessons.is_empty());
    }

    #[tokio::test]
    async fn lesson_for_unknown_chapter_is_rejected() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .add_lesson(&teacher(), draft(ChapterId::new(8), "Nowhere"))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthoringError::ChapterNotFound(_)));
    }

    #[tokio::test]
    async fn reorder_rewrites_dense_indices() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (_, chapter_id) = course_with_chapter(&service).await;
        let mut ids = Vec::new();
        for title in ["A", "B", "C"] {
            ids.push(
                service
                    .add_lesson(&teacher(), draft(chapter_id, title))
                    .await
                    .unwrap(),
            );
        }

        let new_order = [ids[2], ids[0], ids[1]];
        service
            .reorder_lessons(&teacher(), chapter_id, &new_order)
            .await
            .unwrap();
        for (expected, id) in new_order.iter().enumerate() {
            let lesson = repo.get_lesson(*id).await.unwrap().unwrap();
            assert_eq!(lesson.order_index(), i32::try_from(expected).unwrap());
        }
    }

    #[tokio::test]
    async fn reorder_requires_every_lesson_once() {
        let repo = InMemoryRepository::new();
        let service = service(&repo);
        let (_, chapter_id) = course_with_chapter(&service).await;
        let a = service
            .add_lesson(&teacher(), draft(chapter_id, "A"))
            .await
            .unwrap();
        let b = service
            .add_lesson(&teacher(), draft(chapter_id, "B"))
            .await
            .unwrap();

        for order in [vec![a], vec![a, a], vec![a, b, LessonId::new(999)]] {
            let err = service
                .reorder_lessons(&teacher(), chapter_id, &order)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthoringError::OrderMismatch(_)));
        }
        assert_eq!(repo.get_lesson(b).await.unwrap().unwrap().order_index(), 1);
    }
}
