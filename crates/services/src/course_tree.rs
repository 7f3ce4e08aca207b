use std::sync::Arc;

use course_core::model::{Course, CourseId, LearnerId};
use course_core::{CompletionState, CourseStats, CourseTree, IntegrityWarning};
use serde::Serialize;
use storage::repository::{CourseRepository, CurriculumRepository, ProgressRepository};

use crate::error::ProgressError;

/// Course metadata, its tree and the statistics derived from it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseOverview {
    pub course: Course,
    pub tree: CourseTree,
    pub stats: CourseStats,
    /// Rows skipped while assembling the tree.
    pub warnings: Vec<IntegrityWarning>,
}

impl CourseOverview {
    /// True when completion could not be loaded and every lesson reads as incomplete.
    #[must_use]
    pub fn completion_unavailable(&self) -> bool {
        self.tree.completion() == CompletionState::Unavailable
    }
}

/// Loads a course's chapter/lesson tree merged with one learner's completion.
///
/// Read-only. A failed completion lookup degrades the result instead of
/// failing it.
#[derive(Clone)]
pub struct CourseTreeService {
    courses: Arc<dyn CourseRepository>,
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl CourseTreeService {
    #[must_use]
    pub fn new(
        courses: Arc<dyn CourseRepository>,
        curriculum: Arc<dyn CurriculumRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            courses,
            curriculum,
            progress,
        }
    }

    /// Course catalog ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::Backend` if courses cannot be read.
    pub async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, ProgressError> {
        Ok(self.courses.list_courses(limit).await?)
    }

    /// Load the ordered tree for a course.
    ///
    /// With `learner` set, lessons carry that learner's completion state;
    /// without it, every lesson is incomplete and the tree reports
    /// `CompletionState::NotRequested`.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::CourseNotFound` for an unknown course.
    /// Returns `ProgressError::Backend` if the course or its curriculum cannot be read.
    pub async fn load_tree(
        &self,
        course_id: CourseId,
        learner: Option<LearnerId>,
    ) -> Result<CourseTree, ProgressError> {
        let (_, tree, _) = self.load(course_id, learner).await?;
        Ok(tree)
    }

    /// Load the course, its tree and aggregate statistics in one call.
    ///
    /// # Errors
    ///
    /// Same as [`CourseTreeService::load_tree`].
    pub async fn load_overview(
        &self,
        course_id: CourseId,
        learner: Option<LearnerId>,
    ) -> Result<CourseOverview, ProgressError> {
        let (course, tree, warnings) = self.load(course_id, learner).await?;
        let stats = CourseStats::from_tree(&tree);
        Ok(CourseOverview {
            course,
            tree,
            stats,
            warnings,
        })
    }

    async fn load(
        &self,
        course_id: CourseId,
        learner: Option<LearnerId>,
    ) -> Result<(Course, CourseTree, Vec<IntegrityWarning>), ProgressError> {
        let (course, rows) = tokio::join!(
            self.courses.get_course(course_id),
            self.curriculum.chapters_with_lessons(course_id),
        );
        // A missing course wins over a failed curriculum read.
        let course = course?.ok_or(ProgressError::CourseNotFound(course_id))?;
        let rows = rows?;

        let (mut tree, warnings) = CourseTree::assemble(course_id, rows);
        for warning in &warnings {
            tracing::warn!(course_id = %course_id, ?warning, "skipped inconsistent curriculum row");
        }

        if let Some(learner_id) = learner {
            self.merge_completion(&mut tree, learner_id).await;
        }

        tracing::debug!(
            course_id = %course_id,
            chapters = tree.chapters().len(),
            lessons = tree.lessons().count(),
            completion = ?tree.completion(),
            "course tree loaded"
        );

        Ok((course, tree, warnings))
    }

    async fn merge_completion(&self, tree: &mut CourseTree, learner_id: LearnerId) {
        let lesson_ids = tree.lesson_ids();
        if lesson_ids.is_empty() {
            tree.apply_completion(&[]);
            return;
        }

        match self
            .progress
            .completions_for_lessons(learner_id, &lesson_ids)
            .await
        {
            Ok(records) => tree.apply_completion(&records),
            Err(err) => {
                tracing::warn!(
                    course_id = %tree.course_id(),
                    learner_id = %learner_id,
                    error = %err,
                    "completion lookup failed; showing all lessons as incomplete"
                );
                tree.mark_completion_unavailable();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use course_core::model::{
        Chapter, ChapterId, CompletionRecord, ContentType, CourseMetadata, Lesson, LessonDraft,
        LessonId,
    };
    use course_core::tree::ChapterWithLessons;
    use course_core::time::fixed_now;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use storage::repository::{
        InMemoryRepository, NewChapterRecord, NewCourseRecord, NewLessonRecord, StorageError,
    };

    struct FailingProgress;

    #[async_trait]
    impl ProgressRepository for FailingProgress {
        async fn completions_for_lessons(
            &self,
            _learner_id: LearnerId,
            _lesson_ids: &[LessonId],
        ) -> Result<Vec<CompletionRecord>, StorageError> {
            Err(StorageError::Connection("progress store offline".into()))
        }

        async fn upsert_completion(&self, _record: &CompletionRecord) -> Result<(), StorageError> {
            Err(StorageError::Connection("progress store offline".into()))
        }
    }

    struct OfflineCurriculum;

    #[async_trait]
    impl CurriculumRepository for OfflineCurriculum {
        async fn insert_new_chapter(
            &self,
            _chapter: NewChapterRecord,
        ) -> Result<ChapterId, StorageError> {
            Err(StorageError::Connection("curriculum store offline".into()))
        }

        async fn insert_new_lesson(
            &self,
            _lesson: NewLessonRecord,
        ) -> Result<LessonId, StorageError> {
            Err(StorageError::Connection("curriculum store offline".into()))
        }

        async fn get_chapter(&self, _id: ChapterId) -> Result<Option<Chapter>, StorageError> {
            Err(StorageError::Connection("curriculum store offline".into()))
        }

        async fn get_lesson(&self, _id: LessonId) -> Result<Option<Lesson>, StorageError> {
            Err(StorageError::Connection("curriculum store offline".into()))
        }

        async fn chapters_with_lessons(
            &self,
            _course_id: CourseId,
        ) -> Result<Vec<ChapterWithLessons>, StorageError> {
            Err(StorageError::Connection("curriculum store offline".into()))
        }

        async fn set_lesson_order(
            &self,
            _chapter_id: ChapterId,
            _order: &[(LessonId, i32)],
        ) -> Result<(), StorageError> {
            Err(StorageError::Connection("curriculum store offline".into()))
        }
    }

    /// Counts lookups and the ids each one asked for.
    #[derive(Default)]
    struct CountingProgress {
        calls: AtomicUsize,
        requested: std::sync::Mutex<Vec<LessonId>>,
    }

    #[async_trait]
    impl ProgressRepository for CountingProgress {
        async fn completions_for_lessons(
            &self,
            learner_id: LearnerId,
            lesson_ids: &[LessonId],
        ) -> Result<Vec<CompletionRecord>, StorageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requested.lock().unwrap().extend_from_slice(lesson_ids);
            Ok(lesson_ids
                .first()
                .map(|id| CompletionRecord::completed(learner_id, *id, fixed_now()))
                .into_iter()
                .collect())
        }

        async fn upsert_completion(&self, _record: &CompletionRecord) -> Result<(), StorageError> {
            Ok(())
        }
    }

    async fn seed(repo: &InMemoryRepository, lessons_per_chapter: &[usize]) -> CourseId {
        let course = Course::new(
            CourseId::new(1),
            "Tree",
            None,
            CourseMetadata::default(),
            fixed_now(),
        )
        .unwrap();
        let course_id = repo
            .insert_new_course(NewCourseRecord::from_course(&course))
            .await
            .unwrap();

        // Insert chapters in reverse so storage order differs from display order.
        for (chapter_index, count) in lessons_per_chapter.iter().enumerate().rev() {
            let chapter_id = repo
                .insert_new_chapter(NewChapterRecord {
                    course_id,
                    title: format!("Chapter {chapter_index}"),
                    order_index: i32::try_from(chapter_index).unwrap(),
                })
                .await
                .unwrap();
            for lesson_index in (0..*count).rev() {
                insert_lesson(repo, chapter_id, lesson_index).await;
            }
        }
        course_id
    }

    async fn insert_lesson(repo: &InMemoryRepository, chapter_id: ChapterId, index: usize) {
        let draft = LessonDraft {
            chapter_id,
            title: format!("Lesson {index}"),
            content_type: ContentType::Pdf,
            locator: None,
            duration_minutes: Some(10),
            order_index: i32::try_from(index).unwrap(),
            mandatory: true,
        };
        repo.insert_new_lesson(NewLessonRecord::from_draft(&draft))
            .await
            .unwrap();
    }

    fn service(repo: &InMemoryRepository) -> CourseTreeService {
        CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
        )
    }

    #[tokio::test]
    async fn list_courses_is_ordered_by_id() {
        let repo = InMemoryRepository::new();
        let first = seed(&repo, &[1]).await;
        let second = seed(&repo, &[1]).await;

        let ids: Vec<CourseId> = service(&repo)
            .list_courses(10)
            .await
            .unwrap()
            .iter()
            .map(Course::id)
            .collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(service(&repo).list_courses(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let repo = InMemoryRepository::new();
        let err = service(&repo)
            .load_tree(CourseId::new(42), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::CourseNotFound(id) if id == CourseId::new(42)));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn unknown_course_is_not_found_even_if_curriculum_is_down() {
        let repo = InMemoryRepository::new();
        let service = CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(OfflineCurriculum),
            Arc::new(repo.clone()),
        );

        let err = service
            .load_tree(CourseId::new(42), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::CourseNotFound(_)));
    }

    #[tokio::test]
    async fn curriculum_failure_for_known_course_is_backend_error() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[1]).await;
        let service = CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(OfflineCurriculum),
            Arc::new(repo.clone()),
        );

        let err = service.load_tree(course_id, None).await.unwrap_err();
        assert!(matches!(err, ProgressError::Backend(StorageError::Connection(_))));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn tree_is_ordered_whatever_the_insert_order() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[2, 3]).await;

        let tree = service(&repo).load_tree(course_id, None).await.unwrap();
        let chapter_orders: Vec<i32> = tree
            .chapters()
            .iter()
            .map(|c| c.chapter.order_index())
            .collect();
        assert_eq!(chapter_orders, vec![0, 1]);
        for chapter in tree.chapters() {
            let orders: Vec<i32> = chapter
                .lessons
                .iter()
                .map(|l| l.lesson.order_index())
                .collect();
            let mut sorted = orders.clone();
            sorted.sort_unstable();
            assert_eq!(orders, sorted);
        }
        assert_eq!(tree.completion(), CompletionState::NotRequested);
    }

    #[tokio::test]
    async fn learner_completion_is_merged() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[3]).await;
        let learner = LearnerId::new(9);

        let tree = service(&repo).load_tree(course_id, None).await.unwrap();
        let ids = tree.lesson_ids();
        for id in [ids[0], ids[2]] {
            repo.upsert_completion(&CompletionRecord::completed(learner, id, fixed_now()))
                .await
                .unwrap();
        }

        let tree = service(&repo)
            .load_tree(course_id, Some(learner))
            .await
            .unwrap();
        let flags: Vec<bool> = tree.lessons().map(|l| l.is_completed).collect();
        assert_eq!(flags, vec![true, false, true]);
        assert_eq!(tree.completion(), CompletionState::Loaded);
    }

    #[tokio::test]
    async fn completion_lookup_failure_degrades_to_incomplete_tree() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[2, 1]).await;
        let service = CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::new(FailingProgress),
        );

        let overview = service
            .load_overview(course_id, Some(LearnerId::new(1)))
            .await
            .unwrap();
        assert_eq!(overview.tree.lessons().count(), 3);
        assert!(overview.tree.lessons().all(|l| !l.is_completed));
        assert!(overview.completion_unavailable());
        assert_eq!(overview.stats.percent_complete, 0.0);
    }

    #[tokio::test]
    async fn completion_lookup_is_one_batch_of_tree_lessons() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[2, 2]).await;
        let progress = Arc::new(CountingProgress::default());
        let service = CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::clone(&progress) as Arc<dyn ProgressRepository>,
        );

        let tree = service
            .load_tree(course_id, Some(LearnerId::new(1)))
            .await
            .unwrap();
        assert_eq!(progress.calls.load(Ordering::SeqCst), 1);
        assert_eq!(*progress.requested.lock().unwrap(), tree.lesson_ids());
        assert_eq!(tree.lessons().filter(|l| l.is_completed).count(), 1);
    }

    #[tokio::test]
    async fn empty_course_skips_completion_lookup() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[0]).await;
        let progress = Arc::new(CountingProgress::default());
        let service = CourseTreeService::new(
            Arc::new(repo.clone()),
            Arc::new(repo.clone()),
            Arc::clone(&progress) as Arc<dyn ProgressRepository>,
        );

        let overview = service
            .load_overview(course_id, Some(LearnerId::new(1)))
            .await
            .unwrap();
        assert_eq!(progress.calls.load(Ordering::SeqCst), 0);
        assert_eq!(overview.tree.chapters().len(), 1);
        assert_eq!(overview.stats.total_lessons, 0);
        assert_eq!(overview.stats.percent_complete, 0.0);
    }

    #[tokio::test]
    async fn overview_reports_stats_for_learner() {
        let repo = InMemoryRepository::new();
        let course_id = seed(&repo, &[4, 4]).await;
        let learner = LearnerId::new(2);
        let ids = service(&repo)
            .load_tree(course_id, None)
            .await
            .unwrap()
            .lesson_ids();
        for id in &ids[..2] {
            repo.upsert_completion(&CompletionRecord::completed(learner, *id, fixed_now()))
                .await
                .unwrap();
        }

        let overview = service(&repo)
            .load_overview(course_id, Some(learner))
            .await
            .unwrap();
        assert_eq!(overview.stats.total_lessons, 8);
        assert_eq!(overview.stats.completed_lessons, 2);
        assert_eq!(overview.stats.percent_complete, 25.0);
        assert_eq!(overview.stats.total_duration, 80);
        assert_eq!(overview.course.title(), "Tree");
        assert!(overview.warnings.is_empty());
    }
}
