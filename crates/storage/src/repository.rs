use async_trait::async_trait;
use chrono::{DateTime, Utc};
use course_core::model::{
    Chapter, ChapterId, CompletionRecord, Course, CourseId, Enrollment, LearnerId, Lesson,
    LessonDraft, LessonId,
};
use course_core::tree::ChapterWithLessons;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl StorageError {
    /// True for failures a caller may retry later (backend unreachable or busy).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection(_))
    }
}

//
// ─── NEW-ROW RECORDS ───────────────────────────────────────────────────────────
//

/// Insert shape for a course whose id is assigned by storage.
#[derive(Debug, Clone)]
pub struct NewCourseRecord {
    pub course: Course,
}

impl NewCourseRecord {
    #[must_use]
    pub fn from_course(course: &Course) -> Self {
        Self {
            course: course.clone(),
        }
    }
}

/// Insert shape for a chapter whose id is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewChapterRecord {
    pub course_id: CourseId,
    pub title: String,
    pub order_index: i32,
}

/// Insert shape for a lesson whose id is assigned by storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLessonRecord {
    pub draft: LessonDraft,
}

impl NewLessonRecord {
    #[must_use]
    pub fn from_draft(draft: &LessonDraft) -> Self {
        Self {
            draft: draft.clone(),
        }
    }
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

/// Repository contract for course metadata.
#[async_trait]
pub trait CourseRepository: Send + Sync {
    /// Insert a course and return its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the course cannot be stored.
    async fn insert_new_course(&self, course: NewCourseRecord) -> Result<CourseId, StorageError>;

    /// Fetch a course by ID. `Ok(None)` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError>;

    /// List courses ordered by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError>;
}

/// Repository contract for chapters and lessons.
#[async_trait]
pub trait CurriculumRepository: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the course does not exist.
    async fn insert_new_chapter(&self, chapter: NewChapterRecord)
    -> Result<ChapterId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the chapter does not exist.
    async fn insert_new_lesson(&self, lesson: NewLessonRecord) -> Result<LessonId, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError>;

    /// Fetch every chapter of a course with its lessons nested, in one round trip.
    ///
    /// Ordering is not guaranteed; callers sort.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn chapters_with_lessons(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<ChapterWithLessons>, StorageError>;

    /// Rewrite lesson order indices within one chapter atomically.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if any lesson is not in the chapter.
    async fn set_lesson_order(
        &self,
        chapter_id: ChapterId,
        order: &[(LessonId, i32)],
    ) -> Result<(), StorageError>;
}

/// Repository contract for learner completion records.
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the learner's records restricted to the given lessons, batched.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn completions_for_lessons(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<CompletionRecord>, StorageError>;

    /// Insert or overwrite the record keyed by `(learner_id, lesson_id)`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the lesson does not exist, or other
    /// storage errors.
    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError>;
}

/// Repository contract for course enrollments.
#[async_trait]
pub trait EnrollmentRepository: Send + Sync {
    /// Enroll a learner. Returns `false` when the enrollment already existed.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Conflict` if the course does not exist, or other
    /// storage errors.
    async fn enroll(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<bool, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn get_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError>;

    /// Enrollments for a learner, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on backend failures.
    async fn enrollments_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Enrollment>, StorageError>;
}

//
// ─── IN-MEMORY BACKEND ─────────────────────────────────────────────────────────
//

/// Simple in-memory repository implementation for testing and prototyping.
///
/// Ids are assigned as `max + 1` per table, like `SQLite` rowids.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    courses: Arc<Mutex<HashMap<CourseId, Course>>>,
    chapters: Arc<Mutex<HashMap<ChapterId, Chapter>>>,
    lessons: Arc<Mutex<HashMap<LessonId, Lesson>>>,
    completions: Arc<Mutex<HashMap<(LearnerId, LessonId), CompletionRecord>>>,
    enrollments: Arc<Mutex<HashMap<(LearnerId, CourseId), Enrollment>>>,
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, StorageError> {
    m.lock().map_err(|e| StorageError::Connection(e.to_string()))
}

fn next_id<K>(map: &HashMap<K, impl Sized>, value: impl Fn(&K) -> u64) -> u64 {
    map.keys().map(value).max().unwrap_or(0) + 1
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CourseRepository for InMemoryRepository {
    async fn insert_new_course(&self, record: NewCourseRecord) -> Result<CourseId, StorageError> {
        let mut guard = lock(&self.courses)?;
        let id = CourseId::new(next_id(&guard, CourseId::value));
        guard.insert(id, record.course.with_id(id));
        Ok(id)
    }

    async fn get_course(&self, id: CourseId) -> Result<Option<Course>, StorageError> {
        Ok(lock(&self.courses)?.get(&id).cloned())
    }

    async fn list_courses(&self, limit: u32) -> Result<Vec<Course>, StorageError> {
        let guard = lock(&self.courses)?;
        let mut courses: Vec<Course> = guard.values().cloned().collect();
        courses.sort_by_key(Course::id);
        courses.truncate(limit as usize);
        Ok(courses)
    }
}

#[async_trait]
impl CurriculumRepository for InMemoryRepository {
    async fn insert_new_chapter(
        &self,
        record: NewChapterRecord,
    ) -> Result<ChapterId, StorageError> {
        if !lock(&self.courses)?.contains_key(&record.course_id) {
            return Err(StorageError::NotFound);
        }
        let mut guard = lock(&self.chapters)?;
        let id = ChapterId::new(next_id(&guard, ChapterId::value));
        let chapter = Chapter::new(id, record.course_id, record.title, record.order_index)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.insert(id, chapter);
        Ok(id)
    }

    async fn insert_new_lesson(&self, record: NewLessonRecord) -> Result<LessonId, StorageError> {
        if !lock(&self.chapters)?.contains_key(&record.draft.chapter_id) {
            return Err(StorageError::NotFound);
        }
        let mut guard = lock(&self.lessons)?;
        let id = LessonId::new(next_id(&guard, LessonId::value));
        let lesson = record
            .draft
            .validate(id)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        guard.insert(id, lesson);
        Ok(id)
    }

    async fn get_chapter(&self, id: ChapterId) -> Result<Option<Chapter>, StorageError> {
        Ok(lock(&self.chapters)?.get(&id).cloned())
    }

    async fn get_lesson(&self, id: LessonId) -> Result<Option<Lesson>, StorageError> {
        Ok(lock(&self.lessons)?.get(&id).cloned())
    }

    async fn chapters_with_lessons(
        &self,
        course_id: CourseId,
    ) -> Result<Vec<ChapterWithLessons>, StorageError> {
        let chapters = lock(&self.chapters)?;
        let lessons = lock(&self.lessons)?;
        // Unordered; readers sort.
        Ok(chapters
            .values()
            .filter(|c| c.course_id() == course_id)
            .map(|chapter| ChapterWithLessons {
                chapter: chapter.clone(),
                rejected: Vec::new(),
                lessons: lessons
                    .values()
                    .filter(|l| l.chapter_id() == chapter.id())
                    .cloned()
                    .collect(),
            })
            .collect())
    }

    async fn set_lesson_order(
        &self,
        chapter_id: ChapterId,
        order: &[(LessonId, i32)],
    ) -> Result<(), StorageError> {
        let mut guard = lock(&self.lessons)?;
        if order
            .iter()
            .any(|(id, _)| guard.get(id).is_none_or(|l| l.chapter_id() != chapter_id))
        {
            return Err(StorageError::NotFound);
        }
        for (id, index) in order {
            if let Some(lesson) = guard.remove(id) {
                guard.insert(*id, lesson.with_order_index(*index));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn completions_for_lessons(
        &self,
        learner_id: LearnerId,
        lesson_ids: &[LessonId],
    ) -> Result<Vec<CompletionRecord>, StorageError> {
        let guard = lock(&self.completions)?;
        Ok(lesson_ids
            .iter()
            .filter_map(|id| guard.get(&(learner_id, *id)).cloned())
            .collect())
    }

    async fn upsert_completion(&self, record: &CompletionRecord) -> Result<(), StorageError> {
        if !lock(&self.lessons)?.contains_key(&record.lesson_id) {
            return Err(StorageError::Conflict);
        }
        lock(&self.completions)?.insert((record.learner_id, record.lesson_id), record.clone());
        Ok(())
    }
}

#[async_trait]
impl EnrollmentRepository for InMemoryRepository {
    async fn enroll(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
        enrolled_at: DateTime<Utc>,
    ) -> Result<bool, StorageError> {
        if !lock(&self.courses)?.contains_key(&course_id) {
            return Err(StorageError::Conflict);
        }
        let mut guard = lock(&self.enrollments)?;
        if guard.contains_key(&(learner_id, course_id)) {
            return Ok(false);
        }
        guard.insert(
            (learner_id, course_id),
            Enrollment {
                learner_id,
                course_id,
                enrolled_at,
            },
        );
        Ok(true)
    }

    async fn get_enrollment(
        &self,
        learner_id: LearnerId,
        course_id: CourseId,
    ) -> Result<Option<Enrollment>, StorageError> {
        Ok(lock(&self.enrollments)?.get(&(learner_id, course_id)).cloned())
    }

    async fn enrollments_for_learner(
        &self,
        learner_id: LearnerId,
    ) -> Result<Vec<Enrollment>, StorageError> {
        let guard = lock(&self.enrollments)?;
        let mut out: Vec<Enrollment> = guard
            .values()
            .filter(|e| e.learner_id == learner_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            b.enrolled_at
                .cmp(&a.enrolled_at)
                .then(a.course_id.cmp(&b.course_id))
        });
        Ok(out)
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub courses: Arc<dyn CourseRepository>,
    pub curriculum: Arc<dyn CurriculumRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            courses: Arc::new(repo.clone()),
            curriculum: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            enrollments: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use course_core::model::{ContentType, CourseMetadata};
    use course_core::time::fixed_now;

    async fn seeded() -> (InMemoryRepository, CourseId, ChapterId) {
        let repo = InMemoryRepository::new();
        let course = Course::new(
            CourseId::new(1),
            "Rust",
            None,
            CourseMetadata::default(),
            fixed_now(),
        )
        .unwrap();
        let course_id = repo
            .insert_new_course(NewCourseRecord::from_course(&course))
            .await
            .unwrap();
        let chapter_id = repo
            .insert_new_chapter(NewChapterRecord {
                course_id,
                title: "Basics".into(),
                order_index: 0,
            })
            .await
            .unwrap();
        (repo, course_id, chapter_id)
    }

    fn draft(chapter_id: ChapterId, order_index: i32) -> LessonDraft {
        LessonDraft {
            chapter_id,
            title: format!("Lesson {order_index}"),
            content_type: ContentType::Pdf,
            locator: None,
            duration_minutes: None,
            order_index,
            mandatory: false,
        }
    }

    #[tokio::test]
    async fn chapters_with_lessons_nests_by_chapter() {
        let (repo, course_id, chapter_id) = seeded().await;
        for i in 0..3 {
            repo.insert_new_lesson(NewLessonRecord::from_draft(&draft(chapter_id, i)))
                .await
                .unwrap();
        }
        let rows = repo.chapters_with_lessons(course_id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].lessons.len(), 3);
        assert!(repo.chapters_with_lessons(CourseId::new(99)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn completion_upsert_is_keyed_by_learner_and_lesson() {
        let (repo, _, chapter_id) = seeded().await;
        let lesson_id = repo
            .insert_new_lesson(NewLessonRecord::from_draft(&draft(chapter_id, 0)))
            .await
            .unwrap();
        let learner = LearnerId::new(5);
        let record = CompletionRecord::completed(learner, lesson_id, fixed_now());
        repo.upsert_completion(&record).await.unwrap();
        repo.upsert_completion(&record).await.unwrap();

        let found = repo
            .completions_for_lessons(learner, &[lesson_id, LessonId::new(77)])
            .await
            .unwrap();
        assert_eq!(found, vec![record]);
        let other = repo
            .completions_for_lessons(LearnerId::new(6), &[lesson_id])
            .await
            .unwrap();
        assert!(other.is_empty());
    }

    #[tokio::test]
    async fn completion_for_unknown_lesson_conflicts() {
        let (repo, _, _) = seeded().await;
        let record = CompletionRecord::completed(LearnerId::new(1), LessonId::new(42), fixed_now());
        let err = repo.upsert_completion(&record).await.unwrap_err();
        assert!(matches!(err, StorageError::Conflict));
    }

    #[tokio::test]
    async fn enroll_is_idempotent() {
        let (repo, course_id, _) = seeded().await;
        let learner = LearnerId::new(3);
        assert!(repo.enroll(learner, course_id, fixed_now()).await.unwrap());
        assert!(!repo.enroll(learner, course_id, fixed_now()).await.unwrap());
        assert_eq!(repo.enrollments_for_learner(learner).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn set_lesson_order_rejects_foreign_lesson() {
        let (repo, _, chapter_id) = seeded().await;
        let lesson_id = repo
            .insert_new_lesson(NewLessonRecord::from_draft(&draft(chapter_id, 0)))
            .await
            .unwrap();
        let err = repo
            .set_lesson_order(ChapterId::new(99), &[(lesson_id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        repo.set_lesson_order(chapter_id, &[(lesson_id, 4)])
            .await
            .unwrap();
        let lesson = repo.get_lesson(lesson_id).await.unwrap().unwrap();
        assert_eq!(lesson.order_index(), 4);
    }
}
