//! Course tree assembly: chapters with ordered lessons merged with a learner's
//! completion state.
//!
//! Everything here is pure. Storage hands over chapters with nested lessons in
//! whatever order it produced them; [`CourseTree::assemble`] fixes the order,
//! drops rows that do not belong, and reports them as [`IntegrityWarning`]s.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::{Chapter, ChapterId, CompletionRecord, CourseId, Lesson, LessonId};

/// One chapter row as fetched from storage, lessons nested and unordered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterWithLessons {
    pub chapter: Chapter,
    pub lessons: Vec<Lesson>,
    /// Lesson rows storage could not turn into a valid [`Lesson`].
    pub rejected: Vec<RejectedLesson>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedLesson {
    pub lesson_id: LessonId,
    pub reason: String,
}

/// Non-fatal inconsistency found while assembling a tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// Chapter row references another course.
    ForeignChapter {
        chapter_id: ChapterId,
        course_id: CourseId,
    },
    /// Lesson nested under a chapter it does not reference.
    OrphanLesson {
        lesson_id: LessonId,
        chapter_id: ChapterId,
    },
    /// Same lesson id seen twice; later copies are dropped.
    DuplicateLesson { lesson_id: LessonId },
    /// Stored lesson row failed validation.
    MalformedLesson {
        lesson_id: LessonId,
        chapter_id: ChapterId,
        reason: String,
    },
}

/// Whether completion state was merged into the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionState {
    /// No learner was given; all lessons read as incomplete.
    NotRequested,
    /// Completion records were fetched and merged.
    Loaded,
    /// Fetching completion failed; all lessons read as incomplete.
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LessonNode {
    pub lesson: Lesson,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterNode {
    pub chapter: Chapter,
    pub lessons: Vec<LessonNode>,
    /// Sum of lesson durations in minutes; lessons without a duration count as 0.
    pub total_duration: u32,
}

impl ChapterNode {
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.lessons.iter().filter(|l| l.is_completed).count()
    }
}

/// Ordered chapter → lesson tree for a single course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseTree {
    course_id: CourseId,
    chapters: Vec<ChapterNode>,
    completion: CompletionState,
}

impl CourseTree {
    /// Builds a tree from storage rows.
    ///
    /// Chapters are ordered by `order_index`, lessons by `order_index` within
    /// their chapter; ties fall back to the id so the output never depends on
    /// backend return order. Every lesson starts incomplete.
    #[must_use]
    pub fn assemble(
        course_id: CourseId,
        rows: Vec<ChapterWithLessons>,
    ) -> (Self, Vec<IntegrityWarning>) {
        let mut warnings = Vec::new();
        let mut seen_lessons = HashSet::new();
        let mut chapters = Vec::with_capacity(rows.len());

        for row in rows {
            let chapter = row.chapter;
            if chapter.course_id() != course_id {
                warnings.push(IntegrityWarning::ForeignChapter {
                    chapter_id: chapter.id(),
                    course_id: chapter.course_id(),
                });
                continue;
            }

            warnings.extend(row.rejected.into_iter().map(|rejected| {
                IntegrityWarning::MalformedLesson {
                    lesson_id: rejected.lesson_id,
                    chapter_id: chapter.id(),
                    reason: rejected.reason,
                }
            }));

            let mut lessons = Vec::with_capacity(row.lessons.len());
            for lesson in row.lessons {
                if lesson.chapter_id() != chapter.id() {
                    warnings.push(IntegrityWarning::OrphanLesson {
                        lesson_id: lesson.id(),
                        chapter_id: lesson.chapter_id(),
                    });
                    continue;
                }
                if !seen_lessons.insert(lesson.id()) {
                    warnings.push(IntegrityWarning::DuplicateLesson {
                        lesson_id: lesson.id(),
                    });
                    continue;
                }
                lessons.push(LessonNode {
                    lesson,
                    is_completed: false,
                });
            }
            lessons.sort_by_key(|node| (node.lesson.order_index(), node.lesson.id()));

            let total_duration = lessons
                .iter()
                .filter_map(|node| node.lesson.duration_minutes())
                .fold(0_u32, u32::saturating_add);

            chapters.push(ChapterNode {
                chapter,
                lessons,
                total_duration,
            });
        }
        chapters.sort_by_key(|node| (node.chapter.order_index(), node.chapter.id()));

        (
            Self {
                course_id,
                chapters,
                completion: CompletionState::NotRequested,
            },
            warnings,
        )
    }

    #[must_use]
    pub fn course_id(&self) -> CourseId {
        self.course_id
    }

    #[must_use]
    pub fn chapters(&self) -> &[ChapterNode] {
        &self.chapters
    }

    #[must_use]
    pub fn completion(&self) -> CompletionState {
        self.completion
    }

    /// All lessons in display order.
    pub fn lessons(&self) -> impl Iterator<Item = &LessonNode> {
        self.chapters.iter().flat_map(|c| c.lessons.iter())
    }

    /// Ids of every lesson present in the tree, in display order.
    #[must_use]
    pub fn lesson_ids(&self) -> Vec<LessonId> {
        self.lessons().map(|node| node.lesson.id()).collect()
    }

    /// Merges completion records into the tree.
    ///
    /// A lesson is completed iff a record for it exists with the flag set.
    /// Records for lessons not in the tree are ignored.
    pub fn apply_completion(&mut self, records: &[CompletionRecord]) {
        let completed: HashSet<LessonId> = records
            .iter()
            .filter(|r| r.is_completed)
            .map(|r| r.lesson_id)
            .collect();
        for node in self.chapters.iter_mut().flat_map(|c| c.lessons.iter_mut()) {
            node.is_completed = completed.contains(&node.lesson.id());
        }
        self.completion = CompletionState::Loaded;
    }

    /// Resets every lesson to incomplete after a failed completion fetch.
    pub fn mark_completion_unavailable(&mut self) {
        for node in self.chapters.iter_mut().flat_map(|c| c.lessons.iter_mut()) {
            node.is_completed = false;
        }
        self.completion = CompletionState::Unavailable;
    }
}
