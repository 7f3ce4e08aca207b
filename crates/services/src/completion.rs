use std::sync::Arc;

use chrono::{DateTime, Utc};
use course_core::model::{
    CompletionPolicy, CompletionRecord, LearnerContext, LearnerId, Lesson, LessonId, Role,
};
use serde::Serialize;
use storage::repository::{CurriculumRepository, ProgressRepository, StorageError};

use crate::Clock;
use crate::error::ProgressError;

//
// ─── RECORDER ──────────────────────────────────────────────────────────────────
//

/// Persists lesson completion for a learner.
///
/// Writes are upserts keyed by `(learner, lesson)`, so repeating a call is
/// harmless and concurrent calls resolve as last-write-wins.
#[derive(Clone)]
pub struct CompletionRecorder {
    clock: Clock,
    curriculum: Arc<dyn CurriculumRepository>,
    progress: Arc<dyn ProgressRepository>,
}

impl CompletionRecorder {
    #[must_use]
    pub fn new(
        clock: Clock,
        curriculum: Arc<dyn CurriculumRepository>,
        progress: Arc<dyn ProgressRepository>,
    ) -> Self {
        Self {
            clock,
            curriculum,
            progress,
        }
    }

    /// Mark a lesson completed for a learner.
    ///
    /// `completed_at` defaults to the service clock.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::LessonNotFound` if the lesson does not exist.
    /// Returns `ProgressError::Backend` if the write fails.
    pub async fn mark_complete(
        &self,
        learner_id: LearnerId,
        lesson_id: LessonId,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<CompletionRecord, ProgressError> {
        let record = CompletionRecord::completed(
            learner_id,
            lesson_id,
            completed_at.unwrap_or_else(|| self.clock.now()),
        );

        match self.progress.upsert_completion(&record).await {
            Ok(()) => {
                tracing::debug!(learner_id = %learner_id, lesson_id = %lesson_id, "lesson completed");
                Ok(record)
            }
            Err(StorageError::Conflict) => {
                // The only constraint a completion row can break is its lesson reference.
                if self.curriculum.get_lesson(lesson_id).await?.is_none() {
                    return Err(ProgressError::LessonNotFound(lesson_id));
                }
                Err(ProgressError::Backend(StorageError::Conflict))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Mark a lesson completed on behalf of an acting user.
    ///
    /// Staff roles get `CompletionOutcome::NotPermitted` and nothing is written.
    ///
    /// # Errors
    ///
    /// Same as [`CompletionRecorder::mark_complete`].
    pub async fn complete_as(
        &self,
        ctx: &LearnerContext,
        lesson_id: LessonId,
        completed_at: Option<DateTime<Utc>>,
    ) -> Result<CompletionOutcome, ProgressError> {
        if !ctx.can_record_progress() {
            tracing::debug!(learner_id = %ctx.learner_id, lesson_id = %lesson_id, role = %ctx.role, "completion skipped for staff role");
            return Ok(CompletionOutcome::NotPermitted { role: ctx.role });
        }
        let record = self
            .mark_complete(ctx.learner_id, lesson_id, completed_at)
            .await?;
        Ok(CompletionOutcome::Recorded { record })
    }
}

//
// ─── LESSON OPEN ───────────────────────────────────────────────────────────────
//

/// What happened to completion when a lesson was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CompletionOutcome {
    Recorded { record: CompletionRecord },
    /// Completion for this content type is decided elsewhere.
    NotApplicable { policy: CompletionPolicy },
    /// The acting role never produces completion records.
    NotPermitted { role: Role },
    /// The write failed; the lesson still opens.
    Failed { reason: String },
}

/// A lesson resolved for display, plus the completion side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LessonOpened {
    pub lesson: Lesson,
    pub completion: CompletionOutcome,
}

/// Handles a learner opening a lesson.
///
/// Passive content (pdf, document, url) counts as completed once opened. Video,
/// quiz and assignment lessons are completed by their own flows through
/// [`CompletionRecorder`].
#[derive(Clone)]
pub struct LessonOpenHandler {
    curriculum: Arc<dyn CurriculumRepository>,
    recorder: CompletionRecorder,
}

impl LessonOpenHandler {
    #[must_use]
    pub fn new(curriculum: Arc<dyn CurriculumRepository>, recorder: CompletionRecorder) -> Self {
        Self {
            curriculum,
            recorder,
        }
    }

    /// Resolve a lesson and apply its open-time completion policy.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::LessonNotFound` if the lesson does not exist.
    /// Returns `ProgressError::Backend` if the lesson cannot be read.
    pub async fn open_lesson(
        &self,
        ctx: &LearnerContext,
        lesson_id: LessonId,
    ) -> Result<LessonOpened, ProgressError> {
        let lesson = self
            .curriculum
            .get_lesson(lesson_id)
            .await?
            .ok_or(ProgressError::LessonNotFound(lesson_id))?;

        let policy = CompletionPolicy::for_content_type(lesson.content_type());
        let completion = if !ctx.can_record_progress() {
            CompletionOutcome::NotPermitted { role: ctx.role }
        } else if !policy.completes_on_open() {
            CompletionOutcome::NotApplicable { policy }
        } else {
            match self
                .recorder
                .mark_complete(ctx.learner_id, lesson_id, None)
                .await
            {
                Ok(record) => CompletionOutcome::Recorded { record },
                Err(err) => {
                    tracing::warn!(
                        learner_id = %ctx.learner_id,
                        lesson_id = %lesson_id,
                        transient = err.is_transient(),
                        error = %err,
                        "failed to record completion on open"
                    );
                    CompletionOutcome::Failed {
                        reason: err.to_string(),
                    }
                }
            }
        };

        Ok(LessonOpened { lesson, completion })
    }
}
