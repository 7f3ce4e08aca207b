use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::ids::{LearnerId, LessonId};
use crate::model::lesson::ContentType;

//
// ─── COMPLETION RECORD ─────────────────────────────────────────────────────────
//

/// Persisted fact that a learner finished a lesson.
///
/// Unique per `(learner_id, lesson_id)`; writers upsert, nobody deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRecord {
    pub learner_id: LearnerId,
    pub lesson_id: LessonId,
    pub is_completed: bool,
    pub completed_at: DateTime<Utc>,
}

impl CompletionRecord {
    #[must_use]
    pub fn completed(learner_id: LearnerId, lesson_id: LessonId, at: DateTime<Utc>) -> Self {
        Self {
            learner_id,
            lesson_id,
            is_completed: true,
            completed_at: at,
        }
    }
}

//
// ─── COMPLETION POLICY ─────────────────────────────────────────────────────────
//

/// Who decides that a lesson of a given content type is complete.
///
/// Only `OnOpen` is acted on by the lesson-open handler; every other variant
/// names the external collaborator that owns the decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompletionPolicy {
    /// Passive content: complete as soon as the learner opens it.
    OnOpen,
    /// Completed by the video player once watch progress passes its threshold.
    PlayerProgress,
    /// Completed by the quiz grader after the learner submits answers.
    QuizGraded,
    /// Completed when the submitted assignment is graded.
    SubmissionGraded,
    /// Never completed automatically.
    Manual,
}

impl CompletionPolicy {
    #[must_use]
    pub fn for_content_type(content_type: &ContentType) -> Self {
        match content_type {
            ContentType::Pdf | ContentType::Document | ContentType::Url => Self::OnOpen,
            ContentType::Video => Self::PlayerProgress,
            ContentType::Quiz => Self::QuizGraded,
            ContentType::Assignment => Self::SubmissionGraded,
            ContentType::Other(_) => Self::Manual,
        }
    }

    #[must_use]
    pub fn completes_on_open(self) -> bool {
        matches!(self, Self::OnOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passive_content_completes_on_open() {
        for ct in [ContentType::Pdf, ContentType::Document, ContentType::Url] {
            assert!(CompletionPolicy::for_content_type(&ct).completes_on_open());
        }
    }

    #[test]
    fn interactive_content_is_owned_elsewhere() {
        assert_eq!(
            CompletionPolicy::for_content_type(&ContentType::Video),
            CompletionPolicy::PlayerProgress
        );
        assert_eq!(
            CompletionPolicy::for_content_type(&ContentType::Quiz),
            CompletionPolicy::QuizGraded
        );
        assert_eq!(
            CompletionPolicy::for_content_type(&ContentType::Assignment),
            CompletionPolicy::SubmissionGraded
        );
        assert_eq!(
            CompletionPolicy::for_content_type(&ContentType::Other("live".into())),
            CompletionPolicy::Manual
        );
    }
}
