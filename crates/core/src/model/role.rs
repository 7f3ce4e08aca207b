use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::ids::LearnerId;

/// Role reported by the identity backend for the acting user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

impl Role {
    /// Only learners produce completion records; previews by staff never do.
    #[must_use]
    pub fn can_record_progress(self) -> bool {
        matches!(self, Self::Student)
    }

    #[must_use]
    pub fn can_author(self) -> bool {
        matches!(self, Self::Teacher | Self::Admin)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Teacher => "teacher",
            Self::Admin => "admin",
        }
    }

    /// Parses a role name; `None` for anything unrecognized.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "student" | "learner" => Some(Self::Student),
            "teacher" | "instructor" => Some(Self::Teacher),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The acting user, passed explicitly into every operation that needs identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnerContext {
    pub learner_id: LearnerId,
    pub role: Role,
}

impl LearnerContext {
    #[must_use]
    pub fn new(learner_id: LearnerId, role: Role) -> Self {
        Self { learner_id, role }
    }

    #[must_use]
    pub fn student(learner_id: LearnerId) -> Self {
        Self::new(learner_id, Role::Student)
    }

    #[must_use]
    pub fn can_record_progress(&self) -> bool {
        self.role.can_record_progress()
    }
}
