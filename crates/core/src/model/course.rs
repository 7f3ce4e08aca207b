use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::model::ids::CourseId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CourseError {
    #[error("course title cannot be empty")]
    EmptyTitle,

    #[error("invalid {field} url: {raw}")]
    InvalidUrl { field: &'static str, raw: String },
}

//
// ─── METADATA ──────────────────────────────────────────────────────────────────
//

/// Descriptive attributes shown on the course landing page.
///
/// Empty strings are normalized to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourseMetadata {
    level: Option<String>,
    language: Option<String>,
    thumbnail_url: Option<Url>,
    welcome_video_url: Option<Url>,
}

impl CourseMetadata {
    /// Builds metadata from raw form values.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::InvalidUrl` if a provided thumbnail or welcome video
    /// value is not an absolute URL.
    pub fn new(
        level: Option<String>,
        language: Option<String>,
        thumbnail_url: Option<&str>,
        welcome_video_url: Option<&str>,
    ) -> Result<Self, CourseError> {
        Ok(Self {
            level: non_blank(level),
            language: non_blank(language),
            thumbnail_url: parse_optional_url("thumbnail", thumbnail_url)?,
            welcome_video_url: parse_optional_url("welcome video", welcome_video_url)?,
        })
    }

    #[must_use]
    pub fn level(&self) -> Option<&str> {
        self.level.as_deref()
    }

    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    #[must_use]
    pub fn thumbnail_url(&self) -> Option<&Url> {
        self.thumbnail_url.as_ref()
    }

    #[must_use]
    pub fn welcome_video_url(&self) -> Option<&Url> {
        self.welcome_video_url.as_ref()
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

fn parse_optional_url(field: &'static str, raw: Option<&str>) -> Result<Option<Url>, CourseError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Url::parse(s).map(Some).map_err(|_| CourseError::InvalidUrl {
            field,
            raw: s.to_owned(),
        }),
    }
}

//
// ─── COURSE ────────────────────────────────────────────────────────────────────
//

/// A published unit of study made of ordered chapters.
///
/// Read-only from the progress side; authoring owns its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Course {
    id: CourseId,
    title: String,
    description: Option<String>,
    metadata: CourseMetadata,
    created_at: DateTime<Utc>,
}

impl Course {
    /// Creates a new Course.
    ///
    /// # Errors
    ///
    /// Returns `CourseError::EmptyTitle` if title is empty or whitespace-only.
    pub fn new(
        id: CourseId,
        title: impl Into<String>,
        description: Option<String>,
        metadata: CourseMetadata,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CourseError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(CourseError::EmptyTitle);
        }

        Ok(Self {
            id,
            title: title.trim().to_owned(),
            description: non_blank(description),
            metadata,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> CourseId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn metadata(&self) -> &CourseMetadata {
        &self.metadata
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Returns a copy carrying a storage-assigned id.
    #[must_use]
    pub fn with_id(mut self, id: CourseId) -> Self {
        self.id = id;
        self
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
