use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use url::Url;

use crate::model::ids::{ChapterId, LessonId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum LessonError {
    #[error("lesson title cannot be empty")]
    EmptyTitle,

    #[error("lesson content must be either a url or a stored file, not both")]
    AmbiguousLocator,

    #[error("invalid content url: {0}")]
    InvalidUrl(String),

    #[error("stored file key cannot be empty")]
    EmptyFileKey,
}

//
// ─── CONTENT TYPE ──────────────────────────────────────────────────────────────
//

/// Kind of content a lesson delivers.
///
/// Values outside the known set are kept verbatim in `Other` so that rows
/// written by newer authoring tools still load.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ContentType {
    Video,
    Pdf,
    Document,
    Url,
    Quiz,
    Assignment,
    Other(String),
}

/// Summary bucket used by course statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentBucket {
    Video,
    Reading,
    Quiz,
    Assignment,
}

impl ContentType {
    /// Parses a stored content type. Never fails; unknown values map to `Other`.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "video" => Self::Video,
            "pdf" => Self::Pdf,
            "document" => Self::Document,
            "url" => Self::Url,
            "quiz" => Self::Quiz,
            "assignment" => Self::Assignment,
            _ => Self::Other(raw.trim().to_owned()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Video => "video",
            Self::Pdf => "pdf",
            Self::Document => "document",
            Self::Url => "url",
            Self::Quiz => "quiz",
            Self::Assignment => "assignment",
            Self::Other(raw) => raw.as_str(),
        }
    }

    /// Statistics bucket for this type; `None` for unlisted types.
    #[must_use]
    pub fn bucket(&self) -> Option<ContentBucket> {
        match self {
            Self::Video => Some(ContentBucket::Video),
            Self::Pdf | Self::Document | Self::Url => Some(ContentBucket::Reading),
            Self::Quiz => Some(ContentBucket::Quiz),
            Self::Assignment => Some(ContentBucket::Assignment),
            Self::Other(_) => None,
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for ContentType {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<ContentType> for String {
    fn from(value: ContentType) -> Self {
        value.as_str().to_owned()
    }
}

//
// ─── CONTENT LOCATOR ───────────────────────────────────────────────────────────
//

/// Where the lesson content lives: an external URL or a stored-file key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ContentLocator {
    Url(Url),
    StoredFile(String),
}

impl ContentLocator {
    /// Builds a locator from the two mutually exclusive form/storage fields.
    ///
    /// Blank values count as absent.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::AmbiguousLocator` when both are set, or
    /// `LessonError::InvalidUrl` when the url does not parse.
    pub fn from_parts(url: Option<&str>, file_key: Option<&str>) -> Result<Option<Self>, LessonError> {
        let url = url.map(str::trim).filter(|s| !s.is_empty());
        let file_key = file_key.map(str::trim).filter(|s| !s.is_empty());
        match (url, file_key) {
            (Some(_), Some(_)) => Err(LessonError::AmbiguousLocator),
            (Some(u), None) => Url::parse(u)
                .map(|parsed| Some(Self::Url(parsed)))
                .map_err(|_| LessonError::InvalidUrl(u.to_owned())),
            (None, Some(key)) => Ok(Some(Self::StoredFile(key.to_owned()))),
            (None, None) => Ok(None),
        }
    }

    #[must_use]
    pub fn url(&self) -> Option<&Url> {
        match self {
            Self::Url(u) => Some(u),
            Self::StoredFile(_) => None,
        }
    }

    #[must_use]
    pub fn file_key(&self) -> Option<&str> {
        match self {
            Self::StoredFile(key) => Some(key),
            Self::Url(_) => None,
        }
    }
}

//
// ─── LESSON ────────────────────────────────────────────────────────────────────
//

/// Unvalidated lesson fields as produced by the authoring form or a storage row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LessonDraft {
    pub chapter_id: ChapterId,
    pub title: String,
    pub content_type: ContentType,
    pub locator: Option<ContentLocator>,
    pub duration_minutes: Option<u32>,
    pub order_index: i32,
    pub mandatory: bool,
}

impl LessonDraft {
    /// Validates the draft and attaches an id.
    ///
    /// # Errors
    ///
    /// Returns `LessonError::EmptyTitle` for a blank title and
    /// `LessonError::EmptyFileKey` for a blank stored-file key.
    pub fn validate(self, id: LessonId) -> Result<Lesson, LessonError> {
        if self.title.trim().is_empty() {
            return Err(LessonError::EmptyTitle);
        }
        if matches!(&self.locator, Some(ContentLocator::StoredFile(key)) if key.trim().is_empty()) {
            return Err(LessonError::EmptyFileKey);
        }

        Ok(Lesson {
            id,
            chapter_id: self.chapter_id,
            title: self.title.trim().to_owned(),
            content_type: self.content_type,
            locator: self.locator,
            duration_minutes: self.duration_minutes,
            order_index: self.order_index,
            mandatory: self.mandatory,
        })
    }
}

/// Single unit of content within a chapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lesson {
    id: LessonId,
    chapter_id: ChapterId,
    title: String,
    content_type: ContentType,
    locator: Option<ContentLocator>,
    duration_minutes: Option<u32>,
    order_index: i32,
    mandatory: bool,
}

impl Lesson {
    #[must_use]
    pub fn id(&self) -> LessonId {
        self.id
    }

    #[must_use]
    pub fn chapter_id(&self) -> ChapterId {
        self.chapter_id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content_type(&self) -> &ContentType {
        &self.content_type
    }

    #[must_use]
    pub fn locator(&self) -> Option<&ContentLocator> {
        self.locator.as_ref()
    }

    /// Duration in minutes, if the author provided one.
    #[must_use]
    pub fn duration_minutes(&self) -> Option<u32> {
        self.duration_minutes
    }

    #[must_use]
    pub fn order_index(&self) -> i32 {
        self.order_index
    }

    #[must_use]
    pub fn is_mandatory(&self) -> bool {
        self.mandatory
    }

    #[must_use]
    pub fn with_order_index(mut self, order_index: i32) -> Self {
        self.order_index = order_index;
        self
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
