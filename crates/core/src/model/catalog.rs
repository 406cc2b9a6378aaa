use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{SubjectId, TopicId};

/// Maximum length (in characters) accepted for subject and topic names.
pub const MAX_NAME_CHARS: usize = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SubjectError {
    #[error("subject name cannot be empty")]
    EmptyName,

    #[error("subject name must be at most {MAX_NAME_CHARS} characters (got {len})")]
    NameTooLong { len: usize },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TopicError {
    #[error("topic name cannot be empty")]
    EmptyName,

    #[error("topic name must be at most {MAX_NAME_CHARS} characters (got {len})")]
    NameTooLong { len: usize },
}

/// Trims a name and checks the length bounds, returning the character count on overflow.
fn normalize_name(raw: &str) -> Result<String, Option<usize>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(None);
    }
    let len = trimmed.chars().count();
    if len > MAX_NAME_CHARS {
        return Err(Some(len));
    }
    Ok(trimmed.to_owned())
}

fn normalize_description(raw: Option<String>) -> Option<String> {
    raw.map(|d| d.trim().to_owned()).filter(|d| !d.is_empty())
}

//
// ─── SUBJECT ───────────────────────────────────────────────────────────────────
//

/// A subject groups the topics a learner studies (e.g. "Linear Algebra").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    id: SubjectId,
    name: String,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl Subject {
    /// Creates a validated subject.
    ///
    /// # Errors
    ///
    /// Returns `SubjectError::EmptyName` for blank names and
    /// `SubjectError::NameTooLong` past [`MAX_NAME_CHARS`].
    pub fn new(
        id: SubjectId,
        name: impl AsRef<str>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, SubjectError> {
        let name = normalize_name(name.as_ref()).map_err(|len| match len {
            None => SubjectError::EmptyName,
            Some(len) => SubjectError::NameTooLong { len },
        })?;
        Ok(Self {
            id,
            name,
            description: normalize_description(description),
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> SubjectId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// A topic inside a subject. `has_content` is true once study material is attached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topic {
    id: TopicId,
    subject_id: SubjectId,
    name: String,
    description: Option<String>,
    has_content: bool,
    created_at: DateTime<Utc>,
}

impl Topic {
    /// Creates a validated topic without attached material.
    ///
    /// # Errors
    ///
    /// Returns `TopicError` when the name is blank or too long.
    pub fn new(
        id: TopicId,
        subject_id: SubjectId,
        name: impl AsRef<str>,
        description: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, TopicError> {
        let name = normalize_name(name.as_ref()).map_err(|len| match len {
            None => TopicError::EmptyName,
            Some(len) => TopicError::NameTooLong { len },
        })?;
        Ok(Self {
            id,
            subject_id,
            name,
            description: normalize_description(description),
            has_content: false,
            created_at,
        })
    }

    #[must_use]
    pub fn with_content(mut self, has_content: bool) -> Self {
        self.has_content = has_content;
        self
    }

    #[must_use]
    pub fn id(&self) -> TopicId {
        self.id
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        self.has_content
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// A topic with its subject denormalized, as used by the flattened catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogTopic {
    pub topic: Topic,
    pub subject_name: String,
}

impl CatalogTopic {
    #[must_use]
    pub fn new(subject: &Subject, topic: Topic) -> Self {
        Self {
            topic,
            subject_name: subject.name().to_owned(),
        }
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.topic.subject_id()
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn subject_name_is_trimmed_and_required() {
        let subject = Subject::new(SubjectId::new(1), "  Algebra ", None, fixed_now()).unwrap();
        assert_eq!(subject.name(), "Algebra");

        let err = Subject::new(SubjectId::new(1), "   ", None, fixed_now()).unwrap_err();
        assert_eq!(err, SubjectError::EmptyName);
    }

    #[test]
    fn topic_name_length_is_bounded() {
        let long = "x".repeat(MAX_NAME_CHARS + 1);
        let err = Topic::new(TopicId::new(1), SubjectId::new(1), long, None, fixed_now())
            .unwrap_err();
        assert_eq!(
            err,
            TopicError::NameTooLong {
                len: MAX_NAME_CHARS + 1
            }
        );
    }

    #[test]
    fn blank_description_becomes_none() {
        let topic = Topic::new(
            TopicId::new(3),
            SubjectId::new(1),
            "Vectors",
            Some("  ".into()),
            fixed_now(),
        )
        .unwrap();
        assert_eq!(topic.description(), None);
        assert!(!topic.has_content());
    }

    #[test]
    fn catalog_topic_carries_subject_name() {
        let subject = Subject::new(SubjectId::new(4), "Physics", None, fixed_now()).unwrap();
        let topic =
            Topic::new(TopicId::new(8), subject.id(), "Optics", None, fixed_now()).unwrap();
        let entry = CatalogTopic::new(&subject, topic);
        assert_eq!(entry.subject_name, "Physics");
        assert_eq!(entry.subject_id(), SubjectId::new(4));
        assert_eq!(entry.topic_id(), TopicId::new(8));
    }
}
