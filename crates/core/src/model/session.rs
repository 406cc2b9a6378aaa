use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::duration::SessionDuration;
use crate::model::ids::TopicId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

/// Reasons a generated session payload is refused.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionPayloadError {
    #[error("question {question} has {options} options (at least 2 required)")]
    TooFewOptions { question: usize, options: usize },

    #[error("question {question} marks option {correct} as correct but only has {options}")]
    CorrectAnswerOutOfRange {
        question: usize,
        correct: usize,
        options: usize,
    },

    #[error("topic name cannot be empty")]
    EmptyTopicName,
}

//
// ─── WIRE SHAPE ────────────────────────────────────────────────────────────────
//

/// A quiz question exactly as produced by the content generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    pub correct_answer: usize,
}

/// Session payload as produced by the content generator, before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPayload {
    pub topic_id: TopicId,
    pub topic_name: String,
    pub duration: SessionDuration,
    #[serde(default)]
    pub learning_objective: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
    #[serde(default)]
    pub quiz: Vec<QuizQuestion>,
}

/// Question index to chosen option index.
pub type AnswerMap = BTreeMap<usize, usize>;

//
// ─── SESSION ───────────────────────────────────────────────────────────────────
//

/// A generated bundle of learning content and quiz for one topic and duration.
///
/// Immutable once built; the learner's answers live beside it, not inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudySession {
    topic_id: TopicId,
    topic_name: String,
    duration: SessionDuration,
    learning_objective: Option<String>,
    content: Option<String>,
    key_concepts: Vec<String>,
    quiz: Vec<QuizQuestion>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl StudySession {
    /// Validate a generator payload.
    ///
    /// Blank objective/content are treated as missing.
    ///
    /// # Errors
    ///
    /// Returns `SessionPayloadError` when a question has fewer than two options,
    /// a correct answer points outside its options, or the topic name is blank.
    pub fn from_payload(payload: SessionPayload) -> Result<Self, SessionPayloadError> {
        if payload.topic_name.trim().is_empty() {
            return Err(SessionPayloadError::EmptyTopicName);
        }
        for (index, question) in payload.quiz.iter().enumerate() {
            let options = question.options.len();
            if options < 2 {
                return Err(SessionPayloadError::TooFewOptions {
                    question: index,
                    options,
                });
            }
            if question.correct_answer >= options {
                return Err(SessionPayloadError::CorrectAnswerOutOfRange {
                    question: index,
                    correct: question.correct_answer,
                    options,
                });
            }
        }

        Ok(Self {
            topic_id: payload.topic_id,
            topic_name: payload.topic_name,
            duration: payload.duration,
            learning_objective: non_blank(payload.learning_objective),
            content: non_blank(payload.content),
            key_concepts: payload.key_concepts,
            quiz: payload.quiz,
        })
    }

    #[must_use]
    pub fn topic_id(&self) -> TopicId {
        self.topic_id
    }

    #[must_use]
    pub fn topic_name(&self) -> &str {
        &self.topic_name
    }

    #[must_use]
    pub fn duration(&self) -> SessionDuration {
        self.duration
    }

    #[must_use]
    pub fn learning_objective(&self) -> Option<&str> {
        self.learning_objective.as_deref()
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    #[must_use]
    pub fn key_concepts(&self) -> &[String] {
        &self.key_concepts
    }

    #[must_use]
    pub fn quiz(&self) -> &[QuizQuestion] {
        &self.quiz
    }

    #[must_use]
    pub fn question(&self, index: usize) -> Option<&QuizQuestion> {
        self.quiz.get(index)
    }
}
