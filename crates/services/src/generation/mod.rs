//! Collaborators that produce study sessions and receive completion reports.

mod api;
mod llm;

use async_trait::async_trait;
use serde::Serialize;
use study_core::model::{CompletionRecord, SessionDuration, StudySession, SubjectId, TopicId};

use crate::error::{GenerationError, ReportError};

pub use api::{StudyApiClient, StudyApiConfig};
pub use llm::{LlmConfig, LlmSessionGenerator, RetryPolicy};

/// What a generator is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionRequest {
    pub subject_id: SubjectId,
    pub topic_id: TopicId,
    pub duration: SessionDuration,
}

/// Produces the content and quiz for one topic.
#[async_trait]
pub trait SessionGenerator: Send + Sync {
    /// # Errors
    ///
    /// Returns `GenerationError` when the backend fails or its payload is invalid.
    async fn generate_session(
        &self,
        request: &SessionRequest,
    ) -> Result<StudySession, GenerationError>;
}

/// Receives the score of a submitted quiz.
#[async_trait]
pub trait CompletionReporter: Send + Sync {
    /// # Errors
    ///
    /// Returns `ReportError` when the report could not be stored.
    async fn record_completion(&self, record: &CompletionRecord) -> Result<(), ReportError>;
}
