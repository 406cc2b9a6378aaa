//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use study_core::model::{SessionPayloadError, SubjectError, SubjectId, TopicError, TopicId};

/// Errors emitted by catalog implementations, local or remote.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CatalogError {
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("catalog request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("malformed catalog response: {0}")]
    Malformed(String),
    #[error("{0} is not available through the remote API")]
    Unsupported(&'static str),
}

/// Errors emitted by session generators.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GenerationError {
    #[error("session generation is not configured")]
    Disabled,
    #[error("session generator returned an empty response")]
    EmptyResponse,
    #[error("session generation request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("invalid session payload: {0}")]
    InvalidPayload(#[from] SessionPayloadError),
    #[error("malformed generator response: {0}")]
    Malformed(String),
    #[error("topic {0} not found")]
    UnknownTopic(TopicId),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted while reporting a finished session.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportError {
    #[error("completion report failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted by the study session lifecycle.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no subjects or topics available")]
    EmptyCatalog,
    #[error("subject {0} is not part of the listed subjects")]
    UnknownSubject(SubjectId),
    #[error("topic {0} is not part of the listed topics")]
    UnknownTopic(TopicId),
    #[error("no topic selected")]
    NoSelection,
    #[error("a session request is already in flight")]
    RequestInFlight,
    #[error("a session is already in progress")]
    SessionInProgress,
    #[error("no active session")]
    NoActiveSession,
    #[error("{answered} of {total} questions answered")]
    QuizIncomplete { answered: usize, total: usize },
    #[error("results are already shown")]
    ResultsShown,
    #[error("question {question} has no option {option}")]
    InvalidAnswer { question: usize, option: usize },
    #[error("study session is closed")]
    Closed,
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
