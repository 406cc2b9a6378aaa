use thiserror::Error;

use crate::model::{DurationError, SessionPayloadError, SubjectError, TopicError};

/// Any domain validation failure raised by this crate.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Subject(#[from] SubjectError),
    #[error(transparent)]
    Topic(#[from] TopicError),
    #[error(transparent)]
    Duration(#[from] DurationError),
    #[error(transparent)]
    Payload(#[from] SessionPayloadError),
}
