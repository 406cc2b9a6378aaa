mod catalog;
mod duration;
mod ids;
mod result;
mod session;
mod timer;

pub use catalog::{CatalogTopic, MAX_NAME_CHARS, Subject, SubjectError, Topic, TopicError};
pub use duration::{DurationError, SessionDuration};
pub use ids::{ParseIdError, SubjectId, TopicId};
pub use result::{CompletionRecord, SessionResult, StudyRecord, TopicStatistics};
pub use session::{AnswerMap, QuizQuestion, SessionPayload, SessionPayloadError, StudySession};
pub use timer::{TimerPhase, TimerState};
