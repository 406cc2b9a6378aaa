use study_core::model::StudySession;

use crate::error::{GenerationError, SessionError};
use crate::generation::{SessionGenerator, SessionRequest};

/// Progress of the request for the session-of-record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OrchestratorState {
    #[default]
    Idle,
    Requesting,
    Ready,
    Failed { message: String },
}

/// Requests a generated session and holds it once it arrives.
#[derive(Debug, Default)]
pub struct SessionOrchestrator {
    state: OrchestratorState,
    request: Option<SessionRequest>,
    session: Option<StudySession>,
}

impl SessionOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enter `Requesting` for the given request.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::RequestInFlight` while another request is pending.
    /// Returns `SessionError::SessionInProgress` while a session is held.
    pub fn begin(&mut self, request: SessionRequest) -> Result<(), SessionError> {
        match self.state {
            OrchestratorState::Requesting => return Err(SessionError::RequestInFlight),
            OrchestratorState::Ready => return Err(SessionError::SessionInProgress),
            OrchestratorState::Idle | OrchestratorState::Failed { .. } => {}
        }
        tracing::debug!(topic_id = %request.topic_id, duration = request.duration.minutes(), "session requested");
        self.state = OrchestratorState::Requesting;
        self.request = Some(request);
        Ok(())
    }

    /// Settle a pending request with the generator's outcome.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Generation` when the generator failed; the state moves to `Failed`.
    pub fn finish(
        &mut self,
        outcome: Result<StudySession, GenerationError>,
    ) -> Result<&StudySession, SessionError> {
        match outcome {
            Ok(session) => {
                tracing::info!(
                    topic_id = %session.topic_id(),
                    questions = session.quiz().len(),
                    "session ready"
                );
                self.state = OrchestratorState::Ready;
                Ok(self.session.insert(session))
            }
            Err(err) => {
                tracing::warn!(error = %err, "session generation failed");
                self.state = OrchestratorState::Failed {
                    message: err.to_string(),
                };
                self.session = None;
                Err(SessionError::Generation(err))
            }
        }
    }

    /// Request a session and wait for it.
    ///
    /// # Errors
    ///
    /// See [`SessionOrchestrator::begin`] and [`SessionOrchestrator::finish`].
    pub async fn generate(
        &mut self,
        generator: &dyn SessionGenerator,
        request: SessionRequest,
    ) -> Result<&StudySession, SessionError> {
        self.begin(request)?;
        let outcome = generator.generate_session(&request).await;
        self.finish(outcome)
    }

    /// Back to `Idle`, dropping the session-of-record. The last request is kept for retries.
    pub fn reset(&mut self) {
        self.state = OrchestratorState::Idle;
        self.session = None;
    }

    #[must_use]
    pub fn state(&self) -> &OrchestratorState {
        &self.state
    }

    #[must_use]
    pub fn session(&self) -> Option<&StudySession> {
        self.session.as_ref()
    }

    #[must_use]
    pub fn last_request(&self) -> Option<SessionRequest> {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use study_core::model::{SessionDuration, SessionPayload, SubjectId, TopicId};

    struct Scripted(Option<SessionPayload>);

    #[async_trait]
    impl SessionGenerator for Scripted {
        async fn generate_session(
            &self,
            _request: &SessionRequest,
        ) -> Result<StudySession, GenerationError> {
            let payload = self.0.clone().ok_or(GenerationError::EmptyResponse)?;
            Ok(StudySession::from_payload(payload)?)
        }
    }

    fn request() -> SessionRequest {
        SessionRequest {
            subject_id: SubjectId::new(1),
            topic_id: TopicId::new(2),
            duration: SessionDuration::Five,
        }
    }

    fn payload() -> SessionPayload {
        SessionPayload {
            topic_id: TopicId::new(2),
            topic_name: "Limits".into(),
            duration: SessionDuration::Five,
            learning_objective: None,
            content: None,
            key_concepts: Vec::new(),
            quiz: Vec::new(),
        }
    }

    #[tokio::test]
    async fn success_holds_session_of_record() {
        let mut orchestrator = SessionOrchestrator::new();
        let session = orchestrator
            .generate(&Scripted(Some(payload())), request())
            .await
            .unwrap();
        assert_eq!(session.topic_name(), "Limits");
        assert_eq!(orchestrator.state(), &OrchestratorState::Ready);

        let err = orchestrator
            .generate(&Scripted(Some(payload())), request())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::SessionInProgress));
    }

    #[tokio::test]
    async fn failure_allows_retry() {
        let mut orchestrator = SessionOrchestrator::new();
        let err = orchestrator
            .generate(&Scripted(None), request())
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::Generation(_)));
        assert!(matches!(
            orchestrator.state(),
            OrchestratorState::Failed { .. }
        ));
        assert!(orchestrator.session().is_none());
        assert_eq!(orchestrator.last_request(), Some(request()));

        orchestrator
            .generate(&Scripted(Some(payload())), request())
            .await
            .unwrap();
        assert_eq!(orchestrator.state(), &OrchestratorState::Ready);
    }

    #[test]
    fn second_request_while_pending_is_rejected() {
        let mut orchestrator = SessionOrchestrator::new();
        orchestrator.begin(request()).unwrap();
        let err = orchestrator.begin(request()).unwrap_err();
        assert!(matches!(err, SessionError::RequestInFlight));
    }

    #[test]
    fn invalid_payload_counts_as_generation_failure() {
        let mut orchestrator = SessionOrchestrator::new();
        orchestrator.begin(request()).unwrap();
        let mut bad = payload();
        bad.quiz.push(study_core::model::QuizQuestion {
            question: "Only one option?".into(),
            options: vec!["yes".into()],
            correct_answer: 0,
        });
        let outcome = StudySession::from_payload(bad).map_err(GenerationError::from);
        assert!(orchestrator.finish(outcome).is_err());
        assert!(matches!(
            orchestrator.state(),
            OrchestratorState::Failed { .. }
        ));
    }

    #[tokio::test]
    async fn reset_returns_to_idle() {
        let mut orchestrator = SessionOrchestrator::new();
        orchestrator
            .generate(&Scripted(Some(payload())), request())
            .await
            .unwrap();
        orchestrator.reset();
        assert_eq!(orchestrator.state(), &OrchestratorState::Idle);
        assert!(orchestrator.session().is_none());
    }
}
