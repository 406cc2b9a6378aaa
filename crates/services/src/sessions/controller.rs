use std::sync::Arc;

use rand::Rng;
use study_core::model::{
    AnswerMap, CatalogTopic, CompletionRecord, SessionDuration, SessionResult, StudySession,
    SubjectId, TopicId,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::orchestrator::{OrchestratorState, SessionOrchestrator};
use super::quiz::QuizEvaluator;
use super::selection::{ManualSelection, resolve_random};
use super::timer::{CountdownTimer, TickReceiver, TimerTick};
use super::view::{OptionMark, TimerView};
use crate::error::SessionError;
use crate::generation::{CompletionReporter, SessionGenerator, SessionRequest};

/// Where the study loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Selecting,
    Generating,
    Active,
    Submitted,
    Complete,
}

/// How the topic of the current session was picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOrigin {
    Random,
    Manual,
}

/// What subscribers see after every transition.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub state: LifecycleState,
    pub orchestrator: OrchestratorState,
    pub origin: Option<SessionOrigin>,
    pub topic_id: Option<TopicId>,
    pub timer: TimerView,
    pub answered: usize,
    pub total_questions: usize,
    pub can_submit: bool,
    pub result: Option<SessionResult>,
}

impl SessionSnapshot {
    fn initial() -> Self {
        Self {
            state: LifecycleState::Selecting,
            orchestrator: OrchestratorState::Idle,
            origin: None,
            topic_id: None,
            timer: TimerView::default(),
            answered: 0,
            total_questions: 0,
            can_submit: false,
            result: None,
        }
    }
}

/// Drives one learner through select, generate, study, quiz and submit.
///
/// Owned by a single task. Timer ticks arrive on the [`TickReceiver`] returned by
/// [`StudySessionController::new`] and must be fed back through
/// [`StudySessionController::handle_tick`].
pub struct StudySessionController {
    state: LifecycleState,
    origin: Option<SessionOrigin>,
    duration: SessionDuration,
    orchestrator: SessionOrchestrator,
    timer: CountdownTimer,
    quiz: QuizEvaluator,
    generator: Arc<dyn SessionGenerator>,
    reporter: Arc<dyn CompletionReporter>,
    snapshots: watch::Sender<SessionSnapshot>,
    report: Option<JoinHandle<()>>,
}

impl StudySessionController {
    #[must_use]
    pub fn new(
        generator: Arc<dyn SessionGenerator>,
        reporter: Arc<dyn CompletionReporter>,
        duration: SessionDuration,
    ) -> (Self, TickReceiver) {
        let (timer, ticks) = CountdownTimer::new();
        let (snapshots, _) = watch::channel(SessionSnapshot::initial());
        let controller = Self {
            state: LifecycleState::Selecting,
            origin: None,
            duration,
            orchestrator: SessionOrchestrator::new(),
            timer,
            quiz: QuizEvaluator::new(),
            generator,
            reporter,
            snapshots,
            report: None,
        };
        (controller, ticks)
    }

    /// Duration used for the next generated session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` after `complete`.
    pub fn set_duration(&mut self, duration: SessionDuration) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.duration = duration;
        Ok(())
    }

    /// Pick a random topic from the flattened catalog and generate its session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyCatalog` for an empty catalog, otherwise see
    /// [`StudySessionController::generate`].
    pub async fn start_random<R: Rng + ?Sized>(
        &mut self,
        topics: &[CatalogTopic],
        rng: &mut R,
    ) -> Result<&StudySession, SessionError> {
        self.ensure_open()?;
        let picked = resolve_random(topics, rng)?;
        let (subject_id, topic_id) = (picked.subject_id(), picked.topic_id());
        tracing::info!(%subject_id, %topic_id, topic = picked.topic.name(), "random topic picked");
        self.run_generation(SessionOrigin::Random, subject_id, topic_id)
            .await
    }

    /// Generate the session for a manual selection.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSelection` if no topic is chosen yet, otherwise see
    /// [`StudySessionController::generate`].
    pub async fn generate_selection(
        &mut self,
        selection: &ManualSelection,
    ) -> Result<&StudySession, SessionError> {
        self.ensure_open()?;
        let (subject_id, topic_id) = selection.resolved().ok_or(SessionError::NoSelection)?;
        self.run_generation(SessionOrigin::Manual, subject_id, topic_id)
            .await
    }

    /// Request the session for a chosen topic. On success the timer starts.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` after `complete`, `SessionError::SessionInProgress`
    /// while a session is active or submitted, `SessionError::RequestInFlight` while
    /// generating, and `SessionError::Generation` when the generator fails (the
    /// controller stays in `Selecting` so the request can be retried).
    pub async fn generate(
        &mut self,
        subject_id: SubjectId,
        topic_id: TopicId,
    ) -> Result<&StudySession, SessionError> {
        self.run_generation(SessionOrigin::Manual, subject_id, topic_id)
            .await
    }

    async fn run_generation(
        &mut self,
        origin: SessionOrigin,
        subject_id: SubjectId,
        topic_id: TopicId,
    ) -> Result<&StudySession, SessionError> {
        self.ensure_open()?;
        if matches!(
            self.state,
            LifecycleState::Active | LifecycleState::Submitted
        ) {
            return Err(SessionError::SessionInProgress);
        }

        let request = SessionRequest {
            subject_id,
            topic_id,
            duration: self.duration,
        };
        self.orchestrator.begin(request)?;
        self.origin = Some(origin);
        self.state = LifecycleState::Generating;
        self.publish();

        let generator = Arc::clone(&self.generator);
        let outcome = generator.generate_session(&request).await;

        match self.orchestrator.finish(outcome) {
            Ok(session) => {
                let duration = session.duration();
                self.quiz.reset();
                self.timer.start(duration);
                self.state = LifecycleState::Active;
            }
            Err(err) => {
                self.state = LifecycleState::Selecting;
                self.publish();
                return Err(err);
            }
        }
        self.publish();
        self.orchestrator
            .session()
            .ok_or(SessionError::NoActiveSession)
    }

    /// Apply a timer tick. Returns whether the countdown changed.
    pub fn handle_tick(&mut self, tick: TimerTick) -> bool {
        if self.state != LifecycleState::Active {
            return false;
        }
        let changed = self.timer.handle_tick(tick);
        if changed {
            if self.timer.view().is_expired() {
                tracing::info!("session time is up");
            }
            self.publish();
        }
        changed
    }

    /// Record an answer while the session is active. Answers stay open after the
    /// countdown expires.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ResultsShown` after submission, `SessionError::InvalidAnswer`
    /// for out-of-range indexes, `SessionError::NoActiveSession` outside a session and
    /// `SessionError::Closed` after `complete`.
    pub fn select_answer(&mut self, question: usize, option: usize) -> Result<(), SessionError> {
        self.ensure_open()?;
        match self.state {
            LifecycleState::Submitted => return Err(SessionError::ResultsShown),
            LifecycleState::Active => {}
            _ => return Err(SessionError::NoActiveSession),
        }
        let session = self
            .orchestrator
            .session()
            .ok_or(SessionError::NoActiveSession)?;
        self.quiz.select_answer(session, question, option)?;
        self.publish();
        Ok(())
    }

    /// Score the quiz, stop the timer and report the result in the background.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::QuizIncomplete` while a question is unanswered (nothing
    /// changes and nothing is reported), `SessionError::ResultsShown` when already
    /// submitted, `SessionError::NoActiveSession` outside a session and
    /// `SessionError::Closed` after `complete`.
    pub fn submit(&mut self) -> Result<SessionResult, SessionError> {
        self.ensure_open()?;
        match self.state {
            LifecycleState::Submitted => return Err(SessionError::ResultsShown),
            LifecycleState::Active => {}
            _ => return Err(SessionError::NoActiveSession),
        }
        let session = self
            .orchestrator
            .session()
            .ok_or(SessionError::NoActiveSession)?;
        let result = self.quiz.submit(session)?;
        let record = CompletionRecord::new(session.topic_id(), session.duration(), result);

        self.timer.pause();
        self.state = LifecycleState::Submitted;
        tracing::info!(
            topic_id = %record.topic_id,
            score = result.score,
            total = result.total_questions,
            "quiz submitted"
        );
        self.spawn_report(record);
        self.publish();
        Ok(result)
    }

    fn spawn_report(&mut self, record: CompletionRecord) {
        let reporter = Arc::clone(&self.reporter);
        let previous = self.report.replace(tokio::spawn(async move {
            match reporter.record_completion(&record).await {
                Ok(()) => tracing::debug!(topic_id = %record.topic_id, "completion reported"),
                Err(err) => tracing::warn!(
                    topic_id = %record.topic_id,
                    error = %err,
                    "completion report failed"
                ),
            }
        }));
        // An older report keeps running detached.
        drop(previous);
    }

    /// Wait for the last completion report to finish.
    pub async fn flush_report(&mut self) {
        if let Some(handle) = self.report.take() {
            if let Err(err) = handle.await {
                tracing::warn!(error = %err, "completion report task failed");
            }
        }
    }

    /// Clear the session, answers, result and timer and go back to selection.
    ///
    /// The topic is not picked again; [`StudySessionController::last_origin`] tells the
    /// caller which selection flow produced the previous session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` after `complete`.
    pub fn new_session(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.timer.reset();
        self.quiz.reset();
        self.orchestrator.reset();
        self.state = LifecycleState::Selecting;
        tracing::debug!(origin = ?self.origin, "new session");
        self.publish();
        Ok(())
    }

    /// Close the controller. Every later call fails with `SessionError::Closed`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Closed` when already complete.
    pub fn complete(&mut self) -> Result<(), SessionError> {
        self.ensure_open()?;
        self.timer.pause();
        self.state = LifecycleState::Complete;
        tracing::debug!("study session closed");
        self.publish();
        Ok(())
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state == LifecycleState::Complete {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn publish(&self) {
        self.snapshots.send_replace(self.snapshot());
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        let session = self.orchestrator.session();
        SessionSnapshot {
            state: self.state,
            orchestrator: self.orchestrator.state().clone(),
            origin: self.origin,
            topic_id: session.map(StudySession::topic_id),
            timer: self.timer.view(),
            answered: self.quiz.answers().len(),
            total_questions: session.map_or(0, |s| s.quiz().len()),
            can_submit: self.can_submit(),
            result: self.quiz.result(),
        }
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshots.subscribe()
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    #[must_use]
    pub fn orchestrator_state(&self) -> &OrchestratorState {
        self.orchestrator.state()
    }

    #[must_use]
    pub fn session(&self) -> Option<&StudySession> {
        self.orchestrator.session()
    }

    #[must_use]
    pub fn timer_view(&self) -> TimerView {
        self.timer.view()
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerMap {
        self.quiz.answers()
    }

    /// True while the session is active and every question is answered.
    #[must_use]
    pub fn can_submit(&self) -> bool {
        self.state == LifecycleState::Active
            && self
                .orchestrator
                .session()
                .is_some_and(|session| self.quiz.can_submit(session))
    }

    #[must_use]
    pub fn result(&self) -> Option<SessionResult> {
        self.quiz.result()
    }

    #[must_use]
    pub fn option_marks(&self, question: usize) -> Option<Vec<OptionMark>> {
        let session = self.orchestrator.session()?;
        self.quiz.option_marks(session, question)
    }

    #[must_use]
    pub fn last_origin(&self) -> Option<SessionOrigin> {
        self.origin
    }

    #[must_use]
    pub fn last_request(&self) -> Option<SessionRequest> {
        self.orchestrator.last_request()
    }

    #[must_use]
    pub fn duration(&self) -> SessionDuration {
        self.duration
    }
}
