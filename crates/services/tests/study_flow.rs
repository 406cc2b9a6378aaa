use std::sync::Arc;

use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use services::sessions::view::{NOT_AVAILABLE, content_text, objective_text};
use services::{
    CatalogService, Clock, CompletionReporter, GenerationError, LifecycleState, ManualSelection,
    ReportError, SessionError, SessionGenerator, SessionOrigin, SessionRequest,
    StudySessionController,
};
use study_core::model::{
    CompletionRecord, QuizQuestion, SessionDuration, SessionPayload, StudySession,
};
use study_core::time::fixed_now;

/// Builds sessions from the catalog the way a real backend would, without any network.
struct CatalogBackedGenerator {
    catalog: Arc<CatalogService>,
}

#[async_trait]
impl SessionGenerator for CatalogBackedGenerator {
    async fn generate_session(
        &self,
        request: &SessionRequest,
    ) -> Result<StudySession, GenerationError> {
        let topic = self
            .catalog
            .get_topic(request.topic_id)
            .await?
            .ok_or(GenerationError::UnknownTopic(request.topic_id))?;
        let quiz = (0..3)
            .map(|i| QuizQuestion {
                question: format!("{} question {}", topic.name(), i + 1),
                options: vec!["A".into(), "B".into(), "C".into(), "D".into()],
                correct_answer: i,
            })
            .collect();
        Ok(StudySession::from_payload(SessionPayload {
            topic_id: topic.id(),
            topic_name: topic.name().to_owned(),
            duration: request.duration,
            learning_objective: None,
            content: Some(format!("All about {}", topic.name())),
            key_concepts: Vec::new(),
            quiz,
        })?)
    }
}

struct FailingReporter;

#[async_trait]
impl CompletionReporter for FailingReporter {
    async fn record_completion(&self, _record: &CompletionRecord) -> Result<(), ReportError> {
        Err(ReportError::HttpStatus(reqwest::StatusCode::BAD_GATEWAY))
    }
}

#[tokio::test(start_paused = true)]
async fn manual_session_is_recorded_in_history() {
    let catalog = Arc::new(CatalogService::in_memory(Clock::fixed(fixed_now())));
    let math = catalog.create_subject("Math", None).await.unwrap();
    let limits = catalog.create_topic(math, "Limits", None).await.unwrap();
    catalog.create_topic(math, "Series", None).await.unwrap();

    let generator = Arc::new(CatalogBackedGenerator {
        catalog: Arc::clone(&catalog),
    });
    let (mut controller, mut ticks) = StudySessionController::new(
        generator,
        Arc::clone(&catalog) as Arc<dyn CompletionReporter>,
        SessionDuration::Five,
    );

    let mut rng = StdRng::seed_from_u64(42);
    let subjects = catalog.list_subjects().await.unwrap();
    let mut selection = ManualSelection::start(catalog.as_ref(), subjects, &mut rng)
        .await
        .unwrap();
    selection
        .choose_subject(math, catalog.as_ref(), &mut rng)
        .await
        .unwrap();
    selection.choose_topic(limits).unwrap();

    let session = controller.generate_selection(&selection).await.unwrap();
    assert_eq!(session.topic_name(), "Limits");
    assert_eq!(objective_text(session), NOT_AVAILABLE);
    assert_eq!(content_text(session), "All about Limits");

    let tick = ticks.recv().await.unwrap();
    assert!(controller.handle_tick(tick));
    assert_eq!(controller.timer_view().remaining_seconds, 299);

    for (question, option) in [(0, 0), (1, 1), (2, 3)] {
        controller.select_answer(question, option).unwrap();
    }
    let result = controller.submit().unwrap();
    assert_eq!((result.score, result.total_questions), (2, 3));
    controller.flush_report().await;

    let history = catalog.history(math).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].topic_name, "Limits");
    assert_eq!(history[0].subject_name, "Math");
    assert_eq!(history[0].score, 2);
    assert_eq!(history[0].duration, SessionDuration::Five);

    controller.new_session().unwrap();
    assert_eq!(controller.state(), LifecycleState::Selecting);
    assert_eq!(controller.last_origin(), Some(SessionOrigin::Manual));

    controller.complete().unwrap();
    assert!(matches!(controller.submit(), Err(SessionError::Closed)));
}

#[tokio::test(start_paused = true)]
async fn report_failure_does_not_affect_the_session() {
    let catalog = Arc::new(CatalogService::in_memory(Clock::fixed(fixed_now())));
    let math = catalog.create_subject("Math", None).await.unwrap();
    catalog.create_topic(math, "Limits", None).await.unwrap();

    let (mut controller, _ticks) = StudySessionController::new(
        Arc::new(CatalogBackedGenerator {
            catalog: Arc::clone(&catalog),
        }),
        Arc::new(FailingReporter),
        SessionDuration::Ten,
    );

    let topics = catalog.flattened_topics().await.unwrap();
    let mut rng = StdRng::seed_from_u64(1);
    controller.start_random(&topics, &mut rng).await.unwrap();
    for question in 0..3 {
        controller.select_answer(question, question).unwrap();
    }
    let result = controller.submit().unwrap();
    assert_eq!(result.percent(), 100);
    controller.flush_report().await;

    assert_eq!(controller.state(), LifecycleState::Submitted);
    assert_eq!(controller.result(), Some(result));
    assert!(catalog.history(math).await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_topic_fails_generation_and_allows_retry() {
    let catalog = Arc::new(CatalogService::in_memory(Clock::fixed(fixed_now())));
    let math = catalog.create_subject("Math", None).await.unwrap();
    let limits = catalog.create_topic(math, "Limits", None).await.unwrap();

    let (mut controller, _ticks) = StudySessionController::new(
        Arc::new(CatalogBackedGenerator {
            catalog: Arc::clone(&catalog),
        }),
        Arc::clone(&catalog) as Arc<dyn CompletionReporter>,
        SessionDuration::Fifteen,
    );

    let missing = study_core::model::TopicId::new(limits.value() + 100);
    let err = controller.generate(math, missing).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::Generation(GenerationError::UnknownTopic(_))
    ));
    assert_eq!(controller.state(), LifecycleState::Selecting);

    controller.generate(math, limits).await.unwrap();
    assert_eq!(controller.timer_view().total_seconds, 900);
}
