use std::sync::Arc;

use storage::repository::Storage;
use study_core::model::SessionDuration;

use crate::catalog::{CatalogService, StudyCatalog};
use crate::error::AppServicesError;
use crate::generation::{
    CompletionReporter, LlmConfig, LlmSessionGenerator, SessionGenerator, StudyApiClient,
    StudyApiConfig,
};
use crate::sessions::{StudySessionController, TickReceiver};
use crate::Clock;

/// Which backend produces sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationBackend {
    RemoteApi,
    LocalLlm,
    Disabled,
}

/// Assembles app-facing services; catalog, generator and reporter always share one store.
#[derive(Clone)]
pub struct AppServices {
    catalog: Arc<dyn StudyCatalog>,
    generator: Arc<dyn SessionGenerator>,
    reporter: Arc<dyn CompletionReporter>,
    backend: GenerationBackend,
}

impl AppServices {
    /// Everything goes through a remote Study Sprint API; no local database is opened.
    #[must_use]
    pub fn remote(api: StudyApiConfig, clock: Clock) -> Self {
        tracing::info!(base_url = %api.base_url, "catalog and sessions come from the remote API");
        let client = Arc::new(StudyApiClient::new(api, clock));
        Self {
            catalog: Arc::clone(&client) as Arc<dyn StudyCatalog>,
            generator: Arc::clone(&client) as Arc<dyn SessionGenerator>,
            reporter: client,
            backend: GenerationBackend::RemoteApi,
        }
    }

    /// Build services backed by `SQLite` storage, generating with the LLM configured in
    /// the environment.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::local(clock, &storage, LlmConfig::from_env()))
    }

    /// In-memory services; generation stays disabled without an LLM config.
    #[must_use]
    pub fn in_memory(clock: Clock, llm: Option<LlmConfig>) -> Self {
        Self::local(clock, &Storage::in_memory(), llm)
    }

    fn local(clock: Clock, storage: &Storage, llm: Option<LlmConfig>) -> Self {
        let catalog = Arc::new(CatalogService::from_storage(clock, storage));
        let backend = if llm.is_some() {
            GenerationBackend::LocalLlm
        } else {
            tracing::warn!("no STUDY_API_URL or STUDY_AI_API_KEY set, session generation is disabled");
            GenerationBackend::Disabled
        };
        let generator = Arc::new(LlmSessionGenerator::new(llm, Arc::clone(&catalog)));
        Self {
            reporter: Arc::clone(&catalog) as Arc<dyn CompletionReporter>,
            catalog,
            generator,
            backend,
        }
    }

    /// A fresh study session controller using the configured collaborators.
    #[must_use]
    pub fn session_controller(
        &self,
        duration: SessionDuration,
    ) -> (StudySessionController, TickReceiver) {
        StudySessionController::new(
            Arc::clone(&self.generator),
            Arc::clone(&self.reporter),
            duration,
        )
    }

    #[must_use]
    pub fn catalog(&self) -> Arc<dyn StudyCatalog> {
        Arc::clone(&self.catalog)
    }

    #[must_use]
    pub fn backend(&self) -> GenerationBackend {
        self.backend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use study_core::model::SubjectId;
    use study_core::time::fixed_now;

    use crate::error::{CatalogError, GenerationError, SessionError};
    use crate::sessions::LifecycleState;

    fn llm() -> LlmConfig {
        LlmConfig {
            base_url: "http://localhost:1234/v1".into(),
            api_key: "key".into(),
            model: "test".into(),
        }
    }

    #[tokio::test]
    async fn backend_follows_config() {
        let clock = Clock::fixed(fixed_now());
        let api = StudyApiConfig {
            base_url: "http://localhost:8000".into(),
        };
        assert_eq!(
            AppServices::remote(api, clock).backend(),
            GenerationBackend::RemoteApi
        );
        assert_eq!(
            AppServices::in_memory(clock, Some(llm())).backend(),
            GenerationBackend::LocalLlm
        );
        assert_eq!(
            AppServices::in_memory(clock, None).backend(),
            GenerationBackend::Disabled
        );
    }

    #[tokio::test]
    async fn remote_mode_reads_the_catalog_from_the_api() {
        // Nothing listens on the discard port, so every catalog call must fail over HTTP
        // instead of quietly answering from a local store.
        let api = StudyApiConfig {
            base_url: "http://127.0.0.1:9".into(),
        };
        let services = AppServices::remote(api, Clock::fixed(fixed_now()));
        let catalog = services.catalog();

        let err = catalog.list_subjects().await.unwrap_err();
        assert!(matches!(err, CatalogError::Http(_)), "{err:?}");
        let err = catalog.history(SubjectId::new(1)).await.unwrap_err();
        assert!(matches!(err, CatalogError::Http(_)), "{err:?}");
        let err = catalog.recommend(SubjectId::new(1), 3).await.unwrap_err();
        assert!(matches!(err, CatalogError::Http(_)), "{err:?}");
    }

    #[tokio::test]
    async fn local_mode_records_completions_where_history_reads() {
        use study_core::model::CompletionRecord;

        let services = AppServices::in_memory(Clock::fixed(fixed_now()), None);
        let catalog = services.catalog();
        let subject = catalog.create_subject("Math", None).await.unwrap();
        let topic = catalog.create_topic(subject, "Limits", None).await.unwrap();

        let record = CompletionRecord {
            topic_id: topic,
            duration: SessionDuration::Five,
            score: 1,
            total_questions: 1,
        };
        services.reporter.record_completion(&record).await.unwrap();

        let history = catalog.history(subject).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].topic_id, topic);
    }

    #[tokio::test]
    async fn disabled_generation_keeps_selection_open() {
        let services = AppServices::in_memory(Clock::fixed(fixed_now()), None);
        let catalog = services.catalog();
        let subject = catalog.create_subject("Math", None).await.unwrap();
        let topic = catalog.create_topic(subject, "Limits", None).await.unwrap();

        let (mut controller, _ticks) = services.session_controller(SessionDuration::Five);
        let err = controller.generate(subject, topic).await.unwrap_err();
        assert!(matches!(
            err,
            SessionError::Generation(GenerationError::Disabled)
        ));
        assert_eq!(controller.state(), LifecycleState::Selecting);
    }
}
