use std::sync::Arc;

use async_trait::async_trait;
use storage::repository::{
    CompletionRepository, MaterialRecord, NewSubjectRecord, NewTopicRecord, Storage,
    StorageError, SubjectRepository, TopicRepository,
};
use study_core::model::{
    CatalogTopic, CompletionRecord, StudyRecord, Subject, SubjectId, Topic, TopicId,
    TopicStatistics,
};
use study_core::recommend::{self, Recommendation};

use crate::Clock;
use crate::error::{CatalogError, ReportError};
use crate::generation::CompletionReporter;

/// Subjects, topics, material and study history behind the repository traits.
#[derive(Clone)]
pub struct CatalogService {
    clock: Clock,
    subjects: Arc<dyn SubjectRepository>,
    topics: Arc<dyn TopicRepository>,
    completions: Arc<dyn CompletionRepository>,
}

impl CatalogService {
    #[must_use]
    pub fn new(
        clock: Clock,
        subjects: Arc<dyn SubjectRepository>,
        topics: Arc<dyn TopicRepository>,
        completions: Arc<dyn CompletionRepository>,
    ) -> Self {
        Self {
            clock,
            subjects,
            topics,
            completions,
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.subjects),
            Arc::clone(&storage.topics),
            Arc::clone(&storage.completions),
        )
    }

    /// Catalog backed by a fresh in-memory store.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(clock, &Storage::in_memory())
    }

    /// Validate and persist a new subject.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Subject` for validation failures.
    /// Returns `CatalogError::Storage` if persistence fails.
    pub async fn create_subject(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<SubjectId, CatalogError> {
        let subject = Subject::new(SubjectId::new(1), name, description, self.clock.now())?;
        let id = self
            .subjects
            .insert_subject(NewSubjectRecord::from_subject(&subject))
            .await?;
        tracing::info!(subject_id = %id, name = subject.name(), "subject created");
        Ok(id)
    }

    /// Validate and persist a new topic under an existing subject.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Topic` for validation failures.
    /// Returns `CatalogError::Storage` (`NotFound`) if the subject does not exist.
    pub async fn create_topic(
        &self,
        subject_id: SubjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<TopicId, CatalogError> {
        let topic = Topic::new(
            TopicId::new(1),
            subject_id,
            name,
            description,
            self.clock.now(),
        )?;
        let id = self
            .topics
            .insert_topic(NewTopicRecord::from_topic(&topic))
            .await?;
        tracing::info!(topic_id = %id, subject_id = %subject_id, "topic created");
        Ok(id)
    }

    /// All subjects, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_subjects(&self) -> Result<Vec<Subject>, CatalogError> {
        Ok(self.subjects.list_subjects().await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, CatalogError> {
        Ok(self.subjects.get_subject(id).await?)
    }

    /// Topics of one subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, CatalogError> {
        Ok(self.topics.list_topics(subject_id).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, CatalogError> {
        Ok(self.topics.get_topic(id).await?)
    }

    /// Every topic of every subject, with the subject name attached.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn flattened_topics(&self) -> Result<Vec<CatalogTopic>, CatalogError> {
        let mut flattened = Vec::new();
        for subject in self.subjects.list_subjects().await? {
            let topics = self.topics.list_topics(subject.id()).await?;
            flattened.extend(
                topics
                    .into_iter()
                    .map(|topic| CatalogTopic::new(&subject, topic)),
            );
        }
        Ok(flattened)
    }

    /// Attach already-extracted text to a topic.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` (`NotFound`) if the topic does not exist.
    pub async fn attach_material(
        &self,
        topic_id: TopicId,
        content: String,
        source_file: Option<String>,
    ) -> Result<(), CatalogError> {
        let chars = content.chars().count();
        self.topics
            .attach_material(MaterialRecord {
                topic_id,
                content,
                source_file,
                created_at: self.clock.now(),
            })
            .await?;
        tracing::info!(topic_id = %topic_id, chars, "material attached");
        Ok(())
    }

    /// Most recently attached material of a topic.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn latest_material(
        &self,
        topic_id: TopicId,
    ) -> Result<Option<MaterialRecord>, CatalogError> {
        Ok(self.topics.latest_material(topic_id).await?)
    }

    /// Persist a finished session stamped with the service clock.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` (`NotFound`) if the topic does not exist.
    pub async fn record_completion(&self, record: &CompletionRecord) -> Result<i64, CatalogError> {
        let id = self
            .completions
            .append_completion(record, self.clock.now())
            .await?;
        Ok(id)
    }

    /// Completed sessions of a subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn history(&self, subject_id: SubjectId) -> Result<Vec<StudyRecord>, CatalogError> {
        Ok(self.completions.history_for_subject(subject_id).await?)
    }

    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if repository access fails.
    pub async fn statistics(&self, topic_id: TopicId) -> Result<TopicStatistics, CatalogError> {
        Ok(self.completions.topic_statistics(topic_id).await?)
    }

    /// The `limit` topics of a subject that most need attention.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Storage` if the subject does not exist or repository access fails.
    pub async fn recommend(
        &self,
        subject_id: SubjectId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, CatalogError> {
        if self.subjects.get_subject(subject_id).await?.is_none() {
            return Err(StorageError::NotFound.into());
        }

        let mut scored = Vec::new();
        for topic in self.topics.list_topics(subject_id).await? {
            let stats = self.completions.topic_statistics(topic.id()).await?;
            scored.push((topic, stats));
        }
        Ok(recommend::rank(&scored, &self.clock, limit))
    }
}

/// Catalog operations the study loop and the command line rely on.
///
/// Served by [`CatalogService`] over local storage, or by the remote API client when
/// sessions come from a remote server, so topic ids always belong to the store that
/// generates and records the sessions.
#[async_trait]
pub trait StudyCatalog: Send + Sync {
    /// # Errors
    ///
    /// Returns `CatalogError` when the catalog cannot be read.
    async fn list_subjects(&self) -> Result<Vec<Subject>, CatalogError>;

    /// # Errors
    ///
    /// Returns `CatalogError` when the catalog cannot be read.
    async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, CatalogError>;

    /// # Errors
    ///
    /// Returns `CatalogError` for invalid names or when the subject cannot be stored.
    async fn create_subject(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<SubjectId, CatalogError>;

    /// # Errors
    ///
    /// Returns `CatalogError` for invalid names, a missing subject, or a failed write.
    async fn create_topic(
        &self,
        subject_id: SubjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<TopicId, CatalogError>;

    /// # Errors
    ///
    /// Returns `CatalogError` when the topic is missing or the material cannot be stored.
    async fn attach_material(
        &self,
        topic_id: TopicId,
        content: String,
        source_file: Option<String>,
    ) -> Result<(), CatalogError>;

    /// # Errors
    ///
    /// Returns `CatalogError` when the history cannot be read.
    async fn history(&self, subject_id: SubjectId) -> Result<Vec<StudyRecord>, CatalogError>;

    /// # Errors
    ///
    /// Returns `CatalogError` when the subject is missing or the catalog cannot be read.
    async fn recommend(
        &self,
        subject_id: SubjectId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, CatalogError>;

    /// Every topic of every subject, with the subject name attached.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError` when the catalog cannot be read.
    async fn flattened_topics(&self) -> Result<Vec<CatalogTopic>, CatalogError> {
        let mut flattened = Vec::new();
        for subject in self.list_subjects().await? {
            let topics = self.list_topics(subject.id()).await?;
            flattened.extend(
                topics
                    .into_iter()
                    .map(|topic| CatalogTopic::new(&subject, topic)),
            );
        }
        Ok(flattened)
    }
}

#[async_trait]
impl StudyCatalog for CatalogService {
    async fn list_subjects(&self) -> Result<Vec<Subject>, CatalogError> {
        CatalogService::list_subjects(self).await
    }

    async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, CatalogError> {
        CatalogService::list_topics(self, subject_id).await
    }

    async fn create_subject(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<SubjectId, CatalogError> {
        CatalogService::create_subject(self, name, description).await
    }

    async fn create_topic(
        &self,
        subject_id: SubjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<TopicId, CatalogError> {
        CatalogService::create_topic(self, subject_id, name, description).await
    }

    async fn attach_material(
        &self,
        topic_id: TopicId,
        content: String,
        source_file: Option<String>,
    ) -> Result<(), CatalogError> {
        CatalogService::attach_material(self, topic_id, content, source_file).await
    }

    async fn history(&self, subject_id: SubjectId) -> Result<Vec<StudyRecord>, CatalogError> {
        CatalogService::history(self, subject_id).await
    }

    async fn recommend(
        &self,
        subject_id: SubjectId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, CatalogError> {
        CatalogService::recommend(self, subject_id, limit).await
    }

    async fn flattened_topics(&self) -> Result<Vec<CatalogTopic>, CatalogError> {
        CatalogService::flattened_topics(self).await
    }
}

#[async_trait]
impl CompletionReporter for CatalogService {
    async fn record_completion(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        let id = CatalogService::record_completion(self, record).await?;
        tracing::debug!(completion_id = id, topic_id = %record.topic_id, "completion recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;
    use study_core::model::{SessionDuration, SessionResult};
    use study_core::time::fixed_now;

    #[tokio::test]
    async fn flattened_topics_span_all_subjects() {
        let catalog = CatalogService::in_memory(Clock::fixed(fixed_now()));
        let math = catalog.create_subject("Math", None).await.unwrap();
        let history = catalog.create_subject("History", None).await.unwrap();
        catalog.create_topic(math, "Limits", None).await.unwrap();
        catalog.create_topic(math, "Series", None).await.unwrap();
        catalog.create_topic(history, "Rome", None).await.unwrap();

        let flattened = catalog.flattened_topics().await.unwrap();
        assert_eq!(flattened.len(), 3);
        let rome = flattened
            .iter()
            .find(|t| t.topic.name() == "Rome")
            .unwrap();
        assert_eq!(rome.subject_name, "History");
        assert_eq!(rome.subject_id(), history);
    }

    #[tokio::test]
    async fn blank_subject_name_is_rejected() {
        let catalog = CatalogService::in_memory(Clock::fixed(fixed_now()));
        let err = catalog.create_subject("   ", None).await.unwrap_err();
        assert!(matches!(err, CatalogError::Subject(_)));
    }

    #[tokio::test]
    async fn topic_under_missing_subject_is_not_found() {
        let catalog = CatalogService::in_memory(Clock::fixed(fixed_now()));
        let err = catalog
            .create_topic(SubjectId::new(42), "Orphan", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CatalogError::Storage(StorageError::NotFound)));
    }

    #[tokio::test]
    async fn reporter_records_history() {
        let catalog = CatalogService::in_memory(Clock::fixed(fixed_now()));
        let subject = catalog.create_subject("Math", None).await.unwrap();
        let topic = catalog.create_topic(subject, "Limits", None).await.unwrap();

        let record = CompletionRecord::new(
            topic,
            SessionDuration::Five,
            SessionResult {
                score: 2,
                total_questions: 3,
            },
        );
        CompletionReporter::record_completion(&catalog, &record)
            .await
            .unwrap();

        let history = catalog.history(subject).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].topic_name, "Limits");
        assert_eq!(history[0].score, 2);

        let stats = catalog.statistics(topic).await.unwrap();
        assert_eq!(stats.session_count, 1);
        assert_eq!(stats.last_studied, Some(fixed_now()));
    }

    #[tokio::test]
    async fn recommend_prefers_unstudied_topics() {
        let now = fixed_now();
        let storage = Storage::in_memory();
        let earlier = CatalogService::from_storage(Clock::fixed(now - Duration::days(4)), &storage);
        let subject = earlier.create_subject("Math", None).await.unwrap();
        let studied = earlier.create_topic(subject, "Limits", None).await.unwrap();
        let fresh = earlier.create_topic(subject, "Series", None).await.unwrap();
        earlier
            .record_completion(&CompletionRecord::new(
                studied,
                SessionDuration::Ten,
                SessionResult {
                    score: 3,
                    total_questions: 3,
                },
            ))
            .await
            .unwrap();

        let catalog = CatalogService::from_storage(Clock::fixed(now), &storage);
        let ranked = catalog.recommend(subject, 5).await.unwrap();
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].topic_id, fresh);
        assert!((ranked[1].priority - 20.0).abs() < f64::EPSILON);

        let top = catalog.recommend(subject, 1).await.unwrap();
        assert_eq!(top.len(), 1);
    }

    #[tokio::test]
    async fn recommend_for_missing_subject_fails() {
        let catalog = CatalogService::in_memory(Clock::fixed(fixed_now()));
        let err = catalog.recommend(SubjectId::new(7), 3).await.unwrap_err();
        assert!(matches!(err, CatalogError::Storage(StorageError::NotFound)));
    }
}
