use async_trait::async_trait;
use chrono::{DateTime, Utc};
use study_core::model::{
    CompletionRecord, StudyRecord, Subject, SubjectId, Topic, TopicId, TopicStatistics,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Insert shape for a subject; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewSubjectRecord {
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewSubjectRecord {
    /// Build an insert record from an already validated subject (its id is ignored).
    #[must_use]
    pub fn from_subject(subject: &Subject) -> Self {
        Self {
            name: subject.name().to_owned(),
            description: subject.description().map(ToOwned::to_owned),
            created_at: subject.created_at(),
        }
    }
}

/// Insert shape for a topic; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewTopicRecord {
    pub subject_id: SubjectId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl NewTopicRecord {
    #[must_use]
    pub fn from_topic(topic: &Topic) -> Self {
        Self {
            subject_id: topic.subject_id(),
            name: topic.name().to_owned(),
            description: topic.description().map(ToOwned::to_owned),
            created_at: topic.created_at(),
        }
    }
}

/// Extracted study material attached to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterialRecord {
    pub topic_id: TopicId,
    pub content: String,
    pub source_file: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait SubjectRepository: Send + Sync {
    /// Persist a new subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the subject cannot be stored.
    async fn insert_subject(&self, subject: NewSubjectRecord) -> Result<SubjectId, StorageError>;

    /// Fetch a subject by ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError>;

    /// List every subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError>;
}

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Persist a new topic under an existing subject.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the subject does not exist.
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError>;

    /// Fetch a topic by ID, with `has_content` resolved.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError>;

    /// List the topics of a subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, StorageError>;

    /// Attach study material to a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn attach_material(&self, material: MaterialRecord) -> Result<(), StorageError>;

    /// Most recently attached material of a topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn latest_material(
        &self,
        topic_id: TopicId,
    ) -> Result<Option<MaterialRecord>, StorageError>;
}

#[async_trait]
pub trait CompletionRepository: Send + Sync {
    /// Append a finished session and return its row id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the topic does not exist.
    async fn append_completion(
        &self,
        record: &CompletionRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, StorageError>;

    /// Completed sessions of every topic of a subject, newest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn history_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<StudyRecord>, StorageError>;

    /// Aggregate history of a single topic.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn topic_statistics(&self, topic_id: TopicId) -> Result<TopicStatistics, StorageError>;
}

//
// ─── IN-MEMORY ─────────────────────────────────────────────────────────────────
//

#[derive(Default)]
struct MemoryState {
    subjects: HashMap<SubjectId, Subject>,
    topics: HashMap<TopicId, Topic>,
    materials: Vec<MaterialRecord>,
    completions: Vec<(i64, CompletionRecord, DateTime<Utc>)>,
    next_subject: u64,
    next_topic: u64,
}

impl MemoryState {
    fn topic_with_content(&self, topic: &Topic) -> Topic {
        let has_content = self.materials.iter().any(|m| m.topic_id == topic.id());
        topic.clone().with_content(has_content)
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl SubjectRepository for InMemoryRepository {
    async fn insert_subject(&self, subject: NewSubjectRecord) -> Result<SubjectId, StorageError> {
        let mut guard = self.lock()?;
        guard.next_subject += 1;
        let id = SubjectId::new(guard.next_subject);
        let subject = Subject::new(id, subject.name, subject.description, subject.created_at)
            .map_err(ser)?;
        guard.subjects.insert(id, subject);
        Ok(id)
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.subjects.get(&id).cloned())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let guard = self.lock()?;
        let mut subjects: Vec<Subject> = guard.subjects.values().cloned().collect();
        subjects.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(subjects)
    }
}

#[async_trait]
impl TopicRepository for InMemoryRepository {
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let mut guard = self.lock()?;
        if !guard.subjects.contains_key(&topic.subject_id) {
            return Err(StorageError::NotFound);
        }
        guard.next_topic += 1;
        let id = TopicId::new(guard.next_topic);
        let topic = Topic::new(
            id,
            topic.subject_id,
            topic.name,
            topic.description,
            topic.created_at,
        )
        .map_err(ser)?;
        guard.topics.insert(id, topic);
        Ok(id)
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let guard = self.lock()?;
        Ok(guard.topics.get(&id).map(|t| guard.topic_with_content(t)))
    }

    async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, StorageError> {
        let guard = self.lock()?;
        let mut topics: Vec<Topic> = guard
            .topics
            .values()
            .filter(|t| t.subject_id() == subject_id)
            .map(|t| guard.topic_with_content(t))
            .collect();
        topics.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        Ok(topics)
    }

    async fn attach_material(&self, material: MaterialRecord) -> Result<(), StorageError> {
        let mut guard = self.lock()?;
        if !guard.topics.contains_key(&material.topic_id) {
            return Err(StorageError::NotFound);
        }
        guard.materials.push(material);
        Ok(())
    }

    async fn latest_material(
        &self,
        topic_id: TopicId,
    ) -> Result<Option<MaterialRecord>, StorageError> {
        let guard = self.lock()?;
        // max_by_key keeps the last maximum, so later inserts win ties.
        Ok(guard
            .materials
            .iter()
            .filter(|m| m.topic_id == topic_id)
            .max_by_key(|m| m.created_at)
            .cloned())
    }
}

#[async_trait]
impl CompletionRepository for InMemoryRepository {
    async fn append_completion(
        &self,
        record: &CompletionRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let mut guard = self.lock()?;
        if !guard.topics.contains_key(&record.topic_id) {
            return Err(StorageError::NotFound);
        }
        let id = i64::try_from(guard.completions.len() + 1)
            .map_err(|_| StorageError::Serialization("completion id overflow".into()))?;
        guard.completions.push((id, *record, completed_at));
        Ok(id)
    }

    async fn history_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<StudyRecord>, StorageError> {
        let guard = self.lock()?;
        let Some(subject) = guard.subjects.get(&subject_id) else {
            return Ok(Vec::new());
        };
        let mut out: Vec<StudyRecord> = guard
            .completions
            .iter()
            .filter_map(|(id, record, completed_at)| {
                let topic = guard.topics.get(&record.topic_id)?;
                (topic.subject_id() == subject_id).then(|| StudyRecord {
                    id: *id,
                    topic_id: record.topic_id,
                    topic_name: topic.name().to_owned(),
                    subject_name: subject.name().to_owned(),
                    duration: record.duration,
                    score: record.score,
                    total_questions: record.total_questions,
                    completed_at: *completed_at,
                })
            })
            .collect();
        out.sort_by(|a, b| {
            b.completed_at
                .cmp(&a.completed_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(out)
    }

    async fn topic_statistics(&self, topic_id: TopicId) -> Result<TopicStatistics, StorageError> {
        let guard = self.lock()?;
        Ok(TopicStatistics::from_completions(
            guard
                .completions
                .iter()
                .filter(|(_, record, _)| record.topic_id == topic_id)
                .map(|(_, record, at)| (record, *at)),
        ))
    }
}

/// Aggregates catalog repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub subjects: Arc<dyn SubjectRepository>,
    pub topics: Arc<dyn TopicRepository>,
    pub completions: Arc<dyn CompletionRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            subjects: Arc::new(repo.clone()),
            topics: Arc::new(repo.clone()),
            completions: Arc::new(repo),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use study_core::model::SessionDuration;
    use study_core::time::fixed_now;

    fn new_subject(name: &str, offset_days: i64) -> NewSubjectRecord {
        NewSubjectRecord {
            name: name.into(),
            description: None,
            created_at: fixed_now() + Duration::days(offset_days),
        }
    }

    fn new_topic(subject_id: SubjectId, name: &str) -> NewTopicRecord {
        NewTopicRecord {
            subject_id,
            name: name.into(),
            description: None,
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn subjects_list_newest_first() {
        let repo = InMemoryRepository::new();
        let old = repo.insert_subject(new_subject("Old", 0)).await.unwrap();
        let new = repo.insert_subject(new_subject("New", 1)).await.unwrap();

        let listed = repo.list_subjects().await.unwrap();
        let ids: Vec<_> = listed.iter().map(Subject::id).collect();
        assert_eq!(ids, vec![new, old]);
    }

    #[tokio::test]
    async fn topic_requires_existing_subject() {
        let repo = InMemoryRepository::new();
        let err = repo
            .insert_topic(new_topic(SubjectId::new(99), "Orphan"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn attaching_material_sets_has_content() {
        let repo = InMemoryRepository::new();
        let subject = repo.insert_subject(new_subject("Math", 0)).await.unwrap();
        let topic = repo.insert_topic(new_topic(subject, "Sets")).await.unwrap();
        assert!(!repo.get_topic(topic).await.unwrap().unwrap().has_content());

        repo.attach_material(MaterialRecord {
            topic_id: topic,
            content: "A set is a collection.".into(),
            source_file: Some("sets.txt".into()),
            created_at: fixed_now(),
        })
        .await
        .unwrap();

        let listed = repo.list_topics(subject).await.unwrap();
        assert!(listed[0].has_content());
        let material = repo.latest_material(topic).await.unwrap().unwrap();
        assert_eq!(material.source_file.as_deref(), Some("sets.txt"));
    }

    #[tokio::test]
    async fn history_joins_names_and_stats_aggregate() {
        let repo = InMemoryRepository::new();
        let subject = repo.insert_subject(new_subject("Math", 0)).await.unwrap();
        let topic = repo.insert_topic(new_topic(subject, "Sets")).await.unwrap();
        let record = CompletionRecord {
            topic_id: topic,
            duration: SessionDuration::Ten,
            score: 2,
            total_questions: 4,
        };
        repo.append_completion(&record, fixed_now()).await.unwrap();
        repo.append_completion(&record, fixed_now() + Duration::hours(1))
            .await
            .unwrap();

        let history = repo.history_for_subject(subject).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, 2);
        assert_eq!(history[0].topic_name, "Sets");
        assert_eq!(history[0].subject_name, "Math");

        let stats = repo.topic_statistics(topic).await.unwrap();
        assert_eq!(stats.session_count, 2);
        assert_eq!(stats.avg_performance, Some(0.5));
        assert_eq!(stats.last_studied, Some(fixed_now() + Duration::hours(1)));
    }
}
