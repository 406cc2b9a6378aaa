use rand::Rng;
use rand::seq::IndexedRandom;
use study_core::model::{CatalogTopic, Subject, SubjectId, Topic, TopicId};

use crate::catalog::StudyCatalog;
use crate::error::SessionError;

/// Pick one topic uniformly from the flattened catalog.
///
/// # Errors
///
/// Returns `SessionError::EmptyCatalog` when there is nothing to pick.
pub fn resolve_random<'a, R: Rng + ?Sized>(
    topics: &'a [CatalogTopic],
    rng: &mut R,
) -> Result<&'a CatalogTopic, SessionError> {
    topics.choose(rng).ok_or(SessionError::EmptyCatalog)
}

/// Subject then topic, chosen by the learner with random suggestions.
///
/// The topic choice always belongs to the chosen subject.
#[derive(Debug, Clone)]
pub struct ManualSelection {
    subjects: Vec<Subject>,
    subject_id: SubjectId,
    topics: Vec<Topic>,
    topic_id: Option<TopicId>,
}

impl ManualSelection {
    /// Suggest a random subject and, if it has topics, a random topic.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyCatalog` when `subjects` is empty.
    /// Returns `SessionError::Catalog` if topics cannot be listed.
    pub async fn start<R: Rng + ?Sized>(
        catalog: &dyn StudyCatalog,
        subjects: Vec<Subject>,
        rng: &mut R,
    ) -> Result<Self, SessionError> {
        let subject_id = subjects
            .choose(rng)
            .map(Subject::id)
            .ok_or(SessionError::EmptyCatalog)?;
        let topics = catalog.list_topics(subject_id).await?;
        let topic_id = topics.choose(rng).map(Topic::id);
        tracing::debug!(%subject_id, ?topic_id, "manual selection suggested");
        Ok(Self {
            subjects,
            subject_id,
            topics,
            topic_id,
        })
    }

    /// Switch to another listed subject and suggest one of its topics.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::UnknownSubject` when the id is not listed.
    /// Returns `SessionError::Catalog` if topics cannot be listed.
    pub async fn choose_subject<R: Rng + ?Sized>(
        &mut self,
        subject_id: SubjectId,
        catalog: &dyn StudyCatalog,
        rng: &mut R,
    ) -> Result<(), SessionError> {
        if !self.subjects.iter().any(|s| s.id() == subject_id) {
            return Err(SessionError::UnknownSubject(subject_id));
        }
        let topics = catalog.list_topics(subject_id).await?;
        self.topic_id = topics.choose(rng).map(Topic::id);
        self.topics = topics;
        self.subject_id = subject_id;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `SessionError::UnknownTopic` when the id is not one of the listed topics.
    pub fn choose_topic(&mut self, topic_id: TopicId) -> Result<(), SessionError> {
        if !self.topics.iter().any(|t| t.id() == topic_id) {
            return Err(SessionError::UnknownTopic(topic_id));
        }
        self.topic_id = Some(topic_id);
        Ok(())
    }

    #[must_use]
    pub fn resolved(&self) -> Option<(SubjectId, TopicId)> {
        self.topic_id.map(|topic_id| (self.subject_id, topic_id))
    }

    #[must_use]
    pub fn subjects(&self) -> &[Subject] {
        &self.subjects
    }

    #[must_use]
    pub fn topics(&self) -> &[Topic] {
        &self.topics
    }

    #[must_use]
    pub fn subject_id(&self) -> SubjectId {
        self.subject_id
    }

    #[must_use]
    pub fn topic_id(&self) -> Option<TopicId> {
        self.topic_id
    }
}
