use std::env;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use storage::repository::StorageError;
use study_core::model::{
    CompletionRecord, SessionDuration, SessionPayload, StudyRecord, StudySession, Subject,
    SubjectId, Topic, TopicId, TopicStatistics,
};
use study_core::recommend::{Recommendation, recommendation_reason};

use super::{CompletionReporter, SessionGenerator, SessionRequest};
use crate::Clock;
use crate::catalog::StudyCatalog;
use crate::error::{CatalogError, GenerationError, ReportError};

/// Location of a remote Study Sprint API.
#[derive(Clone, Debug)]
pub struct StudyApiConfig {
    pub base_url: String,
}

impl StudyApiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("STUDY_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        Some(Self { base_url })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url.trim_end_matches('/'))
    }
}

/// JSON client for a remote Study Sprint API.
///
/// Serves session generation, completion reports and the catalog, so every topic id
/// it hands out is one the same server can generate and record sessions for.
#[derive(Clone)]
pub struct StudyApiClient {
    client: Client,
    config: StudyApiConfig,
    clock: Clock,
}

impl StudyApiClient {
    #[must_use]
    pub fn new(config: StudyApiConfig, clock: Clock) -> Self {
        Self {
            client: Client::new(),
            config,
            clock,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, CatalogError> {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "catalog request");
        read_json(self.client.get(url)).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, CatalogError>
    where
        B: Serialize + Sync,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        tracing::debug!(%url, "catalog write");
        read_json(self.client.post(url).json(body)).await
    }
}

async fn read_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, CatalogError> {
    let response = request.send().await?;
    match response.status() {
        StatusCode::NOT_FOUND => return Err(StorageError::NotFound.into()),
        status if !status.is_success() => return Err(CatalogError::HttpStatus(status)),
        _ => {}
    }
    let body = response.text().await?;
    parse_json(&body)
}

fn parse_json<T: DeserializeOwned>(body: &str) -> Result<T, CatalogError> {
    serde_json::from_str(body).map_err(|e| CatalogError::Malformed(e.to_string()))
}

/// Server rows carry `SQLite` `CURRENT_TIMESTAMP` text (UTC, no offset); RFC 3339 also passes.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, CatalogError> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| CatalogError::Malformed(format!("unreadable timestamp {raw:?}")))
}

#[derive(Debug, Serialize)]
struct NewEntryWire<'a> {
    name: &'a str,
    description: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SubjectWire {
    id: SubjectId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    created_at: String,
}

impl SubjectWire {
    fn into_subject(self) -> Result<Subject, CatalogError> {
        let created_at = parse_timestamp(&self.created_at)?;
        Ok(Subject::new(self.id, self.name, self.description, created_at)?)
    }
}

#[derive(Debug, Deserialize)]
struct TopicWire {
    id: TopicId,
    subject_id: SubjectId,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    has_content: bool,
    created_at: String,
}

impl TopicWire {
    fn into_topic(self) -> Result<Topic, CatalogError> {
        let created_at = parse_timestamp(&self.created_at)?;
        let topic = Topic::new(
            self.id,
            self.subject_id,
            self.name,
            self.description,
            created_at,
        )?;
        Ok(topic.with_content(self.has_content))
    }
}

#[derive(Debug, Deserialize)]
struct HistoryWire {
    id: i64,
    topic_id: TopicId,
    topic_name: String,
    subject_name: String,
    duration: SessionDuration,
    score: u32,
    total_questions: u32,
    completed_at: String,
}

impl HistoryWire {
    fn into_record(self) -> Result<StudyRecord, CatalogError> {
        Ok(StudyRecord {
            completed_at: parse_timestamp(&self.completed_at)?,
            id: self.id,
            topic_id: self.topic_id,
            topic_name: self.topic_name,
            subject_name: self.subject_name,
            duration: self.duration,
            score: self.score,
            total_questions: self.total_questions,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RecommendationsWire {
    recommendations: Vec<RecommendationWire>,
}

#[derive(Debug, Deserialize)]
struct RecommendationWire {
    topic_id: TopicId,
    topic_name: String,
    priority_score: f64,
    times_studied: u32,
    #[serde(default)]
    last_studied: Option<String>,
    /// Percent, unlike the 0..1 ratio used locally.
    #[serde(default)]
    average_performance: Option<f64>,
}

/// Rebuilds the reason locally so remote and local recommendations read the same.
fn recommendation_from_wire(
    wire: RecommendationWire,
    clock: &Clock,
) -> Result<Recommendation, CatalogError> {
    let stats = TopicStatistics {
        session_count: wire.times_studied,
        last_studied: wire.last_studied.as_deref().map(parse_timestamp).transpose()?,
        avg_performance: wire.average_performance.map(|percent| percent / 100.0),
    };
    Ok(Recommendation {
        topic_id: wire.topic_id,
        topic_name: wire.topic_name,
        priority: wire.priority_score,
        times_studied: stats.session_count,
        last_studied: stats.last_studied,
        average_performance: stats.avg_performance,
        reason: recommendation_reason(&stats, clock),
    })
}

#[async_trait]
impl StudyCatalog for StudyApiClient {
    async fn list_subjects(&self) -> Result<Vec<Subject>, CatalogError> {
        let rows: Vec<SubjectWire> = self.get_json("subjects").await?;
        rows.into_iter().map(SubjectWire::into_subject).collect()
    }

    async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, CatalogError> {
        let rows: Vec<TopicWire> = self
            .get_json(&format!("subjects/{subject_id}/topics"))
            .await?;
        rows.into_iter().map(TopicWire::into_topic).collect()
    }

    async fn create_subject(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<SubjectId, CatalogError> {
        let body = NewEntryWire {
            name,
            description: description.as_deref(),
        };
        let created: SubjectWire = self.post_json("subjects", &body).await?;
        Ok(created.into_subject()?.id())
    }

    async fn create_topic(
        &self,
        subject_id: SubjectId,
        name: &str,
        description: Option<String>,
    ) -> Result<TopicId, CatalogError> {
        let body = NewEntryWire {
            name,
            description: description.as_deref(),
        };
        let created: TopicWire = self
            .post_json(&format!("subjects/{subject_id}/topics"), &body)
            .await?;
        Ok(created.into_topic()?.id())
    }

    async fn attach_material(
        &self,
        _topic_id: TopicId,
        _content: String,
        _source_file: Option<String>,
    ) -> Result<(), CatalogError> {
        // The server only takes PDF uploads.
        Err(CatalogError::Unsupported("attaching text material"))
    }

    async fn history(&self, subject_id: SubjectId) -> Result<Vec<StudyRecord>, CatalogError> {
        let rows: Vec<HistoryWire> = self.get_json(&format!("history/{subject_id}")).await?;
        rows.into_iter().map(HistoryWire::into_record).collect()
    }

    async fn recommend(
        &self,
        subject_id: SubjectId,
        limit: usize,
    ) -> Result<Vec<Recommendation>, CatalogError> {
        let wire: RecommendationsWire = self
            .get_json(&format!("recommendations/{subject_id}"))
            .await?;
        wire.recommendations
            .into_iter()
            .take(limit)
            .map(|row| recommendation_from_wire(row, &self.clock))
            .collect()
    }
}

#[async_trait]
impl SessionGenerator for StudyApiClient {
    async fn generate_session(
        &self,
        request: &SessionRequest,
    ) -> Result<StudySession, GenerationError> {
        let url = self.config.endpoint("session/generate");
        tracing::debug!(%url, topic_id = %request.topic_id, "requesting session");

        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(GenerationError::HttpStatus(response.status()));
        }

        let body = response.text().await?;
        parse_session_body(&body)
    }
}

#[async_trait]
impl CompletionReporter for StudyApiClient {
    async fn record_completion(&self, record: &CompletionRecord) -> Result<(), ReportError> {
        let url = self.config.endpoint("session/complete");
        let response = self.client.post(url).json(record).send().await?;
        if !response.status().is_success() {
            return Err(ReportError::HttpStatus(response.status()));
        }
        Ok(())
    }
}

fn parse_session_body(body: &str) -> Result<StudySession, GenerationError> {
    if body.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    let payload: SessionPayload =
        serde_json::from_str(body).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    Ok(StudySession::from_payload(payload)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let config = StudyApiConfig {
            base_url: "http://localhost:8000/".into(),
        };
        assert_eq!(
            config.endpoint("session/generate"),
            "http://localhost:8000/session/generate"
        );
    }

    #[test]
    fn parses_backend_session_shape() {
        let body = r#"{
            "topic_id": 3,
            "topic_name": "Limits",
            "duration": 10,
            "learning_objective": "Understand limits",
            "content": "A limit is...",
            "key_concepts": ["epsilon", "delta"],
            "quiz": [
                {"question": "What?", "options": ["a", "b", "c"], "correct_answer": 1}
            ]
        }"#;
        let session = parse_session_body(body).unwrap();
        assert_eq!(session.topic_name(), "Limits");
        assert_eq!(session.duration().minutes(), 10);
        assert_eq!(session.quiz().len(), 1);
        assert_eq!(session.key_concepts(), ["epsilon", "delta"]);
    }

    #[test]
    fn unsupported_duration_is_malformed() {
        let body = r#"{"topic_id": 3, "topic_name": "Limits", "duration": 30}"#;
        let err = parse_session_body(body).unwrap_err();
        assert!(matches!(err, GenerationError::Malformed(_)));
    }

    #[test]
    fn out_of_range_answer_is_invalid_payload() {
        let body = r#"{
            "topic_id": 3, "topic_name": "Limits", "duration": 5,
            "quiz": [{"question": "Q", "options": ["a", "b"], "correct_answer": 2}]
        }"#;
        let err = parse_session_body(body).unwrap_err();
        assert!(matches!(err, GenerationError::InvalidPayload(_)));
    }

    #[test]
    fn empty_body_is_empty_response() {
        assert!(matches!(
            parse_session_body("  "),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn subjects_and_topics_map_from_server_rows() {
        let subjects: Vec<SubjectWire> = parse_json(
            r#"[{"id": 4, "name": "Math", "description": null, "created_at": "2024-03-01 09:30:00"}]"#,
        )
        .unwrap();
        let subject = subjects.into_iter().next().unwrap().into_subject().unwrap();
        assert_eq!(subject.id(), SubjectId::new(4));
        assert_eq!(subject.name(), "Math");
        assert_eq!(
            subject.created_at(),
            DateTime::parse_from_rfc3339("2024-03-01T09:30:00Z").unwrap()
        );

        let topic: TopicWire = parse_json(
            r#"{"id": 9, "subject_id": 4, "name": "Limits", "has_content": true,
                "created_at": "2024-03-01T09:31:00Z"}"#,
        )
        .unwrap();
        let topic = topic.into_topic().unwrap();
        assert_eq!(topic.id(), TopicId::new(9));
        assert_eq!(topic.subject_id(), SubjectId::new(4));
        assert!(topic.has_content());
    }

    #[test]
    fn blank_remote_name_is_rejected() {
        let subject: SubjectWire =
            parse_json(r#"{"id": 1, "name": "  ", "created_at": "2024-03-01 09:30:00"}"#).unwrap();
        assert!(matches!(
            subject.into_subject(),
            Err(CatalogError::Subject(_))
        ));
    }

    #[test]
    fn history_rows_keep_server_ids() {
        let rows: Vec<HistoryWire> = parse_json(
            r#"[{"id": 12, "topic_id": 9, "topic_name": "Limits", "subject_name": "Math",
                 "duration": 10, "score": 2, "total_questions": 3,
                 "completed_at": "2024-03-02 18:00:05", "content": "ignored"}]"#,
        )
        .unwrap();
        let record = rows.into_iter().next().unwrap().into_record().unwrap();
        assert_eq!(record.id, 12);
        assert_eq!(record.topic_id, TopicId::new(9));
        assert_eq!(record.duration, SessionDuration::Ten);
        assert_eq!(record.completed_at.format("%H:%M:%S").to_string(), "18:00:05");
    }

    #[test]
    fn recommendations_rebuild_reason_from_percent() {
        use study_core::recommend::RecommendationReason;
        use study_core::time::fixed_now;

        let now = fixed_now();
        let three_days_ago = (now - chrono::Duration::days(3))
            .format("%Y-%m-%d %H:%M:%S")
            .to_string();
        let body = format!(
            r#"{{"recommendations": [
                {{"topic_id": 9, "topic_name": "Limits", "priority_score": 45.5,
                  "times_studied": 2, "last_studied": "{three_days_ago}",
                  "average_performance": 40.0, "reason": "ignored"}},
                {{"topic_id": 10, "topic_name": "Series", "priority_score": 100.0,
                  "times_studied": 0, "last_studied": null, "average_performance": null,
                  "reason": "ignored"}}
            ]}}"#
        );
        let wire: RecommendationsWire = parse_json(&body).unwrap();
        let clock = Clock::fixed(now);
        let recommendations: Vec<Recommendation> = wire
            .recommendations
            .into_iter()
            .map(|row| recommendation_from_wire(row, &clock))
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(recommendations[0].average_performance, Some(0.4));
        assert_eq!(
            recommendations[0].reason,
            RecommendationReason::Needs {
                days_since: Some(3),
                performance_percent: Some(40),
            }
        );
        assert_eq!(recommendations[1].reason, RecommendationReason::NeverStudied);
        assert_eq!(recommendations[1].priority, 100.0);
    }

    #[test]
    fn unreadable_timestamp_is_malformed() {
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(CatalogError::Malformed(_))
        ));
    }

    #[test]
    fn request_serializes_plain_ids() {
        use study_core::model::{SessionDuration, SubjectId, TopicId};

        let request = SessionRequest {
            subject_id: SubjectId::new(1),
            topic_id: TopicId::new(2),
            duration: SessionDuration::Fifteen,
        };
        let json = serde_json::to_value(request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"subject_id": 1, "topic_id": 2, "duration": 15})
        );
    }
}
