use chrono::{DateTime, Utc};
use sqlx::Row;
use study_core::model::{
    CompletionRecord, StudyRecord, SubjectId, TopicId, TopicStatistics,
};

use super::SqliteRepository;
use super::mapping::{
    conn, duration_from_i64, id_i64, ser, topic_id_from_i64, u32_from_i64, write_err,
};
use crate::repository::{CompletionRepository, StorageError};

fn map_completion(row: &sqlx::sqlite::SqliteRow) -> Result<CompletionRecord, StorageError> {
    Ok(CompletionRecord {
        topic_id: topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
        duration: duration_from_i64(row.try_get("duration").map_err(ser)?)?,
        score: u32_from_i64("score", row.try_get("score").map_err(ser)?)?,
        total_questions: u32_from_i64(
            "total_questions",
            row.try_get("total_questions").map_err(ser)?,
        )?,
    })
}

#[async_trait::async_trait]
impl CompletionRepository for SqliteRepository {
    async fn append_completion(
        &self,
        record: &CompletionRecord,
        completed_at: DateTime<Utc>,
    ) -> Result<i64, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO study_sessions (topic_id, duration, score, total_questions, completed_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_i64("topic_id", record.topic_id.value())?)
        .bind(i64::from(record.duration.minutes()))
        .bind(i64::from(record.score))
        .bind(i64::from(record.total_questions))
        .bind(completed_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(res.last_insert_rowid())
    }

    async fn history_for_subject(
        &self,
        subject_id: SubjectId,
    ) -> Result<Vec<StudyRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT ss.id, ss.topic_id, ss.duration, ss.score, ss.total_questions,
                   ss.completed_at, t.name AS topic_name, s.name AS subject_name
            FROM study_sessions ss
            JOIN topics t ON ss.topic_id = t.id
            JOIN subjects s ON t.subject_id = s.id
            WHERE s.id = ?1
            ORDER BY ss.completed_at DESC, ss.id DESC
            ",
        )
        .bind(id_i64("subject_id", subject_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let record = map_completion(&row)?;
            out.push(StudyRecord {
                id: row.try_get("id").map_err(ser)?,
                topic_id: record.topic_id,
                topic_name: row.try_get("topic_name").map_err(ser)?,
                subject_name: row.try_get("subject_name").map_err(ser)?,
                duration: record.duration,
                score: record.score,
                total_questions: record.total_questions,
                completed_at: row.try_get("completed_at").map_err(ser)?,
            });
        }
        Ok(out)
    }

    async fn topic_statistics(&self, topic_id: TopicId) -> Result<TopicStatistics, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT topic_id, duration, score, total_questions, completed_at
            FROM study_sessions
            WHERE topic_id = ?1
            ",
        )
        .bind(id_i64("topic_id", topic_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut completions = Vec::with_capacity(rows.len());
        for row in &rows {
            let at: DateTime<Utc> = row.try_get("completed_at").map_err(ser)?;
            completions.push((map_completion(row)?, at));
        }
        Ok(TopicStatistics::from_completions(
            completions.iter().map(|(record, at)| (record, *at)),
        ))
    }
}
