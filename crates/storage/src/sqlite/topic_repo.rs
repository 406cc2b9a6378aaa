use sqlx::Row;
use study_core::model::{SubjectId, Topic, TopicId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_topic_row, ser, topic_id_from_i64, write_err};
use crate::repository::{MaterialRecord, NewTopicRecord, StorageError, TopicRepository};

const TOPIC_COLUMNS: &str = r"
    t.id, t.subject_id, t.name, t.description, t.created_at,
    EXISTS (SELECT 1 FROM topic_materials m WHERE m.topic_id = t.id) AS has_content
";

#[async_trait::async_trait]
impl TopicRepository for SqliteRepository {
    async fn insert_topic(&self, topic: NewTopicRecord) -> Result<TopicId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO topics (subject_id, name, description, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("subject_id", topic.subject_id.value())?)
        .bind(topic.name)
        .bind(topic.description)
        .bind(topic.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        topic_id_from_i64(res.last_insert_rowid())
    }

    async fn get_topic(&self, id: TopicId) -> Result<Option<Topic>, StorageError> {
        let sql = format!("SELECT {TOPIC_COLUMNS} FROM topics t WHERE t.id = ?1");
        let row = sqlx::query(&sql)
            .bind(id_i64("topic_id", id.value())?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.as_ref().map(map_topic_row).transpose()
    }

    async fn list_topics(&self, subject_id: SubjectId) -> Result<Vec<Topic>, StorageError> {
        let sql = format!(
            "SELECT {TOPIC_COLUMNS} FROM topics t WHERE t.subject_id = ?1 \
             ORDER BY t.created_at DESC, t.id DESC"
        );
        let rows = sqlx::query(&sql)
            .bind(id_i64("subject_id", subject_id.value())?)
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_topic_row).collect()
    }

    async fn attach_material(&self, material: MaterialRecord) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO topic_materials (topic_id, content, source_file, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ",
        )
        .bind(id_i64("topic_id", material.topic_id.value())?)
        .bind(material.content)
        .bind(material.source_file)
        .bind(material.created_at)
        .execute(&self.pool)
        .await
        .map_err(write_err)?;

        Ok(())
    }

    async fn latest_material(
        &self,
        topic_id: TopicId,
    ) -> Result<Option<MaterialRecord>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT topic_id, content, source_file, created_at
            FROM topic_materials
            WHERE topic_id = ?1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            ",
        )
        .bind(id_i64("topic_id", topic_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(MaterialRecord {
            topic_id: topic_id_from_i64(row.try_get("topic_id").map_err(ser)?)?,
            content: row.try_get("content").map_err(ser)?,
            source_file: row.try_get("source_file").map_err(ser)?,
            created_at: row.try_get("created_at").map_err(ser)?,
        }))
    }
}
