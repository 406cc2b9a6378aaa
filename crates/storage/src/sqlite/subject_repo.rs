use study_core::model::{Subject, SubjectId};

use super::SqliteRepository;
use super::mapping::{conn, id_i64, map_subject_row, subject_id_from_i64};
use crate::repository::{NewSubjectRecord, StorageError, SubjectRepository};

#[async_trait::async_trait]
impl SubjectRepository for SqliteRepository {
    async fn insert_subject(&self, subject: NewSubjectRecord) -> Result<SubjectId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO subjects (name, description, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(subject.name)
        .bind(subject.description)
        .bind(subject.created_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        subject_id_from_i64(res.last_insert_rowid())
    }

    async fn get_subject(&self, id: SubjectId) -> Result<Option<Subject>, StorageError> {
        let row = sqlx::query(
            r"
            SELECT id, name, description, created_at
            FROM subjects WHERE id = ?1
            ",
        )
        .bind(id_i64("subject_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(conn)?;

        row.as_ref().map(map_subject_row).transpose()
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, name, description, created_at
            FROM subjects
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        rows.iter().map(map_subject_row).collect()
    }
}
