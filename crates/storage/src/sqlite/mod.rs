use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;

use crate::repository::{CompletionRepository, Storage, SubjectRepository, TopicRepository};

mod completion_repo;
mod mapping;
mod migrate;
mod subject_repo;
mod topic_repo;

const MAX_CONNECTIONS: u32 = 5;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Subjects, topics, material and completions in one `SQLite` database.
#[derive(Clone)]
pub struct SqliteRepository {
    pool: SqlitePool,
}

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SqliteInitError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

impl SqliteRepository {
    /// Open the study database at `database_url`, creating the file and the
    /// tables when missing. Foreign keys are enforced on every connection.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` for a malformed URL, a failed connection or a
    /// failed migration.
    pub async fn open(database_url: &str) -> Result<Self, SqliteInitError> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(BUSY_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(BUSY_TIMEOUT)
            .connect_with(options)
            .await?;
        migrate::run_migrations(&pool).await?;
        tracing::debug!(url = database_url, "study database ready");
        Ok(Self { pool })
    }
}

impl Storage {
    /// Study storage backed by `SQLite`.
    ///
    /// # Errors
    ///
    /// Returns `SqliteInitError` when the database cannot be opened.
    pub async fn sqlite(database_url: &str) -> Result<Self, SqliteInitError> {
        let repo = SqliteRepository::open(database_url).await?;
        Ok(Self {
            subjects: Arc::new(repo.clone()) as Arc<dyn SubjectRepository>,
            topics: Arc::new(repo.clone()) as Arc<dyn TopicRepository>,
            completions: Arc::new(repo) as Arc<dyn CompletionRepository>,
        })
    }
}
