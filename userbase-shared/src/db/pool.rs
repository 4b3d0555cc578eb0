/// Per-actor storage
///
/// Every actor instance owns a private SQLite database. This module opens
/// those databases with settings that make each one a strictly serialized,
/// transactional store:
///
/// - **Single connection**: one pool connection per actor, so statements
///   from one instance never interleave
/// - **Transactions**: multi-row writes use `pool.begin()` and roll back on
///   error
/// - **Location**: a directory tree (`<dir>/<kind>/<id>.sqlite`) or process
///   memory (tests and demos)
///
/// # Example
///
/// ```no_run
/// use userbase_shared::db::pool::{open_actor_store, StorageConfig};
/// use userbase_shared::ids::{ActorId, ActorKind};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let config = StorageConfig::in_memory();
/// let pool = open_actor_store(&config, ActorKind::User, &ActorId::new_unique()).await?;
///
/// let row: (i64,) = sqlx::query_as("SELECT ?1")
///     .bind(42i64)
///     .fetch_one(&pool)
///     .await?;
/// # Ok(())
/// # }
/// ```

use crate::ids::{ActorId, ActorKind};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Where actor databases live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageLocation {
    /// One private in-memory database per instance, lost on exit
    Memory,

    /// One database file per instance under this directory
    Directory(PathBuf),
}

/// Configuration shared by every actor store
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Where databases are created
    pub location: StorageLocation,

    /// Timeout for acquiring the instance's connection (seconds)
    ///
    /// Default: 30 seconds
    pub acquire_timeout_seconds: u64,

    /// How long SQLite waits on a locked database file (seconds)
    ///
    /// Default: 5 seconds. Only relevant for file-backed stores.
    pub busy_timeout_seconds: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            location: StorageLocation::Memory,
            acquire_timeout_seconds: 30,
            busy_timeout_seconds: 5,
        }
    }
}

impl StorageConfig {
    /// In-memory storage with default timeouts
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// File-backed storage rooted at `dir`
    pub fn directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            location: StorageLocation::Directory(dir.into()),
            ..Self::default()
        }
    }

    /// Database file path for one instance, `None` for memory storage
    pub fn database_path(&self, kind: ActorKind, id: &ActorId) -> Option<PathBuf> {
        match &self.location {
            StorageLocation::Memory => None,
            StorageLocation::Directory(root) => Some(
                root.join(kind.as_str())
                    .join(format!("{}.sqlite", id.as_str())),
            ),
        }
    }
}

/// Opens (creating if needed) the database of one actor instance
///
/// The returned pool holds exactly one connection. The schema is not applied
/// here; see [`crate::db::migrations::apply_schema`].
///
/// # Errors
///
/// Returns an error if:
/// - The storage directory cannot be created
/// - The database cannot be opened
/// - The health check fails
pub async fn open_actor_store(
    config: &StorageConfig,
    kind: ActorKind,
    id: &ActorId,
) -> Result<SqlitePool, sqlx::Error> {
    let options = match config.database_path(kind, id) {
        None => SqliteConnectOptions::from_str("sqlite::memory:")?,
        Some(path) => {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            SqliteConnectOptions::new()
                .filename(&path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .busy_timeout(Duration::from_secs(config.busy_timeout_seconds))
        }
    };

    debug!(kind = %kind, actor_id = %id, "Opening actor store");

    // The connection must never be recycled: for memory storage it *is* the
    // database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    health_check(&pool).await?;

    info!(kind = %kind, actor_id = %id, "Actor store opened");
    Ok(pool)
}

/// Performs a health check on an actor store
///
/// # Errors
///
/// Returns an error if the health check query fails
pub async fn health_check(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let result: (i64,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if result.0 == 1 {
        Ok(())
    } else {
        warn!("Store health check returned unexpected value: {}", result.0);
        Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ))
    }
}

/// Gracefully closes an actor store
pub async fn close_store(pool: SqlitePool) {
    pool.close().await;
    debug!("Actor store closed");
}
