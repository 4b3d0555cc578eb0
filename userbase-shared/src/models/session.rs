/// Login session model
///
/// A user may hold several concurrent sessions. Each has a fixed lifetime of
/// [`SESSION_TTL_MS`] from creation; there is no sliding expiry.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE sessions (
///     id TEXT PRIMARY KEY,
///     created_at INTEGER NOT NULL,
///     expires_at INTEGER NOT NULL,
///     meta TEXT
/// );
/// ```

use super::encode_json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

/// Session lifetime (24 hours)
pub const SESSION_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Stored session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque session token
    pub id: String,

    pub created_at: i64,
    pub expires_at: i64,

    /// Free-form metadata (user agent, etc.)
    pub meta: Option<JsonValue>,
}

/// Row as stored; `meta` is a JSON text column
#[derive(Debug, FromRow)]
struct SessionRecord {
    id: String,
    created_at: i64,
    expires_at: i64,
    meta: Option<Json<JsonValue>>,
}

impl From<SessionRecord> for Session {
    fn from(record: SessionRecord) -> Self {
        Session {
            id: record.id,
            created_at: record.created_at,
            expires_at: record.expires_at,
            meta: record.meta.map(|Json(meta)| meta),
        }
    }
}

impl Session {
    /// Records a session valid from `now` to `now + SESSION_TTL_MS`
    pub async fn create(
        pool: &SqlitePool,
        id: &str,
        now: i64,
        meta: Option<&JsonValue>,
    ) -> Result<Self, sqlx::Error> {
        let expires_at = now + SESSION_TTL_MS;

        sqlx::query("INSERT INTO sessions (id, created_at, expires_at, meta) VALUES (?1, ?2, ?3, ?4)")
            .bind(id)
            .bind(now)
            .bind(expires_at)
            .bind(meta.map(encode_json).transpose()?)
            .execute(pool)
            .await?;

        Ok(Session {
            id: id.to_string(),
            created_at: now,
            expires_at,
            meta: meta.cloned(),
        })
    }

    /// Finds a session by id, expired or not
    pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT id, created_at, expires_at, meta FROM sessions WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(record.map(Session::from))
    }

    /// Deletes a session
    ///
    /// # Returns
    ///
    /// True if a row was removed
    pub async fn delete(pool: &SqlitePool, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Whether the session is past its expiry at `now`
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at < now
    }
}
