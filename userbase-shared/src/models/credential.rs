/// OAuth credential model
///
/// A user holds at most one credential per provider. Re-linking a provider
/// overwrites every field except `created_at` and stamps `updated_at`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE credentials (
///     provider TEXT PRIMARY KEY,
///     subject_id TEXT NOT NULL,
///     access_token TEXT,
///     refresh_token TEXT,
///     expires_at INTEGER,
///     scope TEXT,
///     profile_data TEXT,          -- JSON snapshot of the provider profile
///     created_at INTEGER NOT NULL,
///     updated_at INTEGER NOT NULL
/// );
/// ```

use super::encode_json;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::{FromRow, SqlitePool};

/// Stored credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    /// Provider name (dedup key)
    pub provider: String,

    /// Subject id at the provider
    pub subject_id: String,

    pub access_token: Option<String>,
    pub refresh_token: Option<String>,

    /// Token expiry (epoch ms)
    pub expires_at: Option<i64>,

    pub scope: Option<String>,

    /// Provider profile snapshot
    pub profile_data: JsonValue,

    pub created_at: i64,
    pub updated_at: i64,
}

/// Input for linking a provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpsertCredential {
    pub provider: String,
    pub subject_id: String,

    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub expires_at: Option<i64>,

    #[serde(default)]
    pub scope: Option<String>,

    #[serde(default)]
    pub profile_data: JsonValue,
}

/// Row as stored; `profile_data` is a JSON text column
#[derive(Debug, FromRow)]
struct CredentialRecord {
    provider: String,
    subject_id: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    scope: Option<String>,
    profile_data: Option<Json<JsonValue>>,
    created_at: i64,
    updated_at: i64,
}

impl From<CredentialRecord> for Credential {
    fn from(record: CredentialRecord) -> Self {
        Credential {
            provider: record.provider,
            subject_id: record.subject_id,
            access_token: record.access_token,
            refresh_token: record.refresh_token,
            expires_at: record.expires_at,
            scope: record.scope,
            profile_data: record
                .profile_data
                .map(|Json(data)| data)
                .unwrap_or(JsonValue::Null),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

const COLUMNS: &str = "provider, subject_id, access_token, refresh_token, expires_at, scope, profile_data, created_at, updated_at";

impl Credential {
    /// Inserts or replaces the credential for `data.provider`
    ///
    /// # Returns
    ///
    /// The stored credential
    pub async fn upsert(
        pool: &SqlitePool,
        data: &UpsertCredential,
        now: i64,
    ) -> Result<Self, sqlx::Error> {
        let record = sqlx::query_as::<_, CredentialRecord>(&format!(
            r#"
            INSERT INTO credentials ({COLUMNS})
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            ON CONFLICT(provider) DO UPDATE SET
                subject_id = excluded.subject_id,
                access_token = excluded.access_token,
                refresh_token = excluded.refresh_token,
                expires_at = excluded.expires_at,
                scope = excluded.scope,
                profile_data = excluded.profile_data,
                updated_at = excluded.updated_at
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&data.provider)
        .bind(&data.subject_id)
        .bind(&data.access_token)
        .bind(&data.refresh_token)
        .bind(data.expires_at)
        .bind(&data.scope)
        .bind(encode_json(&data.profile_data)?)
        .bind(now)
        .fetch_one(pool)
        .await?;

        Ok(record.into())
    }

    /// Finds the credential for a provider
    pub async fn find(pool: &SqlitePool, provider: &str) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, CredentialRecord>(&format!(
            "SELECT {COLUMNS} FROM credentials WHERE provider = ?1"
        ))
        .bind(provider)
        .fetch_optional(pool)
        .await?;

        Ok(record.map(Credential::from))
    }

    /// The most recently updated credential, if any
    pub async fn latest(pool: &SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        let record = sqlx::query_as::<_, CredentialRecord>(&format!(
            "SELECT {COLUMNS} FROM credentials ORDER BY updated_at DESC, rowid DESC LIMIT 1"
        ))
        .fetch_optional(pool)
        .await?;

        Ok(record.map(Credential::from))
    }
}
