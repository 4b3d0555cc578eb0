/// Key/value tables
///
/// The user `profile` and the account `account_info` tables share one shape:
/// a unique string key mapped to a JSON-encoded value. There is no schema
/// beyond key uniqueness.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE profile (
///     key TEXT PRIMARY KEY,
///     value TEXT NOT NULL   -- JSON
/// );
/// ```
///
/// Writes of several keys go through [`upsert_all`], which commits every key
/// or none of them.

use super::{decode_json, encode_json, JsonMap};
use serde_json::Value as JsonValue;
use sqlx::SqlitePool;

/// Which key/value table to address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KvTable {
    /// User profile
    Profile,

    /// Account info
    AccountInfo,
}

impl KvTable {
    fn name(&self) -> &'static str {
        match self {
            KvTable::Profile => "profile",
            KvTable::AccountInfo => "account_info",
        }
    }
}

/// Reads the whole table as a JSON object
pub async fn get_all(pool: &SqlitePool, table: KvTable) -> Result<JsonMap, sqlx::Error> {
    let rows: Vec<(String, String)> =
        sqlx::query_as(&format!("SELECT key, value FROM {} ORDER BY key", table.name()))
            .fetch_all(pool)
            .await?;

    let mut map = JsonMap::new();
    for (key, raw) in rows {
        map.insert(key, decode_json(&raw)?);
    }

    Ok(map)
}

/// Reads a single key
pub async fn get(
    pool: &SqlitePool,
    table: KvTable,
    key: &str,
) -> Result<Option<JsonValue>, sqlx::Error> {
    let raw: Option<String> =
        sqlx::query_scalar(&format!("SELECT value FROM {} WHERE key = ?1", table.name()))
            .bind(key)
            .fetch_optional(pool)
            .await?;

    raw.as_deref().map(decode_json).transpose()
}

/// Upserts a single key
pub async fn put(
    pool: &SqlitePool,
    table: KvTable,
    key: &str,
    value: &JsonValue,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
        table.name()
    ))
    .bind(key)
    .bind(encode_json(value)?)
    .execute(pool)
    .await?;

    Ok(())
}

/// Upserts every key of `changes` in one transaction
///
/// # Errors
///
/// Returns the first failure; the transaction is rolled back and no key of
/// `changes` is written.
pub async fn upsert_all(
    pool: &SqlitePool,
    table: KvTable,
    changes: &JsonMap,
) -> Result<(), sqlx::Error> {
    let statement = format!(
        "INSERT OR REPLACE INTO {} (key, value) VALUES (?1, ?2)",
        table.name()
    );

    let mut tx = pool.begin().await?;

    for (key, value) in changes {
        sqlx::query(&statement)
            .bind(key)
            .bind(encode_json(value)?)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}
