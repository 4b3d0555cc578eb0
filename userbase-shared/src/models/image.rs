/// Image blobs
///
/// Binary blobs keyed by logical name (`avatar`, `provider-icon`), at most
/// one per key.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE images (
///     key TEXT PRIMARY KEY,
///     value BLOB NOT NULL,
///     mime_type TEXT NOT NULL
/// );
/// ```

use sqlx::SqlitePool;

/// Key of the user's avatar
pub const AVATAR_KEY: &str = "avatar";

/// Key of the login provider's icon
pub const PROVIDER_ICON_KEY: &str = "provider-icon";

/// MIME type used when a caller does not send one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Stored image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub key: String,
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Image {
    /// Stores (or replaces) the blob under `key`
    pub async fn put(
        pool: &SqlitePool,
        key: &str,
        bytes: &[u8],
        mime_type: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT OR REPLACE INTO images (key, value, mime_type) VALUES (?1, ?2, ?3)")
            .bind(key)
            .bind(bytes)
            .bind(mime_type)
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Reads the blob under `key`
    pub async fn get(pool: &SqlitePool, key: &str) -> Result<Option<Self>, sqlx::Error> {
        let row: Option<(Vec<u8>, String)> =
            sqlx::query_as("SELECT value, mime_type FROM images WHERE key = ?1")
                .bind(key)
                .fetch_optional(pool)
                .await?;

        Ok(row.map(|(bytes, mime_type)| Image {
            key: key.to_string(),
            bytes,
            mime_type,
        }))
    }
}
