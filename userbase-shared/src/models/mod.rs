/// Table models for actor stores
///
/// Each module owns one table (or one table shape) and its CRUD operations.
/// Functions take the owning actor's pool; none of them reach across actors.
///
/// # Models
///
/// - `kv`: free-form key/value tables (user `profile`, account `account_info`)
/// - `credential`: OAuth credentials, one per provider (user)
/// - `session`: login sessions with a fixed lifetime (user)
/// - `image`: binary blobs by logical key (user)
/// - `membership`: the user's view of its accounts, with the current flag (user)
/// - `member`: the account's roster (account)
/// - `index`: denormalized user/account rows for search (system)
///
/// # Example
///
/// ```no_run
/// use userbase_shared::models::kv::{self, KvTable};
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool) -> Result<(), sqlx::Error> {
/// let mut changes = serde_json::Map::new();
/// changes.insert("name".to_string(), serde_json::json!("Ada"));
/// kv::upsert_all(&pool, KvTable::Profile, &changes).await?;
///
/// let profile = kv::get_all(&pool, KvTable::Profile).await?;
/// assert_eq!(profile["name"], "Ada");
/// # Ok(())
/// # }
/// ```

pub mod credential;
pub mod image;
pub mod index;
pub mod kv;
pub mod member;
pub mod membership;
pub mod session;

/// Free-form JSON object used by profile and info tables
pub type JsonMap = serde_json::Map<String, serde_json::Value>;

/// Role of an ordinary member
pub const ROLE_USER: i64 = 0;

/// Role of an account administrator
pub const ROLE_ADMIN: i64 = 1;

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Decodes a JSON column, surfacing corrupt data as a decode error
pub(crate) fn decode_json(raw: &str) -> Result<serde_json::Value, sqlx::Error> {
    serde_json::from_str(raw).map_err(|e| sqlx::Error::Decode(Box::new(e)))
}

/// Encodes a JSON column
pub(crate) fn encode_json(value: &serde_json::Value) -> Result<String, sqlx::Error> {
    serde_json::to_string(value).map_err(|e| sqlx::Error::Encode(Box::new(e)))
}
