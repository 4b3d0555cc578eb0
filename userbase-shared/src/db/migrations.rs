/// Actor schemas
///
/// Each actor kind has a fixed set of tables. Schemas are applied when an
/// instance's store is first opened and are idempotent, so reopening an
/// existing database is a no-op.
///
/// # Tables
///
/// | Kind      | Tables                                                      |
/// |-----------|-------------------------------------------------------------|
/// | `user`    | `profile`, `credentials`, `sessions`, `images`, `memberships` |
/// | `account` | `account_info`, `members`                                   |
/// | `system`  | `users`, `accounts`                                         |
///
/// # Example
///
/// ```no_run
/// use userbase_shared::db::migrations::apply_schema;
/// use userbase_shared::db::pool::{open_actor_store, StorageConfig};
/// use userbase_shared::ids::{ActorId, ActorKind};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let id = ActorId::new_unique();
/// let pool = open_actor_store(&StorageConfig::in_memory(), ActorKind::Account, &id).await?;
/// apply_schema(&pool, ActorKind::Account).await?;
/// # Ok(())
/// # }
/// ```

use crate::ids::ActorKind;
use sqlx::SqlitePool;
use tracing::debug;

const USER_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS profile (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS credentials (
        provider TEXT PRIMARY KEY,
        subject_id TEXT NOT NULL,
        access_token TEXT,
        refresh_token TEXT,
        expires_at INTEGER,
        scope TEXT,
        profile_data TEXT,
        created_at INTEGER NOT NULL,
        updated_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS sessions (
        id TEXT PRIMARY KEY,
        created_at INTEGER NOT NULL,
        expires_at INTEGER NOT NULL,
        meta TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS images (
        key TEXT PRIMARY KEY,
        value BLOB NOT NULL,
        mime_type TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS memberships (
        account_id TEXT PRIMARY KEY,
        role INTEGER NOT NULL,
        is_current INTEGER NOT NULL DEFAULT 0
    )
    "#,
];

const ACCOUNT_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS account_info (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS members (
        user_id TEXT PRIMARY KEY,
        role INTEGER NOT NULL,
        joined_at INTEGER NOT NULL
    )
    "#,
];

const SYSTEM_SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        name TEXT,
        email TEXT,
        provider TEXT,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        name TEXT,
        status TEXT NOT NULL,
        plan TEXT NOT NULL,
        created_at INTEGER NOT NULL
    )
    "#,
];

/// DDL statements for one actor kind
pub fn schema_statements(kind: ActorKind) -> &'static [&'static str] {
    match kind {
        ActorKind::User => USER_SCHEMA,
        ActorKind::Account => ACCOUNT_SCHEMA,
        ActorKind::System => SYSTEM_SCHEMA,
    }
}

/// Applies the schema for `kind` inside one transaction
///
/// # Errors
///
/// Returns an error if any statement fails; nothing is applied in that case.
pub async fn apply_schema(pool: &SqlitePool, kind: ActorKind) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for statement in schema_statements(kind) {
        sqlx::query(statement).execute(&mut *tx).await?;
    }

    tx.commit().await?;

    debug!(kind = %kind, "Actor schema applied");
    Ok(())
}

/// Lists the tables present in a store, sorted by name
pub async fn list_tables(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
    )
    .fetch_all(pool)
    .await
}
