/// System index rows
///
/// Denormalized, non-authoritative copies of users and accounts kept by the
/// global system actor for listing and search. Rows are written by explicit
/// registration calls and patched opportunistically; live data always comes
/// from the owning actor.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id TEXT PRIMARY KEY,
///     name TEXT,
///     email TEXT,
///     provider TEXT,
///     created_at INTEGER NOT NULL
/// );
///
/// CREATE TABLE accounts (
///     id TEXT PRIMARY KEY,
///     name TEXT,
///     status TEXT NOT NULL,
///     plan TEXT NOT NULL,
///     created_at INTEGER NOT NULL
/// );
/// ```
///
/// # Search
///
/// Listing is a bounded scan: an optional case-insensitive substring filter,
/// newest first, at most [`LIST_LIMIT`] rows.

use serde::{Deserialize, Serialize};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

/// Maximum rows returned by a listing
pub const LIST_LIMIT: i64 = 50;

/// Default status of a registered account
pub const DEFAULT_ACCOUNT_STATUS: &str = "active";

/// Default plan of a registered account
pub const DEFAULT_ACCOUNT_PLAN: &str = "free";

/// Indexed user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexedUser {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub provider: Option<String>,
    pub created_at: i64,
}

/// Indexed account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexedAccount {
    pub id: String,
    pub name: Option<String>,
    pub status: String,
    pub plan: String,
    pub created_at: i64,
}

/// Input for registering a user
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterUser {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub provider: Option<String>,
}

/// Input for registering an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegisterAccount {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    #[serde(default)]
    pub plan: Option<String>,
}

/// Fields of a user row that an update may change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

/// Fields of an account row that an update may change
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountPatch {
    pub name: Option<String>,
    pub status: Option<String>,
    pub plan: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.status.is_none() && self.plan.is_none()
    }
}

impl IndexedUser {
    /// Inserts or replaces a user row
    pub async fn register(
        pool: &SqlitePool,
        data: &RegisterUser,
        now: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query(
            "INSERT OR REPLACE INTO users (id, name, email, provider, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&data.id)
        .bind(&data.name)
        .bind(&data.email)
        .bind(&data.provider)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(IndexedUser {
            id: data.id.clone(),
            name: data.name.clone(),
            email: data.email.clone(),
            provider: data.provider.clone(),
            created_at: now,
        })
    }

    /// Lists users, filtered by a substring of name or email
    pub async fn list(pool: &SqlitePool, query: Option<&str>) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, email, provider, created_at FROM users");

        if let Some(q) = query.filter(|q| !q.is_empty()) {
            let needle = q.to_lowercase();
            builder
                .push(" WHERE instr(lower(coalesce(name, '')), ")
                .push_bind(needle.clone())
                .push(") > 0 OR instr(lower(coalesce(email, '')), ")
                .push_bind(needle)
                .push(") > 0");
        }

        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(LIST_LIMIT);

        builder.build_query_as::<IndexedUser>().fetch_all(pool).await
    }

    /// Finds one user row
    pub async fn find(pool: &SqlitePool, id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IndexedUser>(
            "SELECT id, name, email, provider, created_at FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Applies the fields present in `patch`
    ///
    /// # Returns
    ///
    /// True if a row was updated
    pub async fn patch(pool: &SqlitePool, id: &str, patch: &UserPatch) -> Result<bool, sqlx::Error> {
        if patch.is_empty() {
            return Ok(false);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(name) = &patch.name {
                fields.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(email) = &patch.email {
                fields.push("email = ").push_bind_unseparated(email.clone());
            }
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }
}

impl IndexedAccount {
    /// Inserts or replaces an account row
    pub async fn register(
        pool: &SqlitePool,
        data: &RegisterAccount,
        now: i64,
    ) -> Result<Self, sqlx::Error> {
        let status = data
            .status
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCOUNT_STATUS.to_string());
        let plan = data
            .plan
            .clone()
            .unwrap_or_else(|| DEFAULT_ACCOUNT_PLAN.to_string());

        sqlx::query(
            "INSERT OR REPLACE INTO accounts (id, name, status, plan, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&data.id)
        .bind(&data.name)
        .bind(&status)
        .bind(&plan)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(IndexedAccount {
            id: data.id.clone(),
            name: data.name.clone(),
            status,
            plan,
            created_at: now,
        })
    }

    /// Lists accounts, filtered by a substring of name
    pub async fn list(pool: &SqlitePool, query: Option<&str>) -> Result<Vec<Self>, sqlx::Error> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, status, plan, created_at FROM accounts");

        if let Some(q) = query.filter(|q| !q.is_empty()) {
            builder
                .push(" WHERE instr(lower(coalesce(name, '')), ")
                .push_bind(q.to_lowercase())
                .push(") > 0");
        }

        builder
            .push(" ORDER BY created_at DESC, rowid DESC LIMIT ")
            .push_bind(LIST_LIMIT);

        builder.build_query_as::<IndexedAccount>().fetch_all(pool).await
    }

    /// Applies the fields present in `patch`
    ///
    /// # Returns
    ///
    /// True if a row was updated
    pub async fn patch(
        pool: &SqlitePool,
        id: &str,
        patch: &AccountPatch,
    ) -> Result<bool, sqlx::Error> {
        if patch.is_empty() {
            return Ok(false);
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE accounts SET ");
        {
            let mut fields = builder.separated(", ");
            if let Some(name) = &patch.name {
                fields.push("name = ").push_bind_unseparated(name.clone());
            }
            if let Some(status) = &patch.status {
                fields.push("status = ").push_bind_unseparated(status.clone());
            }
            if let Some(plan) = &patch.plan {
                fields.push("plan = ").push_bind_unseparated(plan.clone());
            }
        }
        builder.push(" WHERE id = ").push_bind(id.to_string());

        let result = builder.build().execute(pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
