/// Member model (account side)
///
/// The account's roster. Authoritative for "is this user a member"; the
/// user-side `memberships` table mirrors it on a best-effort basis.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE members (
///     user_id TEXT PRIMARY KEY,
///     role INTEGER NOT NULL,
///     joined_at INTEGER NOT NULL
/// );
/// ```

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// One user on the roster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Member {
    /// User actor id
    pub user_id: String,

    /// Role within the account
    pub role: i64,

    /// When the user was (last) added, epoch ms
    pub joined_at: i64,
}

impl Member {
    /// Lists the roster in join order
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>(
            "SELECT user_id, role, joined_at FROM members ORDER BY joined_at ASC, user_id ASC",
        )
        .fetch_all(pool)
        .await
    }

    /// Finds one member
    pub async fn find(pool: &SqlitePool, user_id: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Member>("SELECT user_id, role, joined_at FROM members WHERE user_id = ?1")
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// Adds a user, replacing role and `joined_at` if already present
    pub async fn upsert(
        pool: &SqlitePool,
        user_id: &str,
        role: i64,
        now: i64,
    ) -> Result<Self, sqlx::Error> {
        sqlx::query("INSERT OR REPLACE INTO members (user_id, role, joined_at) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(role)
            .bind(now)
            .execute(pool)
            .await?;

        Ok(Member {
            user_id: user_id.to_string(),
            role,
            joined_at: now,
        })
    }

    /// Removes a user
    ///
    /// # Returns
    ///
    /// True if a row was removed
    pub async fn delete(pool: &SqlitePool, user_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM members WHERE user_id = ?1")
            .bind(user_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
