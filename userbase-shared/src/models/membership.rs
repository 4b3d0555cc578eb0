/// Membership model (user side)
///
/// The user's own view of the accounts it belongs to. This table is a
/// read-optimized copy of the account rosters; the account side is the
/// source of truth for "is a member".
///
/// # Schema
///
/// ```sql
/// CREATE TABLE memberships (
///     account_id TEXT PRIMARY KEY,
///     role INTEGER NOT NULL,
///     is_current INTEGER NOT NULL DEFAULT 0
/// );
/// ```
///
/// # Current Account
///
/// At most one row has `is_current = 1`. Every write that may set the flag
/// clears it on all rows first, inside the same transaction.
///
/// # Example
///
/// ```no_run
/// use userbase_shared::models::membership::Membership;
/// use sqlx::SqlitePool;
///
/// # async fn example(pool: SqlitePool) -> Result<(), sqlx::Error> {
/// Membership::upsert(&pool, "acc-1", 1, Some(true)).await?;
/// Membership::upsert(&pool, "acc-2", 0, Some(false)).await?;
///
/// assert!(Membership::switch_current(&pool, "acc-2").await?);
/// let current = Membership::current(&pool).await?.unwrap();
/// assert_eq!(current.account_id, "acc-2");
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// One account the user belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Membership {
    /// Account actor id
    pub account_id: String,

    /// Role within the account
    pub role: i64,

    /// Whether this is the user's current account
    pub is_current: bool,
}

impl Membership {
    /// Lists every membership, ordered by account id
    pub async fn list(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            "SELECT account_id, role, is_current FROM memberships ORDER BY account_id",
        )
        .fetch_all(pool)
        .await
    }

    /// The current membership, if one is selected
    pub async fn current(pool: &SqlitePool) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Membership>(
            "SELECT account_id, role, is_current FROM memberships WHERE is_current = 1 LIMIT 1",
        )
        .fetch_optional(pool)
        .await
    }

    /// Inserts or updates a membership
    ///
    /// # Arguments
    ///
    /// * `is_current` - `Some(true)` makes this the only current row,
    ///   `Some(false)` stores it as not current, `None` keeps the existing
    ///   row's flag (new rows start not current)
    ///
    /// # Returns
    ///
    /// The stored membership
    pub async fn upsert(
        pool: &SqlitePool,
        account_id: &str,
        role: i64,
        is_current: Option<bool>,
    ) -> Result<Self, sqlx::Error> {
        let mut tx = pool.begin().await?;

        if is_current == Some(true) {
            sqlx::query("UPDATE memberships SET is_current = 0 WHERE is_current = 1")
                .execute(&mut *tx)
                .await?;
        }

        let membership = sqlx::query_as::<_, Membership>(
            r#"
            INSERT INTO memberships (account_id, role, is_current)
            VALUES (?1, ?2, COALESCE(?3, 0))
            ON CONFLICT(account_id) DO UPDATE SET
                role = excluded.role,
                is_current = COALESCE(?3, memberships.is_current)
            RETURNING account_id, role, is_current
            "#,
        )
        .bind(account_id)
        .bind(role)
        .bind(is_current.map(i64::from))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(membership)
    }

    /// Deletes the membership for one account
    ///
    /// # Returns
    ///
    /// True if a row was removed
    pub async fn delete(pool: &SqlitePool, account_id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM memberships WHERE account_id = ?1")
            .bind(account_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Makes `account_id` the only current membership
    ///
    /// # Returns
    ///
    /// False (with no flag changed) if there is no membership for that
    /// account
    pub async fn switch_current(pool: &SqlitePool, account_id: &str) -> Result<bool, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let found: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memberships WHERE account_id = ?1",
        )
        .bind(account_id)
        .fetch_one(&mut *tx)
        .await?;

        if found == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("UPDATE memberships SET is_current = CASE WHEN account_id = ?1 THEN 1 ELSE 0 END")
            .bind(account_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }
}
