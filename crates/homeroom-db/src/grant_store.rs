//! Reward grant idempotency records.
//!
//! The `(state_id, reward_type, reward_key)` primary key is the
//! at-most-once mechanism for achievement grants: the first insert
//! wins, every later attempt is a silent no-op. Application code never
//! deduplicates in memory -- this table is the only guard.

use homeroom_types::WorldStateId;
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `reward_grants` table.
pub struct RewardGrantStore<'a> {
    pool: &'a PgPool,
}

impl<'a> RewardGrantStore<'a> {
    /// Create a new store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Attempt to record a grant. Returns `true` if this call inserted
    /// the record (the reward had not been granted before), `false`
    /// if the triple already existed.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails for a reason
    /// other than the uniqueness conflict.
    pub async fn try_insert(
        &self,
        state_id: WorldStateId,
        reward_type: &str,
        reward_key: &str,
    ) -> Result<bool, DbError> {
        let result = sqlx::query(
            "INSERT INTO reward_grants (state_id, reward_type, reward_key)
             VALUES ($1, $2, $3)
             ON CONFLICT (state_id, reward_type, reward_key) DO NOTHING",
        )
        .bind(state_id.into_inner())
        .bind(reward_type)
        .bind(reward_key)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Whether a grant record exists for the triple.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn exists(
        &self,
        state_id: WorldStateId,
        reward_type: &str,
        reward_key: &str,
    ) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM reward_grants
                 WHERE state_id = $1 AND reward_type = $2 AND reward_key = $3
             )",
        )
        .bind(state_id.into_inner())
        .bind(reward_type)
        .bind(reward_key)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }
}
