//! Cosmetic unlock persistence.
//!
//! Membership in `unlocks` is monotonic: an index is inserted exactly
//! once, the first time the level reaches its threshold, and never
//! removed. Re-inserting an existing index is a no-op, so the
//! unlock-diff step is idempotent under concurrent level-ups.

use std::collections::BTreeSet;

use homeroom_types::WorldStateId;
use sqlx::PgPool;

use crate::error::DbError;

/// Operations on the `unlocks` table.
pub struct UnlockStore<'a> {
    pool: &'a PgPool,
}

impl<'a> UnlockStore<'a> {
    /// Create a new store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Fetch all unlocked indices for a state, ascending.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn indices_for(&self, state_id: WorldStateId) -> Result<BTreeSet<u32>, DbError> {
        let rows: Vec<i32> = sqlx::query_scalar(
            "SELECT image_index FROM unlocks WHERE state_id = $1 ORDER BY image_index",
        )
        .bind(state_id.into_inner())
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|index| u32::try_from(index).unwrap_or(0))
            .collect())
    }

    /// Insert newly unlocked indices, ignoring any that already exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_many(
        &self,
        state_id: WorldStateId,
        indices: &BTreeSet<u32>,
    ) -> Result<(), DbError> {
        if indices.is_empty() {
            return Ok(());
        }

        let values: Vec<i32> = indices
            .iter()
            .map(|&index| i32::try_from(index).unwrap_or(i32::MAX))
            .collect();

        sqlx::query(
            "INSERT INTO unlocks (state_id, image_index)
             SELECT $1, idx FROM UNNEST($2::INT[]) AS idx
             ON CONFLICT (state_id, image_index) DO NOTHING",
        )
        .bind(state_id.into_inner())
        .bind(&values)
        .execute(self.pool)
        .await?;

        tracing::debug!(state = %state_id, count = indices.len(), "Inserted unlocks");
        Ok(())
    }
}
