//! Weekly evaluation result persistence.
//!
//! One immutable row per `(state, week_start)`. The insert-once
//! semantics (ON CONFLICT DO NOTHING) make the weekly evaluation
//! idempotent: of two overlapping ticks evaluating the same week,
//! exactly one insert succeeds, and only that caller applies the tier
//! rewards.

use chrono::{DateTime, Utc};
use homeroom_types::{BucketScores, WeeklyResult, WeeklyResultId, WeeklyTier, WorldStateId};
use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Column list shared by queries returning a full result row.
const RESULT_COLUMNS: &str = "id, state_id, week_start, week_end, bucket_scores, earned_points, \
     available_points, weekly_pct, tier, event_key, bonus_xp, track_points_awarded, created_at";

/// Operations on the `weekly_results` table.
pub struct WeeklyResultStore<'a> {
    pool: &'a PgPool,
}

impl<'a> WeeklyResultStore<'a> {
    /// Create a new store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Attempt to persist a weekly result. Returns `true` if this call
    /// inserted the row, `false` when the week was already evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Serialization`] if the bucket scores cannot
    /// be encoded, or [`DbError::Postgres`] on query failure.
    pub async fn try_insert(&self, result: &NewWeeklyResult) -> Result<bool, DbError> {
        let scores = serde_json::to_value(result.bucket_scores)?;

        let outcome = sqlx::query(
            "INSERT INTO weekly_results
                 (id, state_id, week_start, week_end, bucket_scores, earned_points,
                  available_points, weekly_pct, tier, event_key, bonus_xp, track_points_awarded)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (state_id, week_start) DO NOTHING",
        )
        .bind(result.id.into_inner())
        .bind(result.state_id.into_inner())
        .bind(&result.week_start)
        .bind(&result.week_end)
        .bind(scores)
        .bind(i32::try_from(result.earned_points).unwrap_or(i32::MAX))
        .bind(i32::try_from(result.available_points).unwrap_or(i32::MAX))
        .bind(result.weekly_pct)
        .bind(tier_to_db(result.tier))
        .bind(result.event_key.as_deref())
        .bind(i32::try_from(result.bonus_xp).unwrap_or(i32::MAX))
        .bind(i32::try_from(result.track_points_awarded).unwrap_or(i32::MAX))
        .execute(self.pool)
        .await?;

        Ok(outcome.rows_affected() == 1)
    }

    /// Fetch the result for a given state and week start.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get(
        &self,
        state_id: WorldStateId,
        week_start: &str,
    ) -> Result<Option<WeeklyResult>, DbError> {
        let row = sqlx::query_as::<_, WeeklyResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM weekly_results WHERE state_id = $1 AND week_start = $2"
        ))
        .bind(state_id.into_inner())
        .bind(week_start)
        .fetch_optional(self.pool)
        .await?;

        row.map(WeeklyResult::try_from).transpose()
    }

    /// Fetch the most recent result for a state.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn latest(&self, state_id: WorldStateId) -> Result<Option<WeeklyResult>, DbError> {
        let row = sqlx::query_as::<_, WeeklyResultRow>(&format!(
            "SELECT {RESULT_COLUMNS} FROM weekly_results
             WHERE state_id = $1
             ORDER BY week_start DESC
             LIMIT 1"
        ))
        .bind(state_id.into_inner())
        .fetch_optional(self.pool)
        .await?;

        row.map(WeeklyResult::try_from).transpose()
    }

    /// The most recent narrative keys for a state, newest first, for
    /// cooldown filtering: `(week_start, event_key)` pairs.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn recent_keys(
        &self,
        state_id: WorldStateId,
        limit: i64,
    ) -> Result<Vec<(String, String)>, DbError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT week_start, event_key FROM weekly_results
             WHERE state_id = $1 AND event_key IS NOT NULL
             ORDER BY week_start DESC
             LIMIT $2",
        )
        .bind(state_id.into_inner())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

/// A weekly result to persist.
#[derive(Debug, Clone)]
pub struct NewWeeklyResult {
    /// Pre-generated row id.
    pub id: WeeklyResultId,
    /// The state this result belongs to.
    pub state_id: WorldStateId,
    /// First date key of the window.
    pub week_start: String,
    /// Last date key of the window.
    pub week_end: String,
    /// Per-bucket scores.
    pub bucket_scores: BucketScores,
    /// Points earned across present buckets.
    pub earned_points: u32,
    /// Points available across present buckets.
    pub available_points: u32,
    /// Weekly percentage, if any bucket was present.
    pub weekly_pct: Option<Decimal>,
    /// Resolved tier.
    pub tier: WeeklyTier,
    /// Selected narrative key, if any.
    pub event_key: Option<String>,
    /// Bonus XP awarded.
    pub bonus_xp: u32,
    /// Track points awarded.
    pub track_points_awarded: u32,
}

/// A row from the `weekly_results` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WeeklyResultRow {
    /// Row UUID.
    pub id: Uuid,
    /// Owning state UUID.
    pub state_id: Uuid,
    /// Window start key.
    pub week_start: String,
    /// Window end key.
    pub week_end: String,
    /// Bucket scores as stored JSON.
    pub bucket_scores: serde_json::Value,
    /// Earned points.
    pub earned_points: i32,
    /// Available points.
    pub available_points: i32,
    /// Weekly percentage.
    pub weekly_pct: Option<Decimal>,
    /// Tier as stored.
    pub tier: String,
    /// Narrative key.
    pub event_key: Option<String>,
    /// Bonus XP.
    pub bonus_xp: i32,
    /// Track points awarded.
    pub track_points_awarded: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<WeeklyResultRow> for WeeklyResult {
    type Error = DbError;

    fn try_from(row: WeeklyResultRow) -> Result<Self, DbError> {
        Ok(Self {
            id: WeeklyResultId::from(row.id),
            state_id: WorldStateId::from(row.state_id),
            week_start: row.week_start,
            week_end: row.week_end,
            bucket_scores: serde_json::from_value(row.bucket_scores)?,
            earned_points: u32::try_from(row.earned_points).unwrap_or(0),
            available_points: u32::try_from(row.available_points).unwrap_or(0),
            weekly_pct: row.weekly_pct,
            tier: tier_from_db(&row.tier)?,
            event_key: row.event_key,
            bonus_xp: u32::try_from(row.bonus_xp).unwrap_or(0),
            track_points_awarded: u32::try_from(row.track_points_awarded).unwrap_or(0),
            created_at: row.created_at,
        })
    }
}

/// Convert a [`WeeklyTier`] to its stored string.
pub const fn tier_to_db(tier: WeeklyTier) -> &'static str {
    match tier {
        WeeklyTier::Bronze => "bronze",
        WeeklyTier::Silver => "silver",
        WeeklyTier::Gold => "gold",
        WeeklyTier::Platinum => "platinum",
    }
}

/// Parse a stored tier string back to a [`WeeklyTier`].
pub fn tier_from_db(value: &str) -> Result<WeeklyTier, DbError> {
    match value {
        "bronze" => Ok(WeeklyTier::Bronze),
        "silver" => Ok(WeeklyTier::Silver),
        "gold" => Ok(WeeklyTier::Gold),
        "platinum" => Ok(WeeklyTier::Platinum),
        other => Err(DbError::Decode {
            column: "weekly_results.tier",
            value: other.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_strings_roundtrip() {
        for tier in [
            WeeklyTier::Bronze,
            WeeklyTier::Silver,
            WeeklyTier::Gold,
            WeeklyTier::Platinum,
        ] {
            assert_eq!(tier_from_db(tier_to_db(tier)).ok(), Some(tier));
        }
    }

    #[test]
    fn unknown_tier_fails_to_decode() {
        assert!(tier_from_db("diamond").is_err());
    }
}
