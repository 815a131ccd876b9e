//! Daily care event persistence.
//!
//! At most one row exists per `(state, event_day)` (unique constraint).
//! Status transitions are forward-only and conditional: the claim
//! UPDATE is guarded by `status = 'claimable'`, so of two concurrent
//! claim requests exactly one observes a row change and grants XP.

use chrono::{DateTime, Utc};
use homeroom_types::{DailyEvent, DailyEventId, DailyEventStatus, WorldStateId};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Column list shared by queries returning a full event row.
const EVENT_COLUMNS: &str =
    "id, state_id, event_day, event_key, status, claimable_until, claimed_at, created_at";

/// Operations on the `daily_events` table.
pub struct DailyEventStore<'a> {
    pool: &'a PgPool,
}

impl<'a> DailyEventStore<'a> {
    /// Create a new store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert today's event unless one already exists for the day.
    ///
    /// Returns the created row, or `None` when the `(state, day)` pair
    /// already had one (idempotent with respect to event creation).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert_if_missing(
        &self,
        params: &NewDailyEvent,
    ) -> Result<Option<DailyEvent>, DbError> {
        let row = sqlx::query_as::<_, DailyEventRow>(&format!(
            "INSERT INTO daily_events (id, state_id, event_day, event_key, status, claimable_until)
             VALUES ($1, $2, $3, $4, 'claimable', $5)
             ON CONFLICT (state_id, event_day) DO NOTHING
             RETURNING {EVENT_COLUMNS}"
        ))
        .bind(params.id.into_inner())
        .bind(params.state_id.into_inner())
        .bind(&params.event_day)
        .bind(&params.event_key)
        .bind(params.claimable_until)
        .fetch_optional(self.pool)
        .await?;

        row.map(DailyEvent::try_from).transpose()
    }

    /// Fetch the event for a given state and day.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn get_for_day(
        &self,
        state_id: WorldStateId,
        event_day: &str,
    ) -> Result<Option<DailyEvent>, DbError> {
        let row = sqlx::query_as::<_, DailyEventRow>(&format!(
            "SELECT {EVENT_COLUMNS} FROM daily_events WHERE state_id = $1 AND event_day = $2"
        ))
        .bind(state_id.into_inner())
        .bind(event_day)
        .fetch_optional(self.pool)
        .await?;

        row.map(DailyEvent::try_from).transpose()
    }

    /// Conditionally transition an event from claimable to claimed.
    ///
    /// Returns `true` only for the caller whose UPDATE changed the row;
    /// a concurrent duplicate claim observes `false` and grants
    /// nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn claim(&self, id: DailyEventId, now: DateTime<Utc>) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE daily_events
             SET status = 'claimed', claimed_at = $2
             WHERE id = $1 AND status = 'claimable'",
        )
        .bind(id.into_inner())
        .bind(now)
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Transition a single stale event to expired.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn expire(&self, id: DailyEventId) -> Result<bool, DbError> {
        let result = sqlx::query(
            "UPDATE daily_events SET status = 'expired' WHERE id = $1 AND status = 'claimable'",
        )
        .bind(id.into_inner())
        .execute(self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Batch-expire every claimable event from a day before `today`.
    ///
    /// Unclaimed events silently expiring is normal lifecycle, not an
    /// error. Returns the number of rows transitioned.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the update fails.
    pub async fn expire_stale(&self, today: &str) -> Result<u64, DbError> {
        let result = sqlx::query(
            "UPDATE daily_events SET status = 'expired'
             WHERE status = 'claimable' AND event_day < $1",
        )
        .bind(today)
        .execute(self.pool)
        .await?;

        let expired = result.rows_affected();
        if expired > 0 {
            tracing::debug!(expired, today, "Expired stale daily events");
        }
        Ok(expired)
    }

    /// Count eligible and claimed care days in an inclusive day range.
    ///
    /// "Eligible" is every day an event existed (any status); ISO date
    /// keys compare correctly as text.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn care_counts(
        &self,
        state_id: WorldStateId,
        start_day: &str,
        end_day: &str,
    ) -> Result<CareCounts, DbError> {
        let (eligible, claimed): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'claimed')
             FROM daily_events
             WHERE state_id = $1 AND event_day >= $2 AND event_day <= $3",
        )
        .bind(state_id.into_inner())
        .bind(start_day)
        .bind(end_day)
        .fetch_one(self.pool)
        .await?;

        Ok(CareCounts {
            eligible: u32::try_from(eligible).unwrap_or(u32::MAX),
            claimed: u32::try_from(claimed).unwrap_or(u32::MAX),
        })
    }
}

/// Eligible vs. claimed care days over a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CareCounts {
    /// Days an event existed for the state in the window.
    pub eligible: u32,
    /// Days the event was claimed.
    pub claimed: u32,
}

/// Parameters for spawning a daily event.
pub struct NewDailyEvent {
    /// Pre-generated row id.
    pub id: DailyEventId,
    /// The state the event belongs to.
    pub state_id: WorldStateId,
    /// The day the event is for.
    pub event_day: String,
    /// Catalog key selected for the day.
    pub event_key: String,
    /// Claim deadline (start of the next local day).
    pub claimable_until: DateTime<Utc>,
}

/// A row from the `daily_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyEventRow {
    /// Row UUID.
    pub id: Uuid,
    /// Owning state UUID.
    pub state_id: Uuid,
    /// Day key.
    pub event_day: String,
    /// Catalog key.
    pub event_key: String,
    /// Status as stored.
    pub status: String,
    /// Claim deadline.
    pub claimable_until: DateTime<Utc>,
    /// Claim timestamp, if claimed.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl TryFrom<DailyEventRow> for DailyEvent {
    type Error = DbError;

    fn try_from(row: DailyEventRow) -> Result<Self, DbError> {
        Ok(Self {
            id: DailyEventId::from(row.id),
            state_id: WorldStateId::from(row.state_id),
            event_day: row.event_day,
            event_key: row.event_key,
            status: status_from_db(&row.status)?,
            claimable_until: row.claimable_until,
            claimed_at: row.claimed_at,
            created_at: row.created_at,
        })
    }
}

/// Convert a [`DailyEventStatus`] to its stored string.
pub const fn status_to_db(status: DailyEventStatus) -> &'static str {
    match status {
        DailyEventStatus::Claimable => "claimable",
        DailyEventStatus::Claimed => "claimed",
        DailyEventStatus::Expired => "expired",
    }
}

/// Parse a stored status string back to a [`DailyEventStatus`].
pub fn status_from_db(value: &str) -> Result<DailyEventStatus, DbError> {
    match value {
        "claimable" => Ok(DailyEventStatus::Claimable),
        "claimed" => Ok(DailyEventStatus::Claimed),
        "expired" => Ok(DailyEventStatus::Expired),
        other => Err(DbError::Decode {
            column: "daily_events.status",
            value: other.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_strings_roundtrip() {
        for status in [
            DailyEventStatus::Claimable,
            DailyEventStatus::Claimed,
            DailyEventStatus::Expired,
        ] {
            assert_eq!(status_from_db(status_to_db(status)).ok(), Some(status));
        }
    }

    #[test]
    fn unknown_status_fails_to_decode() {
        assert!(status_from_db("pending").is_err());
    }
}
