//! XP ledger persistence: append-only `xp_events` rows.
//!
//! The ledger is the audit trail for every XP movement and the data
//! behind two idempotency checks: per-source daily caps (windowed
//! sums) and once-per-metadata-key sources (existence probes).
//! Rows are never updated or deleted.

use chrono::{DateTime, Utc};
use homeroom_types::{WorldStateId, XpEventId, XpSource};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::DbError;

/// Default batch size for ledger inserts.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Operations on the `xp_events` table.
pub struct XpEventStore<'a> {
    pool: &'a PgPool,
    batch_size: usize,
}

impl<'a> XpEventStore<'a> {
    /// Create a new ledger store bound to a connection pool.
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size for inserts.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Insert a single ledger row.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the insert fails.
    pub async fn insert(&self, event: &NewXpEvent) -> Result<(), DbError> {
        sqlx::query(
            "INSERT INTO xp_events (id, state_id, source, amount, metadata)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(event.id.into_inner())
        .bind(event.state_id.into_inner())
        .bind(source_to_db(event.source))
        .bind(i32::try_from(event.amount).unwrap_or(i32::MAX))
        .bind(&event.metadata)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Batch-insert ledger rows using multi-row UNNEST.
    ///
    /// A batch grant produces one ledger row per applied achievement;
    /// inserting them in a single statement bounds the round-trips
    /// under high-fan-in bursts. Each chunk is wrapped in a transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if an insert fails.
    pub async fn insert_batch(&self, events: &[NewXpEvent]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        for chunk in events.chunks(self.batch_size) {
            let mut tx = self.pool.begin().await?;

            let len = chunk.len();
            let mut ids = Vec::with_capacity(len);
            let mut state_ids = Vec::with_capacity(len);
            let mut sources = Vec::with_capacity(len);
            let mut amounts = Vec::with_capacity(len);
            let mut metadata_arr = Vec::with_capacity(len);

            for event in chunk {
                ids.push(event.id.into_inner());
                state_ids.push(event.state_id.into_inner());
                sources.push(source_to_db(event.source).to_owned());
                amounts.push(i32::try_from(event.amount).unwrap_or(i32::MAX));
                metadata_arr.push(event.metadata.clone());
            }

            sqlx::query(
                "INSERT INTO xp_events (id, state_id, source, amount, metadata)
                 SELECT * FROM UNNEST($1::UUID[], $2::UUID[], $3::TEXT[], $4::INT[], $5::JSONB[])",
            )
            .bind(&ids)
            .bind(&state_ids)
            .bind(&sources)
            .bind(&amounts)
            .bind(&metadata_arr)
            .execute(&mut *tx)
            .await?;

            tx.commit().await?;
        }

        tracing::debug!(count = events.len(), "Inserted XP events (batch UNNEST)");
        Ok(())
    }

    /// Sum the XP a source granted to a state within `[from, to)`.
    ///
    /// Used for per-source daily cap checks, with the bounds of the
    /// local day computed by the cadence clock.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn sum_for_source_between(
        &self,
        state_id: WorldStateId,
        source: XpSource,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<u32, DbError> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount), 0)
             FROM xp_events
             WHERE state_id = $1 AND source = $2 AND created_at >= $3 AND created_at < $4",
        )
        .bind(state_id.into_inner())
        .bind(source_to_db(source))
        .bind(from)
        .bind(to)
        .fetch_one(self.pool)
        .await?;

        Ok(u32::try_from(total).unwrap_or(u32::MAX))
    }

    /// Whether a ledger row already exists for this source with the
    /// given metadata key/value pair.
    ///
    /// Backs once-per-metadata-key sources (e.g. one submission grant
    /// per assignment id).
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn exists_with_metadata(
        &self,
        state_id: WorldStateId,
        source: XpSource,
        key: &str,
        value: &str,
    ) -> Result<bool, DbError> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (
                 SELECT 1 FROM xp_events
                 WHERE state_id = $1 AND source = $2 AND metadata ->> $3 = $4
             )",
        )
        .bind(state_id.into_inner())
        .bind(source_to_db(source))
        .bind(key)
        .bind(value)
        .fetch_one(self.pool)
        .await?;

        Ok(exists)
    }

    /// Query recent ledger rows for a state, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Postgres`] if the query fails.
    pub async fn recent_for_state(
        &self,
        state_id: WorldStateId,
        limit: i64,
    ) -> Result<Vec<XpEventRow>, DbError> {
        let rows = sqlx::query_as::<_, XpEventRow>(
            "SELECT id, state_id, source, amount, metadata, created_at
             FROM xp_events
             WHERE state_id = $1
             ORDER BY created_at DESC
             LIMIT $2",
        )
        .bind(state_id.into_inner())
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows)
    }
}

/// A ledger row to insert.
#[derive(Debug, Clone)]
pub struct NewXpEvent {
    /// Pre-generated row id.
    pub id: XpEventId,
    /// The state being credited.
    pub state_id: WorldStateId,
    /// Where the XP came from.
    pub source: XpSource,
    /// XP amount. Non-negative.
    pub amount: u32,
    /// Source context (assignment id, event key, week start...).
    pub metadata: serde_json::Value,
}

impl NewXpEvent {
    /// Build a ledger row with a fresh id.
    pub fn new(
        state_id: WorldStateId,
        source: XpSource,
        amount: u32,
        metadata: serde_json::Value,
    ) -> Self {
        Self {
            id: XpEventId::new(),
            state_id,
            source,
            amount,
            metadata,
        }
    }
}

/// A row from the `xp_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct XpEventRow {
    /// Row UUID.
    pub id: Uuid,
    /// Owning state UUID.
    pub state_id: Uuid,
    /// Source as stored.
    pub source: String,
    /// XP amount.
    pub amount: i32,
    /// Source context.
    pub metadata: serde_json::Value,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

/// Convert an [`XpSource`] to its stored string.
pub const fn source_to_db(source: XpSource) -> &'static str {
    match source {
        XpSource::CheckIn => "check_in",
        XpSource::AssignmentSubmitted => "assignment_submitted",
        XpSource::QuizCompleted => "quiz_completed",
        XpSource::DailyCare => "daily_care",
        XpSource::Achievement => "achievement",
        XpSource::WeeklyBonus => "weekly_bonus",
    }
}

/// Parse a stored source string back to an [`XpSource`].
pub fn source_from_db(value: &str) -> Result<XpSource, DbError> {
    match value {
        "check_in" => Ok(XpSource::CheckIn),
        "assignment_submitted" => Ok(XpSource::AssignmentSubmitted),
        "quiz_completed" => Ok(XpSource::QuizCompleted),
        "daily_care" => Ok(XpSource::DailyCare),
        "achievement" => Ok(XpSource::Achievement),
        "weekly_bonus" => Ok(XpSource::WeeklyBonus),
        other => Err(DbError::Decode {
            column: "xp_events.source",
            value: other.to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_strings_roundtrip() {
        for source in [
            XpSource::CheckIn,
            XpSource::AssignmentSubmitted,
            XpSource::QuizCompleted,
            XpSource::DailyCare,
            XpSource::Achievement,
            XpSource::WeeklyBonus,
        ] {
            let stored = source_to_db(source);
            assert_eq!(source_from_db(stored).ok(), Some(source));
        }
    }

    #[test]
    fn unknown_source_fails_to_decode() {
        assert!(source_from_db("mystery").is_err());
    }
}
