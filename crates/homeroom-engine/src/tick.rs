//! The cadence scheduler: one `tick(now)` advances every due world.
//!
//! The per-state `next_*_at` pointers replace a cron daemon: a tick is
//! a stateless function of `now` and the due-set queries, so
//! overlapping invocations are safe (the underlying unique constraints
//! make each per-state step at-most-once) and a late tick after
//! downtime simply processes today's cycle -- missed days and weeks
//! are not backfilled.

use chrono::{DateTime, Utc};
use homeroom_db::{DailyEventStore, WorldStateStore};
use homeroom_types::TickOutcome;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::signals::SignalSource;
use crate::CadenceEngine;

impl<S: SignalSource> CadenceEngine<S> {
    /// Run one cadence tick at `now`.
    ///
    /// Processes, in order: the daily spawn due-set, the stale-event
    /// expiry sweep, and the weekly evaluation due-set, each bounded by
    /// the configured batch size. A failure for one state is logged and
    /// does not abort the rest of the batch.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] only if a due-set query itself
    /// fails; per-state failures are contained.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickOutcome, EngineError> {
        let state_store = WorldStateStore::new(&self.pool);
        let batch = self.config.infrastructure.tick_batch_size;
        let mut outcome = TickOutcome::default();

        // 1. Daily spawns.
        let due_daily = state_store.due_daily(now, batch).await?;
        for state in &due_daily {
            match self.spawn_daily(state, now).await {
                Ok(true) => outcome.daily_spawned = outcome.daily_spawned.saturating_add(1),
                Ok(false) => {}
                Err(error) => {
                    warn!(state = %state.id, %error, "daily spawn failed; continuing batch");
                }
            }
        }

        // 2. Expiry sweep for days before today.
        match DailyEventStore::new(&self.pool)
            .expire_stale(&self.clock.today_key(now))
            .await
        {
            Ok(expired) => outcome.expired = expired,
            Err(error) => warn!(%error, "expiry sweep failed; continuing tick"),
        }

        // 3. Weekly evaluations.
        let due_weekly = state_store.due_weekly(now, batch).await?;
        for state in &due_weekly {
            match self.evaluate_week(state, now).await {
                Ok(true) => {
                    outcome.weekly_evaluated = outcome.weekly_evaluated.saturating_add(1);
                }
                Ok(false) => {}
                Err(error) => {
                    warn!(state = %state.id, %error, "weekly evaluation failed; continuing batch");
                }
            }
        }

        info!(
            daily_spawned = outcome.daily_spawned,
            expired = outcome.expired,
            weekly_evaluated = outcome.weekly_evaluated,
            due_daily = due_daily.len(),
            due_weekly = due_weekly.len(),
            "Cadence tick complete"
        );

        Ok(outcome)
    }
}
