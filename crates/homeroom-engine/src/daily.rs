//! Daily care event lifecycle: spawn and claim.
//!
//! The event key is deterministic -- pure arithmetic over the date --
//! so every world sees the same event on the same day. Spawning is
//! idempotent with respect to event creation (the unique day row) but
//! not with respect to rescheduling: the next-spawn pointer always
//! advances, which is what keeps a state out of the due set once
//! processed.

use chrono::{DateTime, Utc};
use homeroom_core::{catalog, leveling, schedule};
use homeroom_db::{DailyEventStore, NewDailyEvent, WorldStateStore};
use homeroom_types::{
    ClaimOutcome, ClassroomId, DailyEventId, DailyEventStatus, UserId, WorldState, XpSource,
};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::signals::SignalSource;
use crate::CadenceEngine;

impl<S: SignalSource> CadenceEngine<S> {
    /// Spawn today's care event for a state if it does not exist yet,
    /// and reschedule the next spawn either way.
    ///
    /// Returns `true` when this call created the event row.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] or [`EngineError::Schedule`] on
    /// failure; rescheduling is attempted only after the spawn step.
    pub(crate) async fn spawn_daily(
        &self,
        state: &WorldState,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let day = self.clock.today_key(now);
        let mut created = false;

        let index = schedule::day_index(&day)?;
        if let Some(key) = catalog::daily_event_key(&self.config.daily.catalog, index) {
            let deadline = self.clock.start_of_next_day(now)?;
            let inserted = DailyEventStore::new(&self.pool)
                .insert_if_missing(&NewDailyEvent {
                    id: DailyEventId::new(),
                    state_id: state.id,
                    event_day: day.clone(),
                    event_key: key.to_owned(),
                    claimable_until: deadline,
                })
                .await?;
            created = inserted.is_some();
            if created {
                info!(state = %state.id, day, key, "Daily care event spawned");
            }
        }

        // Rescheduling always advances, whether or not a row was
        // created -- a state never stays in the due set.
        let next = self.clock.next_daily_trigger(now)?;
        WorldStateStore::new(&self.pool)
            .reschedule_daily(state.id, next)
            .await?;

        Ok(created)
    }

    /// Claim today's care event for a student.
    ///
    /// If the event is absent, already claimed, or past its window,
    /// the call succeeds with `claimed: false` (a stale claimable row
    /// is expired on the way out). The claimable-to-claimed transition
    /// is conditional at the store, so a double-click or a concurrent
    /// duplicate request grants at most once.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on store failure.
    pub async fn claim_daily(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
    ) -> Result<ClaimOutcome, EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        let now = Utc::now();
        let day = self.clock.today_key(now);
        let level = leveling::level_for_xp(state.xp, self.config.leveling.xp_per_level);
        let store = DailyEventStore::new(&self.pool);

        let Some(event) = store.get_for_day(state.id, &day).await? else {
            return Ok(ClaimOutcome::nothing(level));
        };

        if event.status != DailyEventStatus::Claimable {
            return Ok(ClaimOutcome::nothing(level));
        }

        if now > event.claimable_until {
            store.expire(event.id).await?;
            debug!(state = %state.id, day, "claim window passed; event expired");
            return Ok(ClaimOutcome::nothing(level));
        }

        if !store.claim(event.id, now).await? {
            // A concurrent duplicate won the conditional transition.
            return Ok(ClaimOutcome::nothing(level));
        }

        let amount = self.config.sources.daily_care.amount;
        let applied = self
            .apply_xp(
                state.id,
                XpSource::DailyCare,
                amount,
                serde_json::json!({
                    "daily_event_id": event.id,
                    "event_key": event.event_key,
                    "event_day": event.event_day,
                }),
            )
            .await?;

        info!(state = %state.id, day, key = event.event_key, xp = amount, "Daily care event claimed");

        Ok(ClaimOutcome {
            claimed: true,
            event_key: Some(event.event_key),
            xp_awarded: amount,
            new_level: applied.level,
            new_unlocks: applied.new_unlocks,
        })
    }
}
