//! State access, the snapshot read-model, cosmetics, and login
//! streaks.
//!
//! `get_or_create_state` is the single entry point every operation
//! funnels through: creation is attempted at most once, and a lost
//! creation race is recovered with one re-read -- the caller never
//! sees a duplicate-key error.

use chrono::Utc;
use homeroom_core::{catalog, leveling, schedule};
use homeroom_db::{
    DailyEventStore, DbError, NewWorldState, UnlockStore, WeeklyResultStore, WorldStateStore,
};
use homeroom_types::{
    AchievementItem, ClassroomId, LoginOutcome, UserId, WorldSnapshot, WorldState, WorldStateId,
};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::signals::SignalSource;
use crate::CadenceEngine;

/// Streak lengths that trigger an idempotent milestone achievement.
const STREAK_MILESTONES: &[u32] = &[3, 7, 14, 30, 60, 100];

impl<S: SignalSource> CadenceEngine<S> {
    /// Fetch the world state for a (user, classroom) pair, creating it
    /// on first access.
    ///
    /// Creation seeds both next-trigger instants and the level-0
    /// cosmetic unlocks. If a concurrent caller creates the row first,
    /// the uniqueness conflict is absorbed and the winner's row is
    /// returned after a single re-read.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] or [`EngineError::Schedule`] on
    /// failure.
    pub async fn get_or_create_state(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
    ) -> Result<WorldState, EngineError> {
        let store = WorldStateStore::new(&self.pool);

        if let Some(state) = store.get(user_id, classroom_id).await? {
            return Ok(state);
        }

        let now = Utc::now();
        let created = store
            .create(&NewWorldState {
                id: WorldStateId::new(),
                user_id,
                classroom_id,
                next_daily_spawn_at: self.clock.next_daily_trigger(now)?,
                next_weekly_eval_at: self.clock.next_weekly_trigger(now)?,
            })
            .await?;

        if let Some(state) = created {
            let initial = leveling::unlocked_indices(0, &self.config.leveling.image_thresholds);
            UnlockStore::new(&self.pool)
                .insert_many(state.id, &initial)
                .await?;
            info!(state = %state.id, user = %user_id, classroom = %classroom_id, "World state created");
            return Ok(state);
        }

        // Lost the creation race: one re-read returns the winner's row.
        debug!(user = %user_id, classroom = %classroom_id, "lost creation race; re-reading");
        store.get(user_id, classroom_id).await?.ok_or_else(|| {
            EngineError::from(DbError::RowNotFound(format!(
                "world_states for {user_id}/{classroom_id}"
            )))
        })
    }

    /// Build the snapshot read-model: state, derived leveling data,
    /// unlocks, era, today's event, and the latest weekly result.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on store failure.
    pub async fn snapshot(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
    ) -> Result<WorldSnapshot, EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        let xp_per_level = self.config.leveling.xp_per_level;
        let now = Utc::now();

        let unlocked = UnlockStore::new(&self.pool).indices_for(state.id).await?;
        let today_event = DailyEventStore::new(&self.pool)
            .get_for_day(state.id, &self.clock.today_key(now))
            .await?;
        let latest_weekly = WeeklyResultStore::new(&self.pool).latest(state.id).await?;

        Ok(WorldSnapshot {
            level: leveling::level_for_xp(state.xp, xp_per_level),
            progress: leveling::progress_within_level(state.xp, xp_per_level),
            xp_per_level,
            unlocked_images: unlocked.into_iter().collect(),
            era: catalog::era_for_track_level(
                state.weekly_track_level,
                &self.config.weekly.era_thresholds,
            ),
            today_event,
            latest_weekly,
            state,
        })
    }

    /// Toggle the classroom overlay for a world.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on store failure.
    pub async fn set_overlay_enabled(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        enabled: bool,
    ) -> Result<(), EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        WorldStateStore::new(&self.pool)
            .set_overlay(state.id, enabled)
            .await?;
        Ok(())
    }

    /// Select a cosmetic image. The index must be unlocked.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::ImageLocked`] for an un-unlocked index
    /// (nothing mutated), or [`EngineError::Db`] on store failure.
    pub async fn select_image(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        index: u32,
    ) -> Result<(), EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        let unlocked = UnlockStore::new(&self.pool).indices_for(state.id).await?;
        if !unlocked.contains(&index) {
            return Err(EngineError::ImageLocked { index });
        }
        WorldStateStore::new(&self.pool)
            .set_selected_image(state.id, index)
            .await?;
        Ok(())
    }

    /// Record a login for today and maintain the streak.
    ///
    /// A repeat login on the same local day is a no-op; a login the day
    /// after the last one extends the streak; any gap resets it to 1.
    /// Milestone lengths grant a streak achievement through the
    /// idempotent batch path, so replays cannot double-grant.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`] on store failure.
    pub async fn record_login(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
    ) -> Result<LoginOutcome, EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        let today = self.clock.today_key(Utc::now());

        if state.last_login_day.as_deref() == Some(today.as_str()) {
            return Ok(LoginOutcome {
                streak_days: state.streak_days,
                extended: false,
            });
        }

        let streak_days = match state.last_login_day.as_deref() {
            Some(last) => {
                let gap = schedule::day_index(&today)?
                    .saturating_sub(schedule::day_index(last)?);
                if gap == 1 {
                    state.streak_days.saturating_add(1)
                } else {
                    1
                }
            }
            None => 1,
        };

        WorldStateStore::new(&self.pool)
            .set_login(state.id, &today, streak_days)
            .await?;
        debug!(state = %state.id, today, streak_days, "Login recorded");

        if STREAK_MILESTONES.contains(&streak_days)
            && self.config.achievements.contains_key("streak")
        {
            let items = [AchievementItem {
                kind: "streak".to_owned(),
                key: format!("streak:{streak_days}"),
            }];
            self.grant_achievements_for_state(&state, &items).await?;
        }

        Ok(LoginOutcome {
            streak_days,
            extended: true,
        })
    }
}
