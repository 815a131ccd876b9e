//! The reward idempotency layer: `grant_xp` and `grant_achievements`.
//!
//! Both paths share one invariant ordering per call: ledger insert,
//! then one atomic XP increment, then one unlock diff. The batch path
//! applies a single increment for the whole batch, which bounds
//! read-after-write cycles when achievement bursts land together
//! (streak + weekly + submission bonuses in one request).
//!
//! Duplicate suppression is entirely data-layer state: per-source
//! daily caps and metadata keys probe the ledger, achievement keys
//! insert into `reward_grants` first and skip on conflict. A refused
//! grant is a successful call with zero effect.

use chrono::Utc;
use homeroom_core::config::SourceRule;
use homeroom_core::leveling;
use homeroom_db::{NewXpEvent, RewardGrantStore, UnlockStore, WorldStateStore, XpEventStore};
use homeroom_types::{
    AchievementItem, BatchGrantOutcome, ClassroomId, GrantOutcome, UserId, WorldState,
    WorldStateId, XpSource,
};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::signals::SignalSource;
use crate::CadenceEngine;

/// The result of applying XP through the shared path.
pub(crate) struct AppliedXp {
    /// Level implied by the new XP total.
    pub level: u32,
    /// Indices newly unlocked by this call, ascending.
    pub new_unlocks: Vec<u32>,
}

impl<S: SignalSource> CadenceEngine<S> {
    /// Grant XP from a producer-driven source, enforcing the source's
    /// daily cap and once-per-metadata-key rules.
    ///
    /// Cap-met and already-granted conditions return `granted: false`
    /// with nothing mutated -- idempotent no-ops, not errors.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SourceNotDirect`] for sources that flow
    /// through their own paths, or [`EngineError::Db`] on store
    /// failure.
    pub async fn grant_xp(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        source: XpSource,
        metadata: serde_json::Value,
    ) -> Result<GrantOutcome, EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        self.grant_xp_for_state(&state, source, metadata).await
    }

    /// Grant XP against an already-loaded state row.
    pub(crate) async fn grant_xp_for_state(
        &self,
        state: &WorldState,
        source: XpSource,
        metadata: serde_json::Value,
    ) -> Result<GrantOutcome, EngineError> {
        let Some(rule) = self.source_rule(source) else {
            return Err(EngineError::SourceNotDirect { xp_source: source });
        };
        let current_level =
            leveling::level_for_xp(state.xp, self.config.leveling.xp_per_level);
        let ledger = XpEventStore::new(&self.pool);
        let now = Utc::now();

        // 1. Daily cap: refuse any grant that would push today's total
        //    for this source past the cap.
        if let Some(cap) = rule.daily_cap {
            let (from, to) = self.clock.utc_day_bounds(now)?;
            let granted_today = ledger
                .sum_for_source_between(state.id, source, from, to)
                .await?;
            if granted_today.saturating_add(rule.amount) > cap {
                debug!(state = %state.id, ?source, granted_today, cap, "daily cap met");
                return Ok(GrantOutcome::not_granted(current_level));
            }
        }

        // 2. Once-per-metadata-key: a ledger row with the same key
        //    value means this grant already happened.
        if let Some(key) = rule.once_per_metadata_key.as_deref() {
            if let Some(value) = metadata.get(key).and_then(serde_json::Value::as_str) {
                if ledger
                    .exists_with_metadata(state.id, source, key, value)
                    .await?
                {
                    debug!(state = %state.id, ?source, key, value, "already granted");
                    return Ok(GrantOutcome::not_granted(current_level));
                }
            }
        }

        // 3-4. Ledger, increment, unlock diff.
        let applied = self
            .apply_xp(state.id, source, rule.amount, metadata)
            .await?;

        Ok(GrantOutcome {
            granted: true,
            xp_awarded: rule.amount,
            new_level: applied.level,
            new_unlocks: applied.new_unlocks,
        })
    }

    /// Grant a batch of achievements, at most once each.
    ///
    /// Every item's kind is validated against the catalog before
    /// anything is mutated. Already-granted items are skipped silently;
    /// the batch never aborts on a duplicate. All applied XP lands as
    /// one UNNEST ledger insert and one atomic increment, followed by
    /// one unlock diff.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownAchievement`] if any kind is not
    /// in the catalog (nothing mutated), or [`EngineError::Db`] on
    /// store failure.
    pub async fn grant_achievements(
        &self,
        user_id: UserId,
        classroom_id: ClassroomId,
        items: &[AchievementItem],
    ) -> Result<BatchGrantOutcome, EngineError> {
        let state = self.get_or_create_state(user_id, classroom_id).await?;
        self.grant_achievements_for_state(&state, items).await
    }

    /// Batch-grant against an already-loaded state row.
    pub(crate) async fn grant_achievements_for_state(
        &self,
        state: &WorldState,
        items: &[AchievementItem],
    ) -> Result<BatchGrantOutcome, EngineError> {
        // Validate the whole batch up front: an unknown kind rejects
        // the call before any record is written.
        let mut amounts = Vec::with_capacity(items.len());
        for item in items {
            let xp = self
                .config
                .achievements
                .get(&item.kind)
                .copied()
                .ok_or_else(|| EngineError::UnknownAchievement {
                    kind: item.kind.clone(),
                })?;
            amounts.push(xp);
        }

        let grants = RewardGrantStore::new(&self.pool);
        let mut granted_keys = Vec::new();
        let mut ledger_rows = Vec::new();
        let mut total: u32 = 0;

        for (item, xp) in items.iter().zip(amounts) {
            // First insert the idempotency record; a conflict means
            // "already granted" and the item is skipped, not an error.
            if !grants.try_insert(state.id, &item.kind, &item.key).await? {
                debug!(state = %state.id, kind = item.kind, key = item.key, "achievement already granted");
                continue;
            }
            granted_keys.push(item.key.clone());
            // Zero-XP grants keep their grant record but write no
            // ledger row.
            if xp > 0 {
                ledger_rows.push(NewXpEvent::new(
                    state.id,
                    XpSource::Achievement,
                    xp,
                    serde_json::json!({ "kind": item.kind, "key": item.key }),
                ));
                total = total.saturating_add(xp);
            }
        }

        XpEventStore::new(&self.pool)
            .insert_batch(&ledger_rows)
            .await?;

        let state_store = WorldStateStore::new(&self.pool);
        let new_xp = if total > 0 {
            state_store.add_xp(state.id, total).await?
        } else {
            state_store
                .get_by_id(state.id)
                .await?
                .map_or(state.xp, |s| s.xp)
        };

        let (level, new_unlocks) = self.refresh_unlocks(state.id, new_xp).await?;

        if !granted_keys.is_empty() {
            info!(
                state = %state.id,
                granted = granted_keys.len(),
                xp = total,
                "Achievements granted"
            );
        }

        Ok(BatchGrantOutcome {
            granted_keys,
            xp_awarded: total,
            new_level: level,
            new_unlocks,
        })
    }

    /// Shared grant tail: ledger insert, atomic increment, unlock diff
    /// -- in that order, always.
    pub(crate) async fn apply_xp(
        &self,
        state_id: WorldStateId,
        source: XpSource,
        amount: u32,
        metadata: serde_json::Value,
    ) -> Result<AppliedXp, EngineError> {
        XpEventStore::new(&self.pool)
            .insert(&NewXpEvent::new(state_id, source, amount, metadata))
            .await?;

        let new_xp = WorldStateStore::new(&self.pool)
            .add_xp(state_id, amount)
            .await?;

        let (level, new_unlocks) = self.refresh_unlocks(state_id, new_xp).await?;

        Ok(AppliedXp { level, new_unlocks })
    }

    /// Diff unlocked indices against the new level and persist any new
    /// members. Returns the level and the fresh indices.
    pub(crate) async fn refresh_unlocks(
        &self,
        state_id: WorldStateId,
        xp: u64,
    ) -> Result<(u32, Vec<u32>), EngineError> {
        let level = leveling::level_for_xp(xp, self.config.leveling.xp_per_level);
        let unlock_store = UnlockStore::new(&self.pool);
        let existing = unlock_store.indices_for(state_id).await?;
        let fresh = leveling::new_unlocks(&existing, level, &self.config.leveling.image_thresholds);
        if !fresh.is_empty() {
            unlock_store.insert_many(state_id, &fresh).await?;
            info!(state = %state_id, level, unlocked = fresh.len(), "New cosmetics unlocked");
        }
        Ok((level, fresh.into_iter().collect()))
    }

    /// The grant rule for a producer-driven source. Daily-care,
    /// achievement, and weekly-bonus XP flow through their own paths
    /// and are not directly grantable.
    pub(crate) fn source_rule(&self, source: XpSource) -> Option<&SourceRule> {
        match source {
            XpSource::CheckIn => Some(&self.config.sources.check_in),
            XpSource::AssignmentSubmitted => Some(&self.config.sources.assignment_submitted),
            XpSource::QuizCompleted => Some(&self.config.sources.quiz_completed),
            XpSource::DailyCare | XpSource::Achievement | XpSource::WeeklyBonus => None,
        }
    }
}
