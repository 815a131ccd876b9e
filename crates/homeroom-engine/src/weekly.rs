//! Weekly evaluation engine.
//!
//! One immutable result per `(state, week)`. The insert-once row is
//! both the idempotency guard and the reward gate: of two overlapping
//! evaluations for the same week, exactly one insert succeeds and only
//! that caller applies bonus XP and track points.
//!
//! Buckets are optional: a zero denominator excludes the bucket from
//! scoring entirely. A week with no present buckets lands at the
//! lowest tier with zero bonus, zero track points, and no narrative
//! beat.

use chrono::{DateTime, Utc};
use homeroom_core::catalog::{self, RecentPick};
use homeroom_core::scoring::{self, BucketScore};
use homeroom_core::schedule;
use homeroom_db::{DailyEventStore, NewWeeklyResult, WeeklyResultStore, WorldStateStore};
use homeroom_types::{BucketScores, SignalBucket, WeeklyResultId, WorldState, XpSource};
use tracing::{debug, info};

use crate::error::EngineError;
use crate::signals::SignalSource;
use crate::CadenceEngine;

impl<S: SignalSource> CadenceEngine<S> {
    /// Evaluate the most recent completed week for a state.
    ///
    /// Returns `true` when this call persisted the result (and applied
    /// rewards); `false` for the idempotent re-entry where the week was
    /// already evaluated. The next-evaluation pointer is rescheduled in
    /// both cases. A late evaluation scores only the single most recent
    /// window relative to `now` -- missed weeks are not backfilled.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Db`], [`EngineError::Schedule`], or
    /// [`EngineError::Signal`] on failure.
    pub(crate) async fn evaluate_week(
        &self,
        state: &WorldState,
        now: DateTime<Utc>,
    ) -> Result<bool, EngineError> {
        let window = self.clock.week_window(now);
        let weekly = WeeklyResultStore::new(&self.pool);
        let state_store = WorldStateStore::new(&self.pool);

        // Idempotent re-entry: a second tick for the same week only
        // reschedules.
        if weekly.get(state.id, &window.start).await?.is_some() {
            debug!(state = %state.id, week = window.start, "week already evaluated");
            state_store
                .reschedule_weekly(state.id, self.clock.next_weekly_trigger(now)?)
                .await?;
            return Ok(false);
        }

        // Gather the three independent signals over the window.
        let attendance = self
            .signals
            .attendance(state.user_id, state.classroom_id, &window)
            .await?;
        let assignments = self
            .signals
            .assignments(state.user_id, state.classroom_id, &window)
            .await?;
        let care = DailyEventStore::new(&self.pool)
            .care_counts(state.id, &window.start, &window.end)
            .await?;

        let curves = &self.config.weekly.buckets;
        let mut scores: Vec<BucketScore> = Vec::with_capacity(3);
        if let Some(score) = scoring::score_bucket(
            SignalBucket::Attendance,
            attendance.attended_days,
            attendance.scheduled_days,
            &curves.attendance,
        ) {
            scores.push(score);
        }
        if let Some(score) = scoring::score_bucket(
            SignalBucket::Assignment,
            assignments.on_time_count,
            assignments.due_count,
            &curves.assignment,
        ) {
            scores.push(score);
        }
        if let Some(score) =
            scoring::score_bucket(SignalBucket::Care, care.claimed, care.eligible, &curves.care)
        {
            scores.push(score);
        }

        let pct = scoring::weekly_pct(&scores);
        let tier = scoring::resolve_tier(pct, scores.len(), &self.config.weekly.tiers);

        // A signal-free week earns nothing beyond its record.
        let reward = if scores.is_empty() {
            homeroom_core::config::TierReward::default()
        } else {
            self.config.weekly.rewards.for_tier(tier)
        };

        let event_key = if scores.is_empty() {
            None
        } else {
            self.select_narrative(state, tier, &window.start).await?
        };

        let earned = scores
            .iter()
            .fold(0u32, |acc, s| acc.saturating_add(s.points));
        let available = scores
            .iter()
            .fold(0u32, |acc, s| acc.saturating_add(s.available));

        let result = NewWeeklyResult {
            id: WeeklyResultId::new(),
            state_id: state.id,
            week_start: window.start.clone(),
            week_end: window.end.clone(),
            bucket_scores: collect_bucket_scores(&scores),
            earned_points: earned,
            available_points: available,
            weekly_pct: pct,
            tier,
            event_key: event_key.clone(),
            bonus_xp: reward.bonus_xp,
            track_points_awarded: reward.track_points,
        };

        let inserted = weekly.try_insert(&result).await?;
        if inserted {
            // Only the winning insert applies rewards, so overlapping
            // ticks cannot double-pay a week.
            if reward.bonus_xp > 0 {
                self.apply_xp(
                    state.id,
                    XpSource::WeeklyBonus,
                    reward.bonus_xp,
                    serde_json::json!({ "week_start": window.start, "tier": tier }),
                )
                .await?;
            }
            if reward.track_points > 0 {
                state_store
                    .add_track_points(
                        state.id,
                        reward.track_points,
                        self.config.weekly.track_points_per_level,
                    )
                    .await?;
            }
            info!(
                state = %state.id,
                week = window.start,
                ?tier,
                pct = ?pct,
                buckets = scores.len(),
                event_key = event_key.as_deref().unwrap_or("-"),
                "Week evaluated"
            );
        } else {
            debug!(state = %state.id, week = window.start, "lost weekly insert race");
        }

        state_store
            .reschedule_weekly(state.id, self.clock.next_weekly_trigger(now)?)
            .await?;

        Ok(inserted)
    }

    /// Pick the narrative reward key for a scored week: era gate,
    /// per-entry cooldown filter, then a weighted draw.
    async fn select_narrative(
        &self,
        state: &WorldState,
        tier: homeroom_types::WeeklyTier,
        week_start: &str,
    ) -> Result<Option<String>, EngineError> {
        let catalog_entries = &self.config.weekly.narrative_catalog;
        if catalog_entries.is_empty() {
            return Ok(None);
        }

        let era = catalog::era_for_track_level(
            state.weekly_track_level,
            &self.config.weekly.era_thresholds,
        );

        // Fetch enough history to cover the longest cooldown.
        let max_cooldown = catalog_entries
            .iter()
            .map(|entry| entry.cooldown_weeks)
            .max()
            .unwrap_or(0);
        let recent_rows = WeeklyResultStore::new(&self.pool)
            .recent_keys(state.id, i64::from(max_cooldown.max(1)))
            .await?;

        let recent: Vec<RecentPick> = recent_rows
            .iter()
            .filter_map(|(start, key)| {
                let weeks = schedule::weeks_between(start, week_start).ok()?;
                let weeks_ago = u32::try_from(weeks).ok()?;
                Some(RecentPick {
                    key: key.clone(),
                    weeks_ago,
                })
            })
            .collect();

        let pool = catalog::narrative_pool(catalog_entries, tier, era, &recent);
        let picked = catalog::weighted_pick(&pool, &mut rand::rng());
        Ok(picked.map(|entry| entry.key.clone()))
    }
}

/// Fold the score list back into the per-bucket record shape.
fn collect_bucket_scores(scores: &[BucketScore]) -> BucketScores {
    let mut collected = BucketScores::default();
    for score in scores {
        match score.bucket {
            SignalBucket::Attendance => collected.attendance = Some(score.points),
            SignalBucket::Assignment => collected.assignment = Some(score.points),
            SignalBucket::Care => collected.care = Some(score.points),
        }
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_scores_collect_by_kind() {
        let scores = [
            BucketScore {
                bucket: SignalBucket::Attendance,
                points: 80,
                available: 100,
            },
            BucketScore {
                bucket: SignalBucket::Care,
                points: 100,
                available: 100,
            },
        ];
        let collected = collect_bucket_scores(&scores);
        assert_eq!(collected.attendance, Some(80));
        assert_eq!(collected.assignment, None);
        assert_eq!(collected.care, Some(100));
    }
}
