//! Core entity structs for the Homeroom gamification engine.
//!
//! Covers the per-student world state, the append-only XP ledger event,
//! the daily care event, the weekly evaluation result, and the small
//! value types shared between the engine and its collaborators.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::enums::{DailyEventStatus, WeeklyTier, XpSource};
use crate::ids::{ClassroomId, DailyEventId, UserId, WeeklyResultId, WorldStateId, XpEventId};

// ---------------------------------------------------------------------------
// WorldState
// ---------------------------------------------------------------------------

/// The per-user, per-classroom gamification record.
///
/// Created lazily on first access, mutated by every grant and every
/// cadence tick, never deleted in normal operation. `xp` is cumulative
/// and monotonically non-decreasing; the level is always derived from
/// it, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldState {
    /// Row identifier.
    pub id: WorldStateId,
    /// The student this world belongs to.
    pub user_id: UserId,
    /// The classroom this world belongs to.
    pub classroom_id: ClassroomId,
    /// Cumulative experience points. Only ever increases.
    pub xp: u64,
    /// Index of the cosmetic image currently selected. Must be unlocked.
    pub selected_image: u32,
    /// Whether the classroom overlay is shown for this world.
    pub overlay_enabled: bool,
    /// Consecutive login days.
    pub streak_days: u32,
    /// Date key of the last recorded login, or `None` before the first.
    pub last_login_day: Option<String>,
    /// Next instant the daily spawn is due, or `None` until computed.
    pub next_daily_spawn_at: Option<DateTime<Utc>>,
    /// Next instant the weekly evaluation is due, or `None` until computed.
    pub next_weekly_eval_at: Option<DateTime<Utc>>,
    /// Secondary leveling currency, advanced only by weekly bonuses.
    pub weekly_track_level: u32,
    /// Track points toward the next track level. Always below the
    /// points-per-level threshold.
    pub weekly_track_points: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// XpEvent
// ---------------------------------------------------------------------------

/// A single append-only XP ledger row.
///
/// Write-once. Used for audit, per-source daily caps, and duplicate
/// grant detection for sources configured as once-per-metadata-key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct XpEvent {
    /// Row identifier.
    pub id: XpEventId,
    /// The world state this event belongs to.
    pub state_id: WorldStateId,
    /// Where the XP came from.
    pub source: XpSource,
    /// XP amount granted. Non-negative.
    pub amount: u32,
    /// Free-form source context (assignment id, event key, week start...).
    pub metadata: serde_json::Value,
    /// Insertion timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// DailyEvent
// ---------------------------------------------------------------------------

/// A claimable daily care event.
///
/// At most one row exists per `(state, event_day)`. The event key is
/// selected deterministically from the configured catalog so that
/// "today's event" is identical for every world and reproducible for
/// support and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct DailyEvent {
    /// Row identifier.
    pub id: DailyEventId,
    /// The world state this event belongs to.
    pub state_id: WorldStateId,
    /// The calendar date key (fixed timezone) this event is for.
    pub event_day: String,
    /// Catalog key of the event.
    pub event_key: String,
    /// Lifecycle status.
    pub status: DailyEventStatus,
    /// Instant the claim window closes (start of the next local day).
    pub claimable_until: DateTime<Utc>,
    /// When the event was claimed, if it was.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// WeeklyResult
// ---------------------------------------------------------------------------

/// Per-bucket weekly scores; an absent bucket had no denominator this
/// week and was excluded from scoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BucketScores {
    /// Attendance bucket points (0-100), if scorable.
    pub attendance: Option<u32>,
    /// Assignment bucket points (0-100), if scorable.
    pub assignment: Option<u32>,
    /// Daily-care bucket points (0-100), if scorable.
    pub care: Option<u32>,
}

impl BucketScores {
    /// Number of buckets that were present (scorable) this week.
    pub const fn present_count(&self) -> usize {
        let mut count: usize = 0;
        if self.attendance.is_some() {
            count = count.saturating_add(1);
        }
        if self.assignment.is_some() {
            count = count.saturating_add(1);
        }
        if self.care.is_some() {
            count = count.saturating_add(1);
        }
        count
    }
}

/// The immutable record of one weekly evaluation.
///
/// At most one row exists per `(state, week_start)`; a tick that fires
/// twice for the same week finds the row and does not re-score.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WeeklyResult {
    /// Row identifier.
    pub id: WeeklyResultId,
    /// The world state this result belongs to.
    pub state_id: WorldStateId,
    /// First date key of the trailing week window (inclusive).
    pub week_start: String,
    /// Last date key of the trailing week window (inclusive).
    pub week_end: String,
    /// Per-bucket scores.
    pub bucket_scores: BucketScores,
    /// Sum of points earned across present buckets.
    pub earned_points: u32,
    /// Sum of available points across present buckets.
    pub available_points: u32,
    /// Weighted weekly percentage, or `None` when no bucket was present.
    #[ts(as = "Option<String>")]
    pub weekly_pct: Option<Decimal>,
    /// Resolved performance tier.
    pub tier: WeeklyTier,
    /// Selected narrative reward key, if the catalog yielded one.
    pub event_key: Option<String>,
    /// Bonus XP awarded for the tier.
    pub bonus_xp: u32,
    /// Track points awarded for the tier.
    pub track_points_awarded: u32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Shared value types
// ---------------------------------------------------------------------------

/// A trailing 7-day evaluation window, both bounds inclusive date keys
/// in the engine's fixed timezone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WeekWindow {
    /// First date key of the window.
    pub start: String,
    /// Last date key of the window.
    pub end: String,
}

/// One achievement to grant through the idempotent batch path.
///
/// `kind` selects the fixed XP amount from the achievement catalog;
/// `key` makes the grant unique (e.g. `streak:7`, `quiz:<uuid>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AchievementItem {
    /// Catalog kind of the achievement (reward type).
    pub kind: String,
    /// Stable idempotency key (reward key) within the kind.
    pub key: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bucket_present_count() {
        let none = BucketScores::default();
        assert_eq!(none.present_count(), 0);

        let two = BucketScores {
            attendance: Some(80),
            assignment: None,
            care: Some(100),
        };
        assert_eq!(two.present_count(), 2);
    }

    #[test]
    fn achievement_item_roundtrips() {
        let item = AchievementItem {
            kind: "streak".to_owned(),
            key: "streak:7".to_owned(),
        };
        let json = serde_json::to_string(&item).unwrap_or_default();
        let back: Result<AchievementItem, _> = serde_json::from_str(&json);
        assert_eq!(back.ok(), Some(item));
    }
}
