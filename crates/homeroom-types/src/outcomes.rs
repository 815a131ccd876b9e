//! Outcome payloads returned by the engine's inbound operations.
//!
//! Idempotent no-ops (cap reached, already granted, already claimed,
//! already evaluated) are successful calls with zero effect, so every
//! outcome carries an explicit "did anything happen" flag or count
//! rather than signaling through errors.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::structs::{DailyEvent, WeeklyResult, WorldState};

// ---------------------------------------------------------------------------
// Grant outcomes
// ---------------------------------------------------------------------------

/// Result of a single `grant_xp` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct GrantOutcome {
    /// Whether the grant was applied. `false` means an idempotent no-op
    /// (daily cap met, or the metadata key was already granted).
    pub granted: bool,
    /// XP actually awarded by this call.
    pub xp_awarded: u32,
    /// The level after this call.
    pub new_level: u32,
    /// Cosmetic indices newly unlocked by this call.
    pub new_unlocks: Vec<u32>,
}

impl GrantOutcome {
    /// An outcome for a call that changed nothing at the given level.
    pub const fn not_granted(level: u32) -> Self {
        Self {
            granted: false,
            xp_awarded: 0,
            new_level: level,
            new_unlocks: Vec::new(),
        }
    }
}

/// Result of a `grant_achievements` batch call.
///
/// Already-granted items are skipped silently; `granted_keys` lists the
/// reward keys that were actually applied by this call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BatchGrantOutcome {
    /// Reward keys granted by this call, in input order.
    pub granted_keys: Vec<String>,
    /// Total XP awarded across the batch (one atomic increment).
    pub xp_awarded: u32,
    /// The level after this call.
    pub new_level: u32,
    /// Cosmetic indices newly unlocked by this call.
    pub new_unlocks: Vec<u32>,
}

// ---------------------------------------------------------------------------
// Daily claim outcome
// ---------------------------------------------------------------------------

/// Result of a `claim_daily` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ClaimOutcome {
    /// Whether this call performed the claim transition. `false` means
    /// there was nothing to claim (no event, expired, or already
    /// claimed -- including by a concurrent duplicate request).
    pub claimed: bool,
    /// Key of the claimed event, when `claimed` is `true`.
    pub event_key: Option<String>,
    /// XP awarded for the claim.
    pub xp_awarded: u32,
    /// The level after this call.
    pub new_level: u32,
    /// Cosmetic indices newly unlocked by this call.
    pub new_unlocks: Vec<u32>,
}

impl ClaimOutcome {
    /// An outcome for a call that found nothing to claim.
    pub const fn nothing(level: u32) -> Self {
        Self {
            claimed: false,
            event_key: None,
            xp_awarded: 0,
            new_level: level,
            new_unlocks: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Login outcome
// ---------------------------------------------------------------------------

/// Result of a `record_login` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct LoginOutcome {
    /// The streak length after this call.
    pub streak_days: u32,
    /// Whether this call extended the streak (first login of the day).
    pub extended: bool,
}

// ---------------------------------------------------------------------------
// Tick outcome
// ---------------------------------------------------------------------------

/// Counts returned by one cadence tick, for observability.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct TickOutcome {
    /// Daily events spawned by this tick.
    pub daily_spawned: u32,
    /// Stale claimable events expired by this tick's sweep.
    pub expired: u64,
    /// Weekly evaluations persisted by this tick.
    pub weekly_evaluated: u32,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The read-model returned to the classroom client: current state plus
/// derived leveling data, today's event, and the latest weekly result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct WorldSnapshot {
    /// The raw world state row.
    pub state: WorldState,
    /// Level derived from cumulative XP.
    pub level: u32,
    /// XP progress within the current level.
    pub progress: u32,
    /// XP required per level (for rendering the progress bar).
    pub xp_per_level: u32,
    /// All unlocked cosmetic indices, ascending.
    pub unlocked_images: Vec<u32>,
    /// Narrative era derived from the weekly track level.
    pub era: u32,
    /// Today's daily event, if one has spawned.
    pub today_event: Option<DailyEvent>,
    /// The most recent weekly result, if any week has been evaluated.
    pub latest_weekly: Option<WeeklyResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_granted_is_empty() {
        let outcome = GrantOutcome::not_granted(3);
        assert!(!outcome.granted);
        assert_eq!(outcome.xp_awarded, 0);
        assert_eq!(outcome.new_level, 3);
        assert!(outcome.new_unlocks.is_empty());
    }

    #[test]
    fn nothing_to_claim_is_empty() {
        let outcome = ClaimOutcome::nothing(1);
        assert!(!outcome.claimed);
        assert_eq!(outcome.event_key, None);
        assert_eq!(outcome.xp_awarded, 0);
    }
}
