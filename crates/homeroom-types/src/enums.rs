//! Enumeration types for the Homeroom gamification engine.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

// ---------------------------------------------------------------------------
// XP sources
// ---------------------------------------------------------------------------

/// The origin of an XP ledger event.
///
/// Every grant is tagged with its source so that per-source daily caps
/// and per-source duplicate detection can be enforced by summing or
/// probing the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum XpSource {
    /// Student checked in to class (attendance).
    CheckIn,
    /// Student submitted an assignment.
    AssignmentSubmitted,
    /// Student completed a quiz.
    QuizCompleted,
    /// Student claimed the daily care event.
    DailyCare,
    /// A discrete achievement granted through the idempotent batch path.
    Achievement,
    /// Bonus XP awarded by the weekly evaluation engine.
    WeeklyBonus,
}

// ---------------------------------------------------------------------------
// Daily event lifecycle
// ---------------------------------------------------------------------------

/// Lifecycle state of a daily care event.
///
/// Transitions are forward-only: `Claimable -> Claimed` (user action)
/// or `Claimable -> Expired` (scheduler sweep). A row never moves
/// backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum DailyEventStatus {
    /// Spawned and within its claim window.
    Claimable,
    /// Claimed by the student before the window closed.
    Claimed,
    /// The claim window passed without a claim.
    Expired,
}

// ---------------------------------------------------------------------------
// Weekly tiers
// ---------------------------------------------------------------------------

/// Discrete weekly performance band.
///
/// Ordered from lowest to highest; derived from the weighted bucket
/// score and the number of present buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum WeeklyTier {
    /// Baseline band, including weeks with no scorable signals.
    Bronze,
    /// Solid week.
    Silver,
    /// Strong week across multiple signals.
    Gold,
    /// Exceptional week across all signals.
    Platinum,
}

impl WeeklyTier {
    /// The lowest tier, used for weeks with no present buckets.
    pub const LOWEST: Self = Self::Bronze;
}

// ---------------------------------------------------------------------------
// Weekly signal buckets
// ---------------------------------------------------------------------------

/// One of the three independent weekly signal buckets.
///
/// A bucket with a zero denominator for the week (no scheduled days, no
/// due assignments, no eligible care days) is excluded from scoring
/// rather than scored as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
#[serde(rename_all = "snake_case")]
pub enum SignalBucket {
    /// Attended vs. scheduled class days.
    Attendance,
    /// On-time submissions vs. assignments due in the window.
    Assignment,
    /// Claimed vs. eligible daily care days.
    Care,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_are_ordered() {
        assert!(WeeklyTier::Bronze < WeeklyTier::Silver);
        assert!(WeeklyTier::Silver < WeeklyTier::Gold);
        assert!(WeeklyTier::Gold < WeeklyTier::Platinum);
        assert_eq!(WeeklyTier::LOWEST, WeeklyTier::Bronze);
    }

    #[test]
    fn sources_serialize_snake_case() {
        let json = serde_json::to_string(&XpSource::AssignmentSubmitted).unwrap_or_default();
        assert_eq!(json, "\"assignment_submitted\"");
    }

    #[test]
    fn status_roundtrips_through_serde() {
        for status in [
            DailyEventStatus::Claimable,
            DailyEventStatus::Claimed,
            DailyEventStatus::Expired,
        ] {
            let json = serde_json::to_string(&status).unwrap_or_default();
            let back: DailyEventStatus =
                serde_json::from_str(&json).unwrap_or(DailyEventStatus::Expired);
            assert_eq!(back, status);
        }
    }
}
