//! Leveling arithmetic: pure, total functions over the cumulative XP
//! counter.
//!
//! The level is never stored -- it is always derived from `xp` and the
//! configured XP-per-level constant, so a state can never carry a level
//! that disagrees with its ledger. Cosmetic unlocks are a monotonic
//! function of the level: an index is unlocked exactly when its
//! threshold is at or below the current level.

use std::collections::BTreeSet;

/// Compute the level implied by a cumulative XP total.
///
/// `level = floor(xp / xp_per_level)`. A zero divisor yields level 0
/// rather than panicking; configuration validation rejects it upstream.
pub fn level_for_xp(xp: u64, xp_per_level: u32) -> u32 {
    if xp_per_level == 0 {
        return 0;
    }
    let level = xp.checked_div(u64::from(xp_per_level)).unwrap_or(0);
    u32::try_from(level).unwrap_or(u32::MAX)
}

/// Compute the XP progress within the current level.
///
/// Always in `[0, xp_per_level)` for a non-zero divisor.
pub fn progress_within_level(xp: u64, xp_per_level: u32) -> u32 {
    if xp_per_level == 0 {
        return 0;
    }
    let progress = xp.checked_rem(u64::from(xp_per_level)).unwrap_or(0);
    u32::try_from(progress).unwrap_or(0)
}

/// Return every catalog index whose unlock threshold is at or below
/// `level`.
///
/// `thresholds[i]` is the level at which image index `i` unlocks.
pub fn unlocked_indices(level: u32, thresholds: &[u32]) -> BTreeSet<u32> {
    thresholds
        .iter()
        .enumerate()
        .filter(|&(_, &threshold)| threshold <= level)
        .map(|(index, _)| u32::try_from(index).unwrap_or(u32::MAX))
        .collect()
}

/// Return the indices unlocked at `level` that are not already in
/// `existing`.
///
/// Order-independent set difference; merging the result into `existing`
/// and calling again yields the empty set.
pub fn new_unlocks(existing: &BTreeSet<u32>, level: u32, thresholds: &[u32]) -> BTreeSet<u32> {
    unlocked_indices(level, thresholds)
        .difference(existing)
        .copied()
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    const THRESHOLDS: &[u32] = &[0, 1, 3, 5, 8];

    #[test]
    fn level_is_floor_division() {
        assert_eq!(level_for_xp(0, 100), 0);
        assert_eq!(level_for_xp(99, 100), 0);
        assert_eq!(level_for_xp(100, 100), 1);
        assert_eq!(level_for_xp(250, 100), 2);
    }

    #[test]
    fn level_is_monotonic_in_xp() {
        let mut previous = 0;
        for xp in 0..1000u64 {
            let level = level_for_xp(xp, 100);
            assert!(level >= previous, "level decreased at xp {xp}");
            previous = level;
        }
    }

    #[test]
    fn progress_stays_below_divisor() {
        for xp in 0..1000u64 {
            let progress = progress_within_level(xp, 100);
            assert!(progress < 100, "progress out of range at xp {xp}");
        }
        assert_eq!(progress_within_level(105, 100), 5);
    }

    #[test]
    fn zero_divisor_does_not_panic() {
        assert_eq!(level_for_xp(500, 0), 0);
        assert_eq!(progress_within_level(500, 0), 0);
    }

    #[test]
    fn unlocked_indices_respect_thresholds() {
        let at_zero = unlocked_indices(0, THRESHOLDS);
        assert_eq!(at_zero, BTreeSet::from([0]));

        let at_three = unlocked_indices(3, THRESHOLDS);
        assert_eq!(at_three, BTreeSet::from([0, 1, 2]));

        let at_eight = unlocked_indices(8, THRESHOLDS);
        assert_eq!(at_eight.len(), THRESHOLDS.len());
    }

    #[test]
    fn new_unlocks_is_disjoint_from_existing() {
        let existing = BTreeSet::from([0, 1]);
        let fresh = new_unlocks(&existing, 5, THRESHOLDS);
        assert!(fresh.is_disjoint(&existing));
        assert_eq!(fresh, BTreeSet::from([2, 3]));
    }

    #[test]
    fn new_unlocks_never_exceeds_level() {
        let fresh = new_unlocks(&BTreeSet::new(), 4, THRESHOLDS);
        for index in &fresh {
            let threshold = THRESHOLDS[usize::try_from(*index).unwrap()];
            assert!(threshold <= 4);
        }
    }

    #[test]
    fn new_unlocks_is_idempotent_after_merge() {
        let mut existing = BTreeSet::from([0]);
        let fresh = new_unlocks(&existing, 8, THRESHOLDS);
        existing.extend(fresh);
        assert!(new_unlocks(&existing, 8, THRESHOLDS).is_empty());
    }

    #[test]
    fn crossing_a_level_boundary_unlocks() {
        // xp 95 -> +10 -> xp 105 crosses level 0 -> 1.
        let before = level_for_xp(95, 100);
        let after = level_for_xp(105, 100);
        assert_eq!(before, 0);
        assert_eq!(after, 1);

        let existing = unlocked_indices(before, THRESHOLDS);
        let fresh = new_unlocks(&existing, after, THRESHOLDS);
        assert_eq!(fresh, BTreeSet::from([1]));
    }
}
