//! Catalog selection: the deterministic daily care key, era derivation,
//! and the cooldown-aware weighted narrative pick.
//!
//! The daily key is pure arithmetic over the date -- every world sees
//! the same event on the same date, which makes "today's event"
//! reproducible for support and debugging. The weekly narrative pick is
//! split into two independently testable steps: a pure pool filter
//! (tier, era gate, per-entry cooldown, fallbacks) and a
//! cumulative-weight draw that takes the RNG as a parameter so tests
//! can inject a seeded generator.

use homeroom_types::WeeklyTier;
use rand::Rng;

use crate::config::NarrativeEntry;

/// Today's care event key: `catalog[|day_index| mod catalog_len]`.
///
/// Returns `None` for an empty catalog. `day_index` is the signed
/// number of days since the Unix epoch date; the absolute value keeps
/// the selection total for pre-epoch dates.
pub fn daily_event_key(catalog: &[String], day_index: i64) -> Option<&str> {
    if catalog.is_empty() {
        return None;
    }
    let len = u64::try_from(catalog.len()).ok()?;
    let slot = day_index.unsigned_abs().checked_rem(len).unwrap_or(0);
    let slot = usize::try_from(slot).ok()?;
    catalog.get(slot).map(String::as_str)
}

/// Era implied by a weekly track level: the count of thresholds at or
/// below the level.
pub fn era_for_track_level(track_level: u32, thresholds: &[u32]) -> u32 {
    let count = thresholds
        .iter()
        .filter(|&&threshold| threshold <= track_level)
        .count();
    u32::try_from(count).unwrap_or(u32::MAX)
}

/// A narrative key used in a recent week, for cooldown filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentPick {
    /// The narrative key that was selected.
    pub key: String,
    /// Whole weeks between that selection's week and the current one
    /// (the immediately previous week is 1).
    pub weeks_ago: u32,
}

/// Filter the narrative catalog down to the pool a tier draw runs over.
///
/// Filtering proceeds tier match -> era gate -> per-entry cooldown
/// (an entry used `weeks_ago <= cooldown_weeks` is excluded). If the
/// cooldown filter empties the pool, the era-gated pool is used; if
/// that is also empty, the raw tier pool. An empty tier pool yields an
/// empty result (no key is a valid outcome).
pub fn narrative_pool<'a>(
    catalog: &'a [NarrativeEntry],
    tier: WeeklyTier,
    era: u32,
    recent: &[RecentPick],
) -> Vec<&'a NarrativeEntry> {
    let tier_pool: Vec<&NarrativeEntry> =
        catalog.iter().filter(|entry| entry.tier == tier).collect();

    let era_pool: Vec<&NarrativeEntry> = tier_pool
        .iter()
        .copied()
        .filter(|entry| entry.min_era <= era)
        .collect();

    let cooled: Vec<&NarrativeEntry> = era_pool
        .iter()
        .copied()
        .filter(|entry| {
            !recent
                .iter()
                .any(|pick| pick.key == entry.key && pick.weeks_ago <= entry.cooldown_weeks)
        })
        .collect();

    if !cooled.is_empty() {
        cooled
    } else if !era_pool.is_empty() {
        era_pool
    } else {
        tier_pool
    }
}

/// Weighted random choice over a pool: one uniform draw against the
/// cumulative weight array.
///
/// Weights are non-negative. A pool whose weights sum to zero falls
/// back to a uniform pick, so a non-empty pool always yields a key.
/// Returns `None` only for an empty pool.
pub fn weighted_pick<'a>(
    pool: &[&'a NarrativeEntry],
    rng: &mut impl Rng,
) -> Option<&'a NarrativeEntry> {
    if pool.is_empty() {
        return None;
    }

    let total: u64 = pool
        .iter()
        .fold(0u64, |acc, entry| acc.saturating_add(u64::from(entry.weight)));

    if total == 0 {
        let slot = rng.random_range(0..pool.len());
        return pool.get(slot).copied();
    }

    let roll = rng.random_range(0..total);
    let mut cumulative: u64 = 0;
    for entry in pool {
        cumulative = cumulative.saturating_add(u64::from(entry.weight));
        if roll < cumulative {
            return Some(entry);
        }
    }
    pool.last().copied()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::arithmetic_side_effects)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("key-{i}")).collect()
    }

    fn entry(key: &str, tier: WeeklyTier, min_era: u32, weight: u32, cooldown: u32) -> NarrativeEntry {
        NarrativeEntry {
            key: key.to_owned(),
            tier,
            min_era,
            weight,
            cooldown_weeks: cooldown,
        }
    }

    #[test]
    fn daily_key_is_deterministic_and_wraps() {
        let catalog = keys(7);
        assert_eq!(daily_event_key(&catalog, 0), Some("key-0"));
        assert_eq!(daily_event_key(&catalog, 6), Some("key-6"));
        assert_eq!(daily_event_key(&catalog, 7), Some("key-0"));
        assert_eq!(daily_event_key(&catalog, 20_000), Some("key-1"));
    }

    #[test]
    fn daily_key_handles_negative_index() {
        let catalog = keys(7);
        // Pre-epoch dates use the absolute value.
        assert_eq!(daily_event_key(&catalog, -3), Some("key-3"));
    }

    #[test]
    fn daily_key_of_empty_catalog_is_none() {
        assert_eq!(daily_event_key(&[], 5), None);
    }

    #[test]
    fn era_counts_thresholds_at_or_below_level() {
        let thresholds = [2, 5, 9, 14];
        assert_eq!(era_for_track_level(0, &thresholds), 0);
        assert_eq!(era_for_track_level(2, &thresholds), 1);
        assert_eq!(era_for_track_level(8, &thresholds), 2);
        assert_eq!(era_for_track_level(40, &thresholds), 4);
    }

    #[test]
    fn pool_filters_by_tier_and_era() {
        let catalog = vec![
            entry("a", WeeklyTier::Gold, 0, 1, 0),
            entry("b", WeeklyTier::Gold, 2, 1, 0),
            entry("c", WeeklyTier::Silver, 0, 1, 0),
        ];
        let pool = narrative_pool(&catalog, WeeklyTier::Gold, 0, &[]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.first().unwrap().key, "a");
    }

    #[test]
    fn pool_excludes_entries_within_cooldown() {
        let catalog = vec![
            entry("a", WeeklyTier::Gold, 0, 1, 2),
            entry("b", WeeklyTier::Gold, 0, 1, 2),
        ];
        let recent = vec![RecentPick {
            key: "a".to_owned(),
            weeks_ago: 1,
        }];
        let pool = narrative_pool(&catalog, WeeklyTier::Gold, 0, &recent);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.first().unwrap().key, "b");
    }

    #[test]
    fn cooldown_expires_after_enough_weeks() {
        let catalog = vec![entry("a", WeeklyTier::Gold, 0, 1, 2)];
        let recent = vec![RecentPick {
            key: "a".to_owned(),
            weeks_ago: 3,
        }];
        let pool = narrative_pool(&catalog, WeeklyTier::Gold, 0, &recent);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn emptied_cooldown_pool_falls_back_to_era_pool() {
        let catalog = vec![entry("a", WeeklyTier::Gold, 0, 1, 4)];
        let recent = vec![RecentPick {
            key: "a".to_owned(),
            weeks_ago: 1,
        }];
        // Every entry is cooling down; the era pool is used anyway.
        let pool = narrative_pool(&catalog, WeeklyTier::Gold, 0, &recent);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn emptied_era_pool_falls_back_to_tier_pool() {
        let catalog = vec![entry("late", WeeklyTier::Gold, 3, 1, 0)];
        let pool = narrative_pool(&catalog, WeeklyTier::Gold, 0, &[]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.first().unwrap().key, "late");
    }

    #[test]
    fn empty_tier_pool_yields_no_key() {
        let catalog = vec![entry("a", WeeklyTier::Bronze, 0, 1, 0)];
        let pool = narrative_pool(&catalog, WeeklyTier::Platinum, 0, &[]);
        assert!(pool.is_empty());
        let mut rng = SmallRng::seed_from_u64(7);
        assert_eq!(weighted_pick(&pool, &mut rng), None);
    }

    #[test]
    fn zero_total_weight_still_picks() {
        let a = entry("a", WeeklyTier::Gold, 0, 0, 0);
        let b = entry("b", WeeklyTier::Gold, 0, 0, 0);
        let pool = vec![&a, &b];
        let mut rng = SmallRng::seed_from_u64(42);
        assert!(weighted_pick(&pool, &mut rng).is_some());
    }

    #[test]
    fn weighted_draw_matches_weights_over_many_samples() {
        // Weights 1:99 -- over 10,000 draws the heavy entry should be
        // chosen ~99% of the time. 4 sigma is about +/- 40 draws.
        let light = entry("light", WeeklyTier::Gold, 0, 1, 0);
        let heavy = entry("heavy", WeeklyTier::Gold, 0, 99, 0);
        let pool = vec![&light, &heavy];

        let mut rng = SmallRng::seed_from_u64(20_260_101);
        let mut heavy_count = 0u32;
        for _ in 0..10_000 {
            if weighted_pick(&pool, &mut rng).unwrap().key == "heavy" {
                heavy_count += 1;
            }
        }
        assert!(
            (9_850..=9_990).contains(&heavy_count),
            "heavy picked {heavy_count} times out of 10000"
        );
    }
}
