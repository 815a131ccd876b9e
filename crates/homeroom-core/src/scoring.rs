//! Weekly bucket scoring and tier resolution.
//!
//! Each of the three weekly signals (attendance, assignments, daily
//! care) is an optional bucket: a bucket whose denominator is zero for
//! the week is excluded from scoring entirely rather than scored as
//! zero. Present buckets map their raw ratio to a 0-100 point score
//! through a configured monotonic band curve, and the weighted sum of
//! present buckets yields the weekly percentage.
//!
//! All ratio math uses [`Decimal`] -- no floating point.

use homeroom_types::{SignalBucket, WeeklyTier};
use rust_decimal::Decimal;

use crate::config::{CurveConfig, TierRule};

/// The score of one present bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketScore {
    /// Which bucket this is.
    pub bucket: SignalBucket,
    /// Points earned (0 to `available`).
    pub points: u32,
    /// Points this bucket contributes to the available total.
    pub available: u32,
}

/// Score one bucket from its raw counts.
///
/// Returns `None` when `eligible` is zero -- the bucket had no
/// denominator this week and is excluded from scoring. The earned
/// count is clamped to the eligible count before the ratio is taken.
pub fn score_bucket(
    bucket: SignalBucket,
    earned: u32,
    eligible: u32,
    curve: &CurveConfig,
) -> Option<BucketScore> {
    if eligible == 0 {
        return None;
    }

    let ratio = Decimal::from(earned.min(eligible))
        .checked_div(Decimal::from(eligible))
        .unwrap_or(Decimal::ZERO);

    // The highest matching band wins; bands are monotonic so this is
    // order-independent.
    let points = curve
        .bands
        .iter()
        .filter(|band| band.min_ratio <= ratio)
        .map(|band| band.points)
        .max()
        .unwrap_or(0);

    Some(BucketScore {
        bucket,
        points: points.min(curve.available_points),
        available: curve.available_points,
    })
}

/// Aggregate present bucket scores into a weekly percentage.
///
/// `sum(points) / sum(available) * 100`, or `None` when no bucket is
/// present (the percentage is undefined, not zero).
pub fn weekly_pct(scores: &[BucketScore]) -> Option<Decimal> {
    if scores.is_empty() {
        return None;
    }

    let earned = scores
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.points));
    let available = scores
        .iter()
        .fold(0u32, |acc, s| acc.saturating_add(s.available));
    if available == 0 {
        return None;
    }

    Decimal::from(earned)
        .checked_div(Decimal::from(available))
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
}

/// Resolve the weekly tier from the percentage and the number of
/// present buckets.
///
/// Total function: an undefined percentage (zero present buckets) or a
/// rule table with no match resolves to the lowest tier. Rules are
/// evaluated in order, so the table lists the highest tier first.
pub fn resolve_tier(pct: Option<Decimal>, present_buckets: usize, rules: &[TierRule]) -> WeeklyTier {
    let Some(pct) = pct else {
        return WeeklyTier::LOWEST;
    };

    rules
        .iter()
        .find(|rule| pct >= Decimal::from(rule.min_pct) && present_buckets >= rule.min_buckets)
        .map_or(WeeklyTier::LOWEST, |rule| rule.tier)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{BucketCurves, CurveBand, WeeklyConfig};
    use rust_decimal_macros::dec;

    fn curves() -> BucketCurves {
        BucketCurves::default()
    }

    fn rules() -> Vec<TierRule> {
        WeeklyConfig::default().tiers
    }

    #[test]
    fn zero_denominator_excludes_the_bucket() {
        let score = score_bucket(SignalBucket::Attendance, 0, 0, &curves().attendance);
        assert_eq!(score, None);
    }

    #[test]
    fn full_ratio_earns_full_points() {
        let score = score_bucket(SignalBucket::Attendance, 5, 5, &curves().attendance).unwrap();
        assert_eq!(score.points, 100);
        assert_eq!(score.available, 100);
    }

    #[test]
    fn earned_is_clamped_to_eligible() {
        // 7 of 5 (data glitch upstream) scores as 5 of 5, not >100%.
        let score = score_bucket(SignalBucket::Care, 7, 5, &curves().care).unwrap();
        assert_eq!(score.points, 100);
    }

    #[test]
    fn band_curve_is_monotonic_in_ratio() {
        let curve = &curves().assignment;
        let mut last = 0;
        for earned in 0..=10u32 {
            let score = score_bucket(SignalBucket::Assignment, earned, 10, curve).unwrap();
            assert!(score.points >= last, "points dropped at {earned}/10");
            last = score.points;
        }
    }

    #[test]
    fn custom_band_boundaries_are_inclusive() {
        let curve = CurveConfig {
            available_points: 100,
            bands: vec![
                CurveBand {
                    min_ratio: dec!(0),
                    points: 10,
                },
                CurveBand {
                    min_ratio: dec!(0.5),
                    points: 60,
                },
            ],
        };
        let at_half = score_bucket(SignalBucket::Care, 1, 2, &curve).unwrap();
        assert_eq!(at_half.points, 60);
        let below_half = score_bucket(SignalBucket::Care, 49, 100, &curve).unwrap();
        assert_eq!(below_half.points, 10);
    }

    #[test]
    fn weekly_pct_of_no_buckets_is_undefined() {
        assert_eq!(weekly_pct(&[]), None);
    }

    #[test]
    fn weekly_pct_averages_present_buckets() {
        let scores = [
            BucketScore {
                bucket: SignalBucket::Attendance,
                points: 80,
                available: 100,
            },
            BucketScore {
                bucket: SignalBucket::Care,
                points: 40,
                available: 100,
            },
        ];
        assert_eq!(weekly_pct(&scores), Some(dec!(60)));
    }

    #[test]
    fn zero_buckets_resolves_to_lowest_tier() {
        assert_eq!(resolve_tier(None, 0, &rules()), WeeklyTier::Bronze);
    }

    #[test]
    fn all_buckets_at_full_resolves_to_top_tier() {
        assert_eq!(
            resolve_tier(Some(dec!(100)), 3, &rules()),
            WeeklyTier::Platinum
        );
    }

    #[test]
    fn single_strong_bucket_cannot_reach_top_tier() {
        // 100% from one bucket: capped below Gold/Platinum by
        // min_buckets, lands on Silver.
        assert_eq!(
            resolve_tier(Some(dec!(100)), 1, &rules()),
            WeeklyTier::Silver
        );
    }

    #[test]
    fn two_buckets_at_high_pct_reach_gold_not_platinum() {
        assert_eq!(resolve_tier(Some(dec!(92)), 2, &rules()), WeeklyTier::Gold);
    }

    #[test]
    fn low_pct_resolves_to_bronze() {
        assert_eq!(resolve_tier(Some(dec!(10)), 3, &rules()), WeeklyTier::Bronze);
    }
}
