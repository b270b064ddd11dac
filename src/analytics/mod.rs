//! Pure, deterministic cadence analytics over a window of recent rounds.
//!
//! No I/O and no caching live here: every function is a
//! total, referentially-transparent mapping from its inputs to its
//! outputs, callable identically from the Query API and from tests.

pub mod tiers;

use serde::Serialize;

use tiers::TierConfig;

/// One entry of the window the engine is given: `(nonce, roundResult)` in
/// ascending-nonce order.
#[derive(Debug, Clone, Copy)]
pub struct RoundPoint {
    pub nonce: i64,
    pub round_result: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationBand {
    Tight,
    Normal,
    Loose,
    Outside,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct GapStat {
    pub gap: i64,
    pub deviation: f64,
    pub at_nonce: i64,
    pub band: DeviationBand,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct RollingStats {
    pub median: f64,
    pub mean: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TierStats {
    pub threshold: f64,
    pub hit_nonces: Vec<i64>,
    pub last_k_gaps: Vec<GapStat>,
    pub rolling: RollingStats,
    pub current_streak: i64,
    pub consistency_percent: f64,
    pub consistency_count: usize,
    pub is_due: bool,
    pub is_overdue: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "uppercase")]
pub enum Grade {
    A,
    B,
    C,
    F,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Ride,
    Caution,
    Rotate,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeedQuality {
    pub tiers: Vec<TierStats>,
    pub grade: Grade,
    pub recommendation: Recommendation,
    pub window_size: usize,
}

/// Ascending list of nonces in `window` where `roundResult >= threshold`.
/// A plain `>=` comparison - tier thresholds are exact decimal constants,
/// never compared with tolerance.
pub fn hit_sequence(window: &[RoundPoint], threshold: f64) -> Vec<i64> {
    window
        .iter()
        .filter(|p| p.round_result >= threshold)
        .map(|p| p.nonce)
        .collect()
}

/// Differences of consecutive hit nonces, in the same order as `hits`.
pub fn gap_series(hits: &[i64]) -> Vec<i64> {
    hits.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

fn classify_band(abs_deviation: f64, tier: &TierConfig) -> DeviationBand {
    if abs_deviation <= tier.tight_band {
        DeviationBand::Tight
    } else if abs_deviation <= tier.normal_band {
        DeviationBand::Normal
    } else if abs_deviation <= tier.loose_band {
        DeviationBand::Loose
    } else {
        DeviationBand::Outside
    }
}

/// Last `k` gaps (or fewer if the series is shorter), each annotated with
/// its deviation from `tier.expected_gap` and the nonce it landed at
/// (`atNonce` is the nonce of the *second* hit in the pair - a gap is
/// the difference of two consecutive hit nonces).
pub fn last_k_gaps(hits: &[i64], tier: &TierConfig, k: usize) -> Vec<GapStat> {
    let gaps = gap_series(hits);
    let start = gaps.len().saturating_sub(k);

    gaps[start..]
        .iter()
        .zip(&hits[start + 1..])
        .map(|(&gap, &at_nonce)| {
            let deviation = gap as f64 - tier.expected_gap;
            GapStat {
                gap,
                deviation,
                at_nonce,
                band: classify_band(deviation.abs(), tier),
            }
        })
        .collect()
}

/// Median and mean of the gap magnitudes. Median is computed on the
/// sorted copy so a single out-of-range outlier cannot move it more than
/// one rank, keeping it stable; the mean is reported alongside for
/// comparison even though it is not outlier-stable.
pub fn rolling_stats(gaps: &[GapStat]) -> RollingStats {
    if gaps.is_empty() {
        return RollingStats {
            median: 0.0,
            mean: 0.0,
        };
    }

    let mut values: Vec<f64> = gaps.iter().map(|g| g.gap as f64).collect();
    values.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mid = values.len() / 2;
    let median = if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    };

    let mean = values.iter().sum::<f64>() / values.len() as f64;

    RollingStats { median, mean }
}

/// `lastObservedNonce - lastHitNonce` if a hit exists in the window, else
/// `lastObservedNonce - firstWindowNonce`. Never derived from bets
///.
pub fn current_streak(window: &[RoundPoint], hits: &[i64], last_observed_nonce: i64) -> i64 {
    match hits.last() {
        Some(&last_hit) => last_observed_nonce - last_hit,
        None => match window.first() {
            Some(first) => last_observed_nonce - first.nonce,
            None => 0,
        },
    }
}

/// `|{g : |deviation(g)| <= normalBand}| / |lastKGaps|`, as a percent.
/// Reported as 0 with `count=0` when there are no gaps.
pub fn consistency_percent(gaps: &[GapStat], tier: &TierConfig) -> (f64, usize) {
    if gaps.is_empty() {
        return (0.0, 0);
    }
    let within = gaps
        .iter()
        .filter(|g| g.deviation.abs() <= tier.normal_band)
        .count();
    ((within as f64 / gaps.len() as f64) * 100.0, gaps.len())
}

/// Computes every statistic for a single tier.
pub fn compute_tier_stats(
    window: &[RoundPoint],
    tier: &TierConfig,
    k: usize,
    last_observed_nonce: i64,
) -> TierStats {
    let hits = hit_sequence(window, tier.threshold);
    let gaps = last_k_gaps(&hits, tier, k);
    let rolling = rolling_stats(&gaps);
    let streak = current_streak(window, &hits, last_observed_nonce);
    let (consistency, count) = consistency_percent(&gaps, tier);

    let is_due = (streak as f64) >= tier.expected_gap;
    let is_overdue = (streak as f64) >= tier.overdue_multiplier * tier.expected_gap;

    TierStats {
        threshold: tier.threshold,
        hit_nonces: hits,
        last_k_gaps: gaps,
        rolling,
        current_streak: streak,
        consistency_percent: consistency,
        consistency_count: count,
        is_due,
        is_overdue,
    }
}

/// Maps the two primary tiers' consistency percentages to a grade and
/// recommendation. A tier with no gaps in its window (`count == 0`) is
/// excluded from the average rather than treated as 0, so a seed with
/// insufficient data on one primary tier is graded from the other alone -
/// the function must still be total when both are empty.
fn grade_from_consistency(primary: &[&TierStats]) -> (Grade, Recommendation) {
    let known: Vec<f64> = primary
        .iter()
        .filter(|t| t.consistency_count > 0)
        .map(|t| t.consistency_percent)
        .collect();

    let score = if known.is_empty() {
        None
    } else {
        Some(known.iter().sum::<f64>() / known.len() as f64)
    };

    match score {
        None => (Grade::C, Recommendation::Caution),
        Some(s) if s >= 85.0 => (Grade::A, Recommendation::Ride),
        Some(s) if s >= 65.0 => (Grade::B, Recommendation::Ride),
        Some(s) if s >= 40.0 => (Grade::C, Recommendation::Caution),
        Some(_) => (Grade::F, Recommendation::Rotate),
    }
}

/// Runs every configured tier over `window` and derives the overall
/// seed-quality grade from the primary tiers.
pub fn compute_seed_quality(
    window: &[RoundPoint],
    configured_tiers: &[TierConfig],
    primary_thresholds: &[f64],
    k: usize,
    last_observed_nonce: i64,
) -> SeedQuality {
    let tier_stats: Vec<TierStats> = configured_tiers
        .iter()
        .map(|tier| compute_tier_stats(window, tier, k, last_observed_nonce))
        .collect();

    let primary: Vec<&TierStats> = tier_stats
        .iter()
        .filter(|t| primary_thresholds.contains(&t.threshold))
        .collect();

    let (grade, recommendation) = grade_from_consistency(&primary);

    SeedQuality {
        tiers: tier_stats,
        grade,
        recommendation,
        window_size: window.len(),
    }
}
