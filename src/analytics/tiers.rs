//! Tier constants for Pump/Expert.
//!
//! The domain defines these thresholds as exact decimal values;
//! `expectedGap`/band widths are operator-supplied constants the engine
//! is told rather than derives. The 1066 tier is pinned to the exact
//! `expectedGap=1088.0`/`normalBand=400.0` pair from a known-good worked
//! example; the remaining tiers approximate `expectedGap = threshold
//! / 0.99` (the provable-fairness house-edge constant) with band widths
//! scaled proportionally - see DESIGN.md for the derivation.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierConfig {
    pub threshold: f64,
    pub expected_gap: f64,
    pub tight_band: f64,
    pub normal_band: f64,
    pub loose_band: f64,
    pub overdue_multiplier: f64,
}

/// Fixed tier thresholds, ascending.
pub const PUMP_EXPERT_TIERS: [TierConfig; 7] = [
    TierConfig {
        threshold: 34.68,
        expected_gap: 35.03,
        tight_band: 10.0,
        normal_band: 20.0,
        loose_band: 35.0,
        overdue_multiplier: 1.5,
    },
    TierConfig {
        threshold: 73.21,
        expected_gap: 73.95,
        tight_band: 20.0,
        normal_band: 40.0,
        loose_band: 70.0,
        overdue_multiplier: 1.5,
    },
    TierConfig {
        threshold: 164.72,
        expected_gap: 166.38,
        tight_band: 45.0,
        normal_band: 90.0,
        loose_band: 160.0,
        overdue_multiplier: 1.5,
    },
    TierConfig {
        threshold: 400.02,
        expected_gap: 404.06,
        tight_band: 110.0,
        normal_band: 220.0,
        loose_band: 390.0,
        overdue_multiplier: 1.5,
    },
    TierConfig {
        threshold: 1066.73,
        expected_gap: 1088.0,
        tight_band: 300.0,
        normal_band: 400.0,
        loose_band: 700.0,
        overdue_multiplier: 1.5,
    },
    TierConfig {
        threshold: 3200.18,
        expected_gap: 3232.50,
        tight_band: 880.0,
        normal_band: 1200.0,
        loose_band: 2100.0,
        overdue_multiplier: 1.5,
    },
    TierConfig {
        threshold: 11200.65,
        expected_gap: 11313.79,
        tight_band: 3100.0,
        normal_band: 4200.0,
        loose_band: 7400.0,
        overdue_multiplier: 1.5,
    },
];

/// The two tiers the overall seed-quality grade is computed from
///.
pub const PRIMARY_TIER_THRESHOLDS: [f64; 2] = [1066.73, 3200.18];

/// Recommended last-K window for gap statistics.
pub const DEFAULT_LAST_K: usize = 10;

pub fn tier_for_threshold(threshold: f64) -> Option<TierConfig> {
    PUMP_EXPERT_TIERS
        .iter()
        .copied()
        .find(|t| t.threshold == threshold)
}
