//! Wildcard noise filter
//!
//! Estimates how much of an asset's transfer activity comes from bulk squad
//! resets rather than organic sentiment, and discounts it. Four indicators
//! feed the probability, plus a match against known reset rounds:
//! - **Mass transfer**: activity far above the population mean
//! - **Ownership pattern**: activity out of proportion to ownership
//! - **Timing**: rounds where resets are historically common
//! - **Team spread**: abnormal activity across many teams at once

pub mod context;

#[cfg(test)]
mod tests;

pub use context::{AggregatePattern, HistoricalMatch, WildcardContext};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::AssetMetrics;
use crate::utils::{mean, unit};

/// Indicator weights in the wildcard probability
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WildcardWeights {
    pub mass_transfer: f64,
    pub ownership_pattern: f64,
    pub timing_pattern: f64,
    pub team_spread: f64,
    pub historical_match: f64,
}

impl Default for WildcardWeights {
    fn default() -> Self {
        Self {
            mass_transfer: 0.25,
            ownership_pattern: 0.20,
            timing_pattern: 0.15,
            team_spread: 0.15,
            historical_match: 0.15,
        }
    }
}

impl WildcardWeights {
    pub fn total(&self) -> f64 {
        self.mass_transfer
            + self.ownership_pattern
            + self.timing_pattern
            + self.team_spread
            + self.historical_match
    }
}

/// Wildcard filter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WildcardConfig {
    pub weights: WildcardWeights,
    /// Activity / mean ratio at which mass-transfer strength saturates
    pub mass_ratio_ceiling: f64,
    /// Expected share of owners transferring in a normal round
    pub expected_turnover: f64,
    /// Lower bound on expected activity when computing disproportion
    pub expected_activity_floor: f64,
    /// Disproportion above 1 at which ownership-pattern strength saturates
    pub disproportion_span: f64,
    /// (minimum ownership pct, band weight), highest band first
    pub ownership_bands: Vec<(f64, f64)>,
    pub ownership_floor_weight: f64,
    pub wildcard_rounds: Vec<u32>,
    pub break_rounds: Vec<u32>,
    pub wildcard_round_strength: f64,
    pub break_round_strength: f64,
    /// An asset is "hot" when its activity exceeds this multiple of the mean
    pub spread_activity_multiple: f64,
    pub total_transfers_scale: f64,
    pub assets_affected_scale: f64,
    /// Largest share of raw transfers that may be discounted
    pub max_discount: f64,
    /// (ownership pct below, reliability), lowest band first
    pub reliability_bands: Vec<(f64, f64)>,
    pub default_reliability: f64,
}

impl Default for WildcardConfig {
    fn default() -> Self {
        Self {
            weights: WildcardWeights::default(),
            mass_ratio_ceiling: 10.0,
            expected_turnover: 0.02,
            expected_activity_floor: 100.0,
            disproportion_span: 4.0,
            ownership_bands: vec![(30.0, 1.0), (5.0, 0.8), (1.0, 0.6)],
            ownership_floor_weight: 0.5,
            wildcard_rounds: vec![1, 2, 8, 9, 16, 17, 19, 20, 24, 25, 31, 32],
            break_rounds: vec![4, 8, 12, 16, 26, 29],
            wildcard_round_strength: 0.7,
            break_round_strength: 0.4,
            spread_activity_multiple: 3.0,
            total_transfers_scale: 10_000_000.0,
            assets_affected_scale: 200.0,
            max_discount: 0.40,
            reliability_bands: vec![(1.0, 0.4), (5.0, 0.8)],
            default_reliability: 1.0,
        }
    }
}

impl WildcardConfig {
    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        let all = [
            w.mass_transfer,
            w.ownership_pattern,
            w.timing_pattern,
            w.team_spread,
            w.historical_match,
        ];
        if all.iter().any(|x| *x < 0.0) {
            return Err(Error::Config("wildcard weights must be non-negative".into()));
        }
        if w.total() > 1.0 + 1e-9 {
            return Err(Error::Config(format!(
                "wildcard weights sum to {:.3}, must be <= 1",
                w.total()
            )));
        }
        if !(0.0..=1.0).contains(&self.max_discount) {
            return Err(Error::Config("wildcard max_discount must be within [0, 1]".into()));
        }
        if self.mass_ratio_ceiling <= 1.0 || self.disproportion_span <= 0.0 {
            return Err(Error::Config("wildcard saturation bounds must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndicatorKind {
    MassTransfer,
    OwnershipPattern,
    TimingPattern,
    TeamSpread,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardIndicator {
    pub kind: IndicatorKind,
    /// 0-1
    pub strength: f64,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardAnalysis {
    pub probability: f64,
    pub valid_transfers_in: f64,
    pub valid_transfers_out: f64,
    pub valid_net_transfers: f64,
    pub confidence: f64,
    pub indicators: Vec<WildcardIndicator>,
    pub historical_match_score: f64,
}

impl WildcardAnalysis {
    pub fn strength(&self, kind: IndicatorKind) -> f64 {
        self.indicators
            .iter()
            .find(|i| i.kind == kind)
            .map(|i| i.strength)
            .unwrap_or(0.0)
    }
}

/// Per-asset wildcard analysis against a shared context
pub struct WildcardFilter {
    config: WildcardConfig,
}

impl WildcardFilter {
    pub fn new(config: WildcardConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WildcardConfig {
        &self.config
    }

    pub fn analyze(&self, asset: &AssetMetrics, ctx: &WildcardContext, population: u64) -> WildcardAnalysis {
        let cfg = &self.config;

        let mass = self.mass_transfer_strength(asset, ctx);
        let ownership = self.ownership_pattern_strength(asset, population);
        let timing = ctx.timing_strength;
        let spread = ctx.team_spread;
        let best = &ctx.best_match;

        let w = &cfg.weights;
        let probability = unit(
            w.mass_transfer * mass
                + w.ownership_pattern * ownership
                + w.timing_pattern * timing
                + w.team_spread * spread
                + w.historical_match * best.score * best.confidence,
        );

        let keep = 1.0 - probability * cfg.max_discount;
        let valid_in = asset.transfers_in as f64 * keep;
        let valid_out = asset.transfers_out as f64 * keep;

        let signal = mean(&[mass, ownership, timing, spread, best.confidence]).unwrap_or(0.0);
        let confidence = unit(0.5 * signal + 0.5 * self.data_reliability(asset.ownership_pct));

        let mut indicators = Vec::new();
        if mass > 0.0 {
            indicators.push(WildcardIndicator {
                kind: IndicatorKind::MassTransfer,
                strength: mass,
                description: format!(
                    "Activity {:.1}x the population mean",
                    asset.total_activity() as f64 / ctx.mean_activity
                ),
            });
        }
        if ownership > 0.0 {
            indicators.push(WildcardIndicator {
                kind: IndicatorKind::OwnershipPattern,
                strength: ownership,
                description: format!(
                    "Activity out of proportion to {:.1}% ownership",
                    asset.ownership_pct
                ),
            });
        }
        if timing > 0.0 {
            indicators.push(WildcardIndicator {
                kind: IndicatorKind::TimingPattern,
                strength: timing,
                description: format!("Round {} is a common reset window", ctx.gameweek),
            });
        }
        if spread > 0.0 {
            indicators.push(WildcardIndicator {
                kind: IndicatorKind::TeamSpread,
                strength: spread,
                description: format!("Abnormal activity across {:.0}% of teams", spread * 100.0),
            });
        }

        WildcardAnalysis {
            probability,
            valid_transfers_in: valid_in,
            valid_transfers_out: valid_out,
            valid_net_transfers: valid_in - valid_out,
            confidence,
            indicators,
            historical_match_score: best.score,
        }
    }

    pub fn mass_transfer_strength(&self, asset: &AssetMetrics, ctx: &WildcardContext) -> f64 {
        let ratio = asset.total_activity() as f64 / ctx.mean_activity.max(1.0);
        unit((ratio - 1.0) / (self.config.mass_ratio_ceiling - 1.0))
    }

    pub fn ownership_pattern_strength(&self, asset: &AssetMetrics, population: u64) -> f64 {
        let cfg = &self.config;
        let expected = asset.ownership_fraction() * population as f64 * cfg.expected_turnover;
        let disproportion = asset.total_activity() as f64 / expected.max(cfg.expected_activity_floor);

        let band_weight = cfg
            .ownership_bands
            .iter()
            .find(|(min, _)| asset.ownership_pct >= *min)
            .map(|(_, weight)| *weight)
            .unwrap_or(cfg.ownership_floor_weight);

        band_weight * unit((disproportion - 1.0) / cfg.disproportion_span)
    }

    /// Thinly held assets give a noisier read
    pub fn data_reliability(&self, ownership_pct: f64) -> f64 {
        self.config
            .reliability_bands
            .iter()
            .find(|(below, _)| ownership_pct < *below)
            .map(|(_, reliability)| *reliability)
            .unwrap_or(self.config.default_reliability)
    }
}
