//! Dynamic price change thresholds
//!
//! Estimates the net transfers an asset needs before its price moves.
//! Base thresholds scale with ownership; six independent multipliers then
//! adjust them:
//! - **Decay**: thresholds loosen as the season progresses
//! - **Ownership**: widely held assets need more movement
//! - **Form**: in-form assets rise with less pressure
//! - **Price tier**: premium assets are stickier
//! - **Flag**: flagged assets fall more easily
//! - **Special**: marquee assets are dampened


use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::flags::FlagMultipliers;
use crate::types::{AssetMetrics, PriceTier};

/// Decides whether an asset gets special-asset treatment
pub trait SpecialAssetRule: Send + Sync {
    fn is_special(&self, asset: &AssetMetrics) -> bool;
}

/// Cutoffs for the default special-asset rule.
///
/// These are rough and should be recalibrated against observed price moves.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialAssetConfig {
    pub min_ownership_pct: f64,
    pub min_cost: Decimal,
    pub min_total_points: i32,
}

impl Default for SpecialAssetConfig {
    fn default() -> Self {
        Self {
            min_ownership_pct: 30.0,
            min_cost: dec!(10.0),
            min_total_points: 150,
        }
    }
}

/// Special when flagged upstream, widely held and expensive, or a season standout
#[derive(Debug, Clone, Default)]
pub struct OwnershipCostRule {
    config: SpecialAssetConfig,
}

impl OwnershipCostRule {
    pub fn new(config: SpecialAssetConfig) -> Self {
        Self { config }
    }
}

impl SpecialAssetRule for OwnershipCostRule {
    fn is_special(&self, asset: &AssetMetrics) -> bool {
        asset.special
            || (asset.ownership_pct >= self.config.min_ownership_pct
                && asset.cost >= self.config.min_cost)
            || asset.total_points >= self.config.min_total_points
    }
}

/// Multiplier per price tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TierMultipliers {
    pub budget: f64,
    pub mid: f64,
    pub premium: f64,
}

impl Default for TierMultipliers {
    fn default() -> Self {
        Self {
            budget: 0.90,
            mid: 1.00,
            premium: 1.15,
        }
    }
}

impl TierMultipliers {
    pub fn for_tier(&self, tier: PriceTier) -> f64 {
        match tier {
            PriceTier::Budget => self.budget,
            PriceTier::Mid => self.mid,
            PriceTier::Premium => self.premium,
        }
    }
}

/// Threshold calculator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Multiplier on sqrt(owners) for the base rise threshold
    pub rise_base_multiplier: f64,
    /// Share of owners that must sell for the base fall threshold
    pub fall_base_fraction: f64,
    /// Floor for every threshold
    pub min_threshold: f64,
    pub decay_per_round: f64,
    pub decay_floor: f64,
    /// (minimum ownership pct, multiplier), highest band first
    pub ownership_bands: Vec<(f64, f64)>,
    pub ownership_floor_multiplier: f64,
    pub form_sensitivity: f64,
    pub form_min_multiplier: f64,
    pub form_max_multiplier: f64,
    pub tier_multipliers: TierMultipliers,
    pub special_multiplier: f64,
    pub base_confidence: f64,
    pub special_penalty: f64,
    pub flagged_penalty: f64,
    pub extreme_ownership_penalty: f64,
    pub extreme_ownership_high_pct: f64,
    pub extreme_ownership_low_pct: f64,
    pub neutral_form_bonus: f64,
    /// Form multipliers within this distance of 1.0 count as neutral
    pub neutral_form_tolerance: f64,
    pub special: SpecialAssetConfig,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            rise_base_multiplier: 45.0,
            fall_base_fraction: 0.04,
            min_threshold: 1_000.0,
            decay_per_round: 0.008,
            decay_floor: 0.7,
            ownership_bands: vec![(40.0, 1.30), (20.0, 1.15), (10.0, 1.00), (5.0, 0.95), (1.0, 0.90)],
            ownership_floor_multiplier: 0.85,
            form_sensitivity: 0.05,
            form_min_multiplier: 0.8,
            form_max_multiplier: 1.2,
            tier_multipliers: TierMultipliers::default(),
            special_multiplier: 1.2,
            base_confidence: 0.85,
            special_penalty: 0.10,
            flagged_penalty: 0.10,
            extreme_ownership_penalty: 0.10,
            extreme_ownership_high_pct: 40.0,
            extreme_ownership_low_pct: 1.0,
            neutral_form_bonus: 0.05,
            neutral_form_tolerance: 0.05,
            special: SpecialAssetConfig::default(),
        }
    }
}

/// The six independent threshold multipliers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ThresholdMultipliers {
    pub decay: f64,
    pub ownership: f64,
    pub form: f64,
    pub price_tier: f64,
    pub flag: f64,
    pub special: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdResult {
    pub base_rise_threshold: f64,
    pub base_fall_threshold: f64,
    pub multipliers: ThresholdMultipliers,
    pub adjusted_rise_threshold: f64,
    pub adjusted_fall_threshold: f64,
    pub special: bool,
    pub confidence: f64,
}

/// Computes base and adjusted rise/fall thresholds per asset
pub struct ThresholdCalculator {
    config: ThresholdConfig,
    /// Shared with the flag tracker; the fall threshold applies it
    flag_multipliers: FlagMultipliers,
    special_rule: Arc<dyn SpecialAssetRule>,
}

impl ThresholdCalculator {
    pub fn new(config: ThresholdConfig) -> Self {
        let special_rule = Arc::new(OwnershipCostRule::new(config.special.clone()));
        Self {
            config,
            flag_multipliers: FlagMultipliers::default(),
            special_rule,
        }
    }

    /// Use the flag tracker's multiplier table
    pub fn with_flag_multipliers(mut self, multipliers: FlagMultipliers) -> Self {
        self.flag_multipliers = multipliers;
        self
    }

    /// Replace the special-asset predicate
    pub fn with_special_rule(mut self, rule: Arc<dyn SpecialAssetRule>) -> Self {
        self.special_rule = rule;
        self
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn is_special(&self, asset: &AssetMetrics) -> bool {
        self.special_rule.is_special(asset)
    }

    pub fn calculate(
        &self,
        asset: &AssetMetrics,
        gameweek: u32,
        population: u64,
        population_mean_form: f64,
    ) -> Result<ThresholdResult> {
        let ownership_pct = asset.ownership_pct;
        if !ownership_pct.is_finite() || !(0.0..=100.0).contains(&ownership_pct) {
            return Err(Error::validation(
                asset.id,
                format!("ownership {} outside [0, 100]", ownership_pct),
            ));
        }

        let cfg = &self.config;
        let owners = asset.ownership_fraction() * population as f64;

        let base_rise = (owners.sqrt() * cfg.rise_base_multiplier).max(cfg.min_threshold);
        let base_fall = (owners * cfg.fall_base_fraction).max(cfg.min_threshold);

        let special = self.is_special(asset);
        let multipliers = ThresholdMultipliers {
            decay: self.decay_multiplier(gameweek),
            ownership: self.ownership_multiplier(ownership_pct),
            form: self.form_multiplier(asset.form, population_mean_form),
            price_tier: cfg.tier_multipliers.for_tier(asset.price_tier),
            flag: self.flag_multipliers.for_flag(asset.status),
            special: if special { cfg.special_multiplier } else { 1.0 },
        };

        let m = &multipliers;
        let adjusted_rise = (base_rise * m.decay * m.ownership * m.form * m.price_tier * m.special)
            .max(f64::MIN_POSITIVE);
        let adjusted_fall = (base_fall * m.flag * m.ownership * m.price_tier * m.special)
            .max(f64::MIN_POSITIVE);

        let confidence = self.confidence(asset, special, m.form);

        Ok(ThresholdResult {
            base_rise_threshold: base_rise,
            base_fall_threshold: base_fall,
            multipliers,
            adjusted_rise_threshold: adjusted_rise,
            adjusted_fall_threshold: adjusted_fall,
            special,
            confidence,
        })
    }

    /// Thresholds loosen by a fixed step per round, down to a floor
    pub fn decay_multiplier(&self, gameweek: u32) -> f64 {
        let rounds_played = gameweek.saturating_sub(1) as f64;
        (1.0 - self.config.decay_per_round * rounds_played).max(self.config.decay_floor)
    }

    pub fn ownership_multiplier(&self, ownership_pct: f64) -> f64 {
        self.config
            .ownership_bands
            .iter()
            .find(|(min, _)| ownership_pct >= *min)
            .map(|(_, multiplier)| *multiplier)
            .unwrap_or(self.config.ownership_floor_multiplier)
    }

    /// Above-average form lowers the rise threshold
    pub fn form_multiplier(&self, form: f64, mean_form: f64) -> f64 {
        let cfg = &self.config;
        (1.0 - cfg.form_sensitivity * (form - mean_form))
            .clamp(cfg.form_min_multiplier, cfg.form_max_multiplier)
    }

    fn confidence(&self, asset: &AssetMetrics, special: bool, form_multiplier: f64) -> f64 {
        let cfg = &self.config;
        let mut confidence = cfg.base_confidence;

        if special {
            confidence -= cfg.special_penalty;
        }
        if asset.status.is_flagged() {
            confidence -= cfg.flagged_penalty;
        }
        if asset.ownership_pct > cfg.extreme_ownership_high_pct
            || asset.ownership_pct < cfg.extreme_ownership_low_pct
        {
            confidence -= cfg.extreme_ownership_penalty;
        }
        if (form_multiplier - 1.0).abs() <= cfg.neutral_form_tolerance {
            confidence += cfg.neutral_form_bonus;
        }

        confidence.clamp(0.5, 1.0)
    }
}
