//! Near-term transfer forecast
//!
//! Hand-tuned heuristics over an asset's recent trend arrays:
//! - Predicted 24h transfers in/out from ownership-derived baselines
//! - Carryover of transfer intent into the next round
//! - A threshold adjustment factor with human-readable reasons
//! - The window in which activity is expected to peak

pub mod features;


pub use features::{ForecastFeatures, PositionStats};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::data::HistoryProvider;
use crate::error::{Error, Result};
use crate::types::AssetMetrics;
use crate::utils::{mean, signed_unit, unit};

/// Feature weights in the inflow/outflow adjustments
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureWeights {
    pub ownership_momentum: f64,
    pub form_trend: f64,
    pub fixture_appeal: f64,
    pub price_value_gap: f64,
    pub performance_deviation: f64,
    pub population_sentiment: f64,
}

impl Default for FeatureWeights {
    fn default() -> Self {
        Self {
            ownership_momentum: 0.30,
            form_trend: 0.20,
            fixture_appeal: 0.15,
            price_value_gap: 0.15,
            performance_deviation: 0.10,
            population_sentiment: 0.10,
        }
    }
}

/// Forecast model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    pub weights: FeatureWeights,
    /// Daily share of non-owners expected to buy
    pub inflow_rate: f64,
    /// Daily share of owners expected to sell
    pub outflow_rate: f64,
    pub min_adjustment: f64,
    pub max_adjustment: f64,
    pub early_season_until: u32,
    pub late_season_from: u32,
    pub early_season_multiplier: f64,
    pub late_season_multiplier: f64,
    pub points_scale: f64,
    pub fixture_window: usize,
    pub neutral_difficulty: f64,
    pub carryover_time_weight: f64,
    pub carryover_volume_weight: f64,
    pub carryover_wildcard_weight: f64,
    pub carryover_baseline_weight: f64,
    /// Time band below `carryover_urgent_hours` to the deadline
    pub carryover_urgent_hours: f64,
    pub carryover_urgent: f64,
    /// Time band below `carryover_near_hours`; `carryover_distant` beyond
    pub carryover_near_hours: f64,
    pub carryover_near: f64,
    pub carryover_distant: f64,
    /// Volume term per unit of volume ratio
    pub carryover_volume_scale: f64,
    pub max_volume_ratio: f64,
    /// Weight of population wildcard incidence in the carryover wildcard
    /// term; the asset's own wildcard probability takes the rest
    pub wildcard_incidence_share: f64,
    pub default_carryover_baseline: f64,
    pub min_carryover: f64,
    pub max_carryover: f64,
    /// Share of current activity that is net in one direction
    pub high_velocity: f64,
    pub momentum_trigger: f64,
    pub form_trigger: f64,
    pub fixture_swing_trigger: f64,
    pub velocity_factor: f64,
    pub tightening_factor: f64,
    pub loosening_factor: f64,
    pub min_threshold_adjustment: f64,
    pub max_threshold_adjustment: f64,
    pub evening_momentum: f64,
    /// Inside this many hours activity peaks before the deadline
    pub pre_deadline_hours: f64,
    pub base_uncertainty: f64,
    /// Ownership above this, or below `extreme_ownership_low_pct`, is less predictable
    pub extreme_ownership_high_pct: f64,
    pub extreme_ownership_low_pct: f64,
    pub extreme_ownership_uncertainty: f64,
    pub thin_history_uncertainty: f64,
    pub thin_population_uncertainty: f64,
    pub min_history_rounds: usize,
    pub max_uncertainty: f64,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            weights: FeatureWeights::default(),
            inflow_rate: 0.002,
            outflow_rate: 0.001,
            min_adjustment: 0.2,
            max_adjustment: 3.0,
            early_season_until: 10,
            late_season_from: 30,
            early_season_multiplier: 1.2,
            late_season_multiplier: 0.85,
            points_scale: 5.0,
            fixture_window: 3,
            neutral_difficulty: 3.0,
            carryover_time_weight: 0.4,
            carryover_volume_weight: 0.2,
            carryover_wildcard_weight: 0.2,
            carryover_baseline_weight: 0.2,
            carryover_urgent_hours: 24.0,
            carryover_urgent: 0.35,
            carryover_near_hours: 72.0,
            carryover_near: 0.25,
            carryover_distant: 0.15,
            carryover_volume_scale: 0.1,
            max_volume_ratio: 2.0,
            wildcard_incidence_share: 0.5,
            default_carryover_baseline: 0.2,
            min_carryover: 0.05,
            max_carryover: 0.45,
            high_velocity: 0.5,
            momentum_trigger: 0.5,
            form_trigger: 0.5,
            fixture_swing_trigger: 1.0,
            velocity_factor: 0.90,
            tightening_factor: 0.95,
            loosening_factor: 1.05,
            min_threshold_adjustment: 0.7,
            max_threshold_adjustment: 1.3,
            evening_momentum: 0.25,
            pre_deadline_hours: 24.0,
            base_uncertainty: 0.15,
            extreme_ownership_high_pct: 50.0,
            extreme_ownership_low_pct: 1.0,
            extreme_ownership_uncertainty: 0.15,
            thin_history_uncertainty: 0.10,
            thin_population_uncertainty: 0.05,
            min_history_rounds: 3,
            max_uncertainty: 0.5,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_adjustment <= 0.0 || self.min_adjustment > self.max_adjustment {
            return Err(Error::Config("forecast adjustment bounds are inverted".into()));
        }
        if self.min_carryover > self.max_carryover {
            return Err(Error::Config("forecast carryover bounds are inverted".into()));
        }
        if self.min_threshold_adjustment <= 0.0
            || self.min_threshold_adjustment > self.max_threshold_adjustment
        {
            return Err(Error::Config("forecast threshold adjustment bounds are inverted".into()));
        }
        if self.early_season_until >= self.late_season_from {
            return Err(Error::Config("early season must end before late season starts".into()));
        }
        if self.carryover_urgent_hours > self.carryover_near_hours {
            return Err(Error::Config("forecast carryover time bands are inverted".into()));
        }
        if !(0.0..=1.0).contains(&self.wildcard_incidence_share) {
            return Err(Error::Config("forecast.wildcard_incidence_share must be within [0, 1]".into()));
        }
        if self.extreme_ownership_low_pct > self.extreme_ownership_high_pct {
            return Err(Error::Config("forecast extreme ownership cutoffs are inverted".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeakWindow {
    PreDeadline,
    Next6Hours,
    EveningSurge,
    Steady,
}

impl PeakWindow {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeakWindow::PreDeadline => "pre_deadline",
            PeakWindow::Next6Hours => "next_6_hours",
            PeakWindow::EveningSurge => "evening_surge",
            PeakWindow::Steady => "steady",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastOutput {
    pub predicted_transfers_in: f64,
    pub predicted_transfers_out: f64,
    pub predicted_net: f64,
    /// 0-0.5
    pub uncertainty: f64,
    /// 0.7-1.3; below 1 means the asset should move sooner
    pub threshold_adjustment: f64,
    pub adjustment_reasons: Vec<String>,
    /// 0.05-0.45
    pub carryover: f64,
    pub peak_window: PeakWindow,
    pub features: ForecastFeatures,
}

/// Population-level forecast inputs, built once per cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastContext {
    pub population_sentiment: f64,
    /// Current aggregate volume over the historical average
    pub volume_ratio: f64,
    pub positions: HashMap<u32, PositionStats>,
    pub wildcard_incidence: f64,
    /// Typical carryover for this round
    pub carryover_baseline: f64,
    /// Rounds of population volume history available
    pub history_depth: usize,
}

impl ForecastContext {
    pub fn build(
        assets: &[AssetMetrics],
        gameweek: u32,
        history: &dyn HistoryProvider,
        config: &ForecastConfig,
    ) -> Self {
        let volumes = history.population_volume_history();
        let current: f64 = assets.iter().map(|a| a.total_activity() as f64).sum();

        let volume_ratio = match mean(&volumes) {
            Some(avg) if avg > 0.0 => current / avg,
            _ => 1.0,
        };

        Self {
            population_sentiment: signed_unit(volume_ratio - 1.0),
            volume_ratio,
            positions: features::position_stats(assets),
            wildcard_incidence: 0.0,
            carryover_baseline: history
                .carryover_baseline(gameweek)
                .unwrap_or(config.default_carryover_baseline),
            history_depth: volumes.len(),
        }
    }

    /// Population-level estimate of how much of this round is reset activity
    pub fn with_wildcard_incidence(mut self, incidence: f64) -> Self {
        self.wildcard_incidence = unit(incidence);
        self
    }
}

pub struct ForecastModel {
    config: ForecastConfig,
}

impl ForecastModel {
    pub fn new(config: ForecastConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn extract_features(&self, asset: &AssetMetrics, ctx: &ForecastContext) -> ForecastFeatures {
        let cfg = &self.config;
        let stats = ctx.positions.get(&asset.position_id);
        ForecastFeatures {
            ownership_momentum: features::ownership_momentum(asset),
            form_trend: features::form_trend(asset, cfg.points_scale),
            fixture_appeal: features::fixture_appeal(asset, cfg.fixture_window, cfg.neutral_difficulty),
            price_value_gap: features::price_value_gap(asset, stats),
            performance_deviation: features::performance_deviation(asset, stats),
            population_sentiment: ctx.population_sentiment,
        }
    }

    pub fn forecast(
        &self,
        asset: &AssetMetrics,
        ctx: &ForecastContext,
        gameweek: u32,
        hours_to_deadline: f64,
        population: u64,
        wildcard_probability: f64,
    ) -> ForecastOutput {
        let cfg = &self.config;
        let f = self.extract_features(asset, ctx);
        let w = &cfg.weights;

        let owners = asset.ownership_fraction() * population as f64;
        let non_owners = (population as f64 - owners).max(0.0);

        let asset_signal = w.ownership_momentum * f.ownership_momentum
            + w.form_trend * f.form_trend
            + w.fixture_appeal * f.fixture_appeal
            + w.price_value_gap * f.price_value_gap
            + w.performance_deviation * f.performance_deviation;
        let sentiment = w.population_sentiment * f.population_sentiment;

        let in_adjustment = (1.0 + asset_signal + sentiment).clamp(cfg.min_adjustment, cfg.max_adjustment);
        let out_adjustment = (1.0 - asset_signal + sentiment).clamp(cfg.min_adjustment, cfg.max_adjustment);
        let phase = self.season_phase_multiplier(gameweek);

        let predicted_in = non_owners * cfg.inflow_rate * in_adjustment * phase;
        let predicted_out = owners * cfg.outflow_rate * out_adjustment * phase;

        let wildcard_term = cfg.wildcard_incidence_share * ctx.wildcard_incidence
            + (1.0 - cfg.wildcard_incidence_share) * unit(wildcard_probability);
        let (threshold_adjustment, reasons) = self.threshold_adjustment(asset, &f);

        ForecastOutput {
            predicted_transfers_in: predicted_in,
            predicted_transfers_out: predicted_out,
            predicted_net: predicted_in - predicted_out,
            uncertainty: self.uncertainty(asset, ctx),
            threshold_adjustment,
            adjustment_reasons: reasons,
            carryover: self.carryover(hours_to_deadline, ctx, wildcard_term),
            peak_window: self.peak_window(asset, &f, hours_to_deadline),
            features: f,
        }
    }

    pub fn season_phase_multiplier(&self, gameweek: u32) -> f64 {
        let cfg = &self.config;
        if gameweek <= cfg.early_season_until {
            cfg.early_season_multiplier
        } else if gameweek >= cfg.late_season_from {
            cfg.late_season_multiplier
        } else {
            1.0
        }
    }

    /// Share of this round's transfer intent expected to spill into the next
    pub fn carryover(&self, hours_to_deadline: f64, ctx: &ForecastContext, wildcard_term: f64) -> f64 {
        let cfg = &self.config;
        let time_band = if hours_to_deadline < cfg.carryover_urgent_hours {
            cfg.carryover_urgent
        } else if hours_to_deadline < cfg.carryover_near_hours {
            cfg.carryover_near
        } else {
            cfg.carryover_distant
        };
        let volume_term = cfg.carryover_volume_scale * ctx.volume_ratio.clamp(0.0, cfg.max_volume_ratio);

        (cfg.carryover_time_weight * time_band
            + cfg.carryover_volume_weight * volume_term
            + cfg.carryover_wildcard_weight * wildcard_term
            + cfg.carryover_baseline_weight * ctx.carryover_baseline)
            .clamp(cfg.min_carryover, cfg.max_carryover)
    }

    /// Velocity, momentum, form and fixture swings nudge the effective threshold
    pub fn threshold_adjustment(&self, asset: &AssetMetrics, f: &ForecastFeatures) -> (f64, Vec<String>) {
        let cfg = &self.config;
        let mut factor = 1.0;
        let mut reasons = Vec::new();

        if self.velocity(asset) > cfg.high_velocity {
            factor *= cfg.velocity_factor;
            reasons.push("High transfer velocity".to_string());
        }

        if f.ownership_momentum > cfg.momentum_trigger {
            factor *= cfg.tightening_factor;
            reasons.push("Strong ownership momentum".to_string());
        } else if f.ownership_momentum < -cfg.momentum_trigger {
            factor *= cfg.loosening_factor;
            reasons.push("Negative ownership momentum".to_string());
        }

        if f.form_trend > cfg.form_trigger {
            factor *= cfg.tightening_factor;
            reasons.push("Improving form".to_string());
        } else if f.form_trend < -cfg.form_trigger {
            factor *= cfg.loosening_factor;
            reasons.push("Declining form".to_string());
        }

        let swing = features::fixture_swing(asset, cfg.fixture_window);
        if swing > cfg.fixture_swing_trigger {
            factor *= cfg.tightening_factor;
            reasons.push("Favourable fixture swing".to_string());
        } else if swing < -cfg.fixture_swing_trigger {
            factor *= cfg.loosening_factor;
            reasons.push("Difficult fixture swing".to_string());
        }

        (
            factor.clamp(cfg.min_threshold_adjustment, cfg.max_threshold_adjustment),
            reasons,
        )
    }

    /// Share of this window's activity that is net in one direction
    fn velocity(&self, asset: &AssetMetrics) -> f64 {
        let total = asset.total_activity();
        if total == 0 {
            return 0.0;
        }
        asset.net_transfers().unsigned_abs() as f64 / total as f64
    }

    fn peak_window(&self, asset: &AssetMetrics, f: &ForecastFeatures, hours_to_deadline: f64) -> PeakWindow {
        if hours_to_deadline < self.config.pre_deadline_hours {
            PeakWindow::PreDeadline
        } else if self.velocity(asset) > self.config.high_velocity {
            PeakWindow::Next6Hours
        } else if f.ownership_momentum > self.config.evening_momentum {
            PeakWindow::EveningSurge
        } else {
            PeakWindow::Steady
        }
    }

    fn uncertainty(&self, asset: &AssetMetrics, ctx: &ForecastContext) -> f64 {
        let cfg = &self.config;
        let mut uncertainty = cfg.base_uncertainty;

        if asset.ownership_pct > cfg.extreme_ownership_high_pct
            || asset.ownership_pct < cfg.extreme_ownership_low_pct
        {
            uncertainty += cfg.extreme_ownership_uncertainty;
        }
        if asset.history.depth() < cfg.min_history_rounds {
            uncertainty += cfg.thin_history_uncertainty;
        }
        if ctx.history_depth < cfg.min_history_rounds {
            uncertainty += cfg.thin_population_uncertainty;
        }

        uncertainty.min(cfg.max_uncertainty)
    }
}
