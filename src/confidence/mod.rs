//! Confidence scoring
//!
//! Fuses the outputs of the threshold, wildcard, flag and forecast stages
//! into a single weighted confidence:
//! - Ten independent factor scores, each clamped to [0, 1]
//! - A fixed-weight overall score mapped to a tier
//! - Ordered risk factors and a decision-table recommendation


use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::AssetMetrics;
use crate::utils::{mean, std_dev, unit};

/// Weight per factor; must sum to 1.0
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceWeights {
    pub transfer_volume: f64,
    pub ownership_stability: f64,
    pub form_consistency: f64,
    pub flag_status: f64,
    pub historical_model_accuracy: f64,
    pub wildcard_detection: f64,
    pub threshold_calculation: f64,
    pub data_quality: f64,
    pub market_condition: f64,
    pub timing: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            transfer_volume: 0.20,
            ownership_stability: 0.10,
            form_consistency: 0.08,
            flag_status: 0.12,
            historical_model_accuracy: 0.10,
            wildcard_detection: 0.12,
            threshold_calculation: 0.10,
            data_quality: 0.08,
            market_condition: 0.05,
            timing: 0.05,
        }
    }
}

impl ConfidenceWeights {
    pub fn total(&self) -> f64 {
        self.transfer_volume
            + self.ownership_stability
            + self.form_consistency
            + self.flag_status
            + self.historical_model_accuracy
            + self.wildcard_detection
            + self.threshold_calculation
            + self.data_quality
            + self.market_condition
            + self.timing
    }
}

/// Factor score below which a risk string is emitted
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    pub transfer_volume: f64,
    pub ownership_stability: f64,
    pub form_consistency: f64,
    pub flag_status: f64,
    pub wildcard_detection: f64,
    pub threshold_calculation: f64,
    pub data_quality: f64,
    pub market_condition: f64,
    pub timing: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            transfer_volume: 0.6,
            ownership_stability: 0.6,
            form_consistency: 0.5,
            flag_status: 0.7,
            wildcard_detection: 0.5,
            threshold_calculation: 0.7,
            data_quality: 0.6,
            market_condition: 0.6,
            timing: 0.6,
        }
    }
}

/// One row of the reliability decision table
///
/// Keys missing from a row fall back to the loosest band.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecisionBand {
    pub min_overall: f64,
    pub min_distance: f64,
    pub max_risks: usize,
}

impl Default for DecisionBand {
    fn default() -> Self {
        Self {
            min_overall: 0.50,
            min_distance: 0.0,
            max_risks: 3,
        }
    }
}

/// Ownership-stability score by ownership percentage
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityBands {
    /// Above this the base is crowded and prone to sell-offs
    pub crowded_above_pct: f64,
    pub crowded: f64,
    pub core_from_pct: f64,
    pub core: f64,
    pub niche_from_pct: f64,
    pub niche: f64,
    /// Below `niche_from_pct`
    pub thin: f64,
}

impl Default for StabilityBands {
    fn default() -> Self {
        Self {
            crowded_above_pct: 40.0,
            crowded: 0.75,
            core_from_pct: 5.0,
            core: 0.9,
            niche_from_pct: 1.0,
            niche: 0.7,
            thin: 0.5,
        }
    }
}

impl StabilityBands {
    pub fn score(&self, ownership_pct: f64) -> f64 {
        if ownership_pct > self.crowded_above_pct {
            self.crowded
        } else if ownership_pct >= self.core_from_pct {
            self.core
        } else if ownership_pct >= self.niche_from_pct {
            self.niche
        } else {
            self.thin
        }
    }
}

/// Timing score by hours left before the deadline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingBands {
    pub relaxed_above_hours: f64,
    pub relaxed: f64,
    pub comfortable_above_hours: f64,
    pub comfortable: f64,
    pub tight_above_hours: f64,
    pub tight: f64,
    pub rushed: f64,
    /// Taken off while a flag lock is active
    pub locked_deduction: f64,
}

impl Default for TimingBands {
    fn default() -> Self {
        Self {
            relaxed_above_hours: 48.0,
            relaxed: 0.9,
            comfortable_above_hours: 24.0,
            comfortable: 0.8,
            tight_above_hours: 6.0,
            tight: 0.7,
            rushed: 0.6,
            locked_deduction: 0.1,
        }
    }
}

impl TimingBands {
    pub fn score(&self, hours_to_deadline: f64, locked: bool) -> f64 {
        let base = if hours_to_deadline > self.relaxed_above_hours {
            self.relaxed
        } else if hours_to_deadline > self.comfortable_above_hours {
            self.comfortable
        } else if hours_to_deadline > self.tight_above_hours {
            self.tight
        } else {
            self.rushed
        };
        if locked {
            base - self.locked_deduction
        } else {
            base
        }
    }
}

/// Confidence scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceConfig {
    pub weights: ConfidenceWeights,
    pub risk_thresholds: RiskThresholds,
    /// Activity at which the volume term saturates
    pub volume_reference: f64,
    /// Share of the transfer-volume factor driven by activity; the rest
    /// rewards a low wildcard probability
    pub volume_share: f64,
    pub stability: StabilityBands,
    /// Rounds of points needed before form consistency is measured
    pub min_form_rounds: usize,
    /// Form consistency assumed below `min_form_rounds`
    pub short_history_form: f64,
    /// Flag-status deduction while any flag is set
    pub flagged_deduction: f64,
    /// Flag-status deduction while a lock is active
    pub locked_deduction: f64,
    /// How much wildcard probability erodes wildcard-detection confidence
    pub wildcard_noise_discount: f64,
    /// How much population sentiment, in either direction, erodes market condition
    pub sentiment_discount: f64,
    pub timing_bands: TimingBands,
    pub very_high_from: f64,
    pub high_from: f64,
    pub medium_from: f64,
    pub low_from: f64,
    pub highly_reliable: DecisionBand,
    pub reliable: DecisionBand,
    pub moderately_reliable: DecisionBand,
}

impl Default for ConfidenceConfig {
    fn default() -> Self {
        Self {
            weights: ConfidenceWeights::default(),
            risk_thresholds: RiskThresholds::default(),
            volume_reference: 50_000.0,
            volume_share: 0.6,
            stability: StabilityBands::default(),
            min_form_rounds: 3,
            short_history_form: 0.7,
            flagged_deduction: 0.1,
            locked_deduction: 0.2,
            wildcard_noise_discount: 0.5,
            sentiment_discount: 0.5,
            timing_bands: TimingBands::default(),
            very_high_from: 0.90,
            high_from: 0.80,
            medium_from: 0.65,
            low_from: 0.50,
            highly_reliable: DecisionBand {
                min_overall: 0.80,
                min_distance: 50.0,
                max_risks: 1,
            },
            reliable: DecisionBand {
                min_overall: 0.65,
                min_distance: 25.0,
                max_risks: 2,
            },
            moderately_reliable: DecisionBand {
                min_overall: 0.50,
                min_distance: 0.0,
                max_risks: 3,
            },
        }
    }
}

impl ConfidenceConfig {
    pub fn validate(&self) -> Result<()> {
        let total = self.weights.total();
        if (total - 1.0).abs() > 1e-6 {
            return Err(Error::Config(format!(
                "confidence weights sum to {:.4}, must be 1.0",
                total
            )));
        }
        let ordered = self.very_high_from >= self.high_from
            && self.high_from >= self.medium_from
            && self.medium_from >= self.low_from;
        if !ordered {
            return Err(Error::Config("confidence tier cutoffs must be descending".into()));
        }
        if !(0.0..=1.0).contains(&self.volume_share) {
            return Err(Error::Config("confidence.volume_share must be within [0, 1]".into()));
        }
        let s = &self.stability;
        if !(s.crowded_above_pct >= s.core_from_pct && s.core_from_pct >= s.niche_from_pct) {
            return Err(Error::Config("confidence.stability cutoffs must be descending".into()));
        }
        let t = &self.timing_bands;
        if !(t.relaxed_above_hours >= t.comfortable_above_hours
            && t.comfortable_above_hours >= t.tight_above_hours)
        {
            return Err(Error::Config("confidence.timing_bands hours must be descending".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceTier {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

impl ConfidenceTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::VeryLow => "very_low",
            ConfidenceTier::Low => "low",
            ConfidenceTier::Medium => "medium",
            ConfidenceTier::High => "high",
            ConfidenceTier::VeryHigh => "very_high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    HighlyReliable,
    Reliable,
    ModeratelyReliable,
    Unreliable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    ActNow,
    MonitorClosely,
    Monitor,
    WaitForMoreData,
}

/// Everything the scorer needs about one asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceInput {
    pub total_activity: f64,
    pub ownership_pct: f64,
    /// Per-round points, oldest first
    pub recent_points: Vec<f64>,
    pub flagged: bool,
    pub locked: bool,
    pub flag_penalty: f64,
    pub model_accuracy: f64,
    pub wildcard_probability: f64,
    pub wildcard_confidence: f64,
    pub threshold_confidence: f64,
    /// Share of completeness checks passed (0-1)
    pub data_quality: f64,
    pub population_sentiment: f64,
    pub hours_to_deadline: f64,
    pub progress: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceFactors {
    pub transfer_volume: f64,
    pub ownership_stability: f64,
    pub form_consistency: f64,
    pub flag_status: f64,
    pub historical_model_accuracy: f64,
    pub wildcard_detection: f64,
    pub threshold_calculation: f64,
    pub data_quality: f64,
    pub market_condition: f64,
    pub timing: f64,
}

impl ConfidenceFactors {
    /// (name, score) pairs in a stable order
    pub fn named(&self) -> [(&'static str, f64); 10] {
        [
            ("transfer_volume", self.transfer_volume),
            ("ownership_stability", self.ownership_stability),
            ("form_consistency", self.form_consistency),
            ("flag_status", self.flag_status),
            ("historical_model_accuracy", self.historical_model_accuracy),
            ("wildcard_detection", self.wildcard_detection),
            ("threshold_calculation", self.threshold_calculation),
            ("data_quality", self.data_quality),
            ("market_condition", self.market_condition),
            ("timing", self.timing),
        ]
    }

    pub fn weighted(&self, w: &ConfidenceWeights) -> f64 {
        self.transfer_volume * w.transfer_volume
            + self.ownership_stability * w.ownership_stability
            + self.form_consistency * w.form_consistency
            + self.flag_status * w.flag_status
            + self.historical_model_accuracy * w.historical_model_accuracy
            + self.wildcard_detection * w.wildcard_detection
            + self.threshold_calculation * w.threshold_calculation
            + self.data_quality * w.data_quality
            + self.market_condition * w.market_condition
            + self.timing * w.timing
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRecord {
    pub factors: ConfidenceFactors,
    pub overall: f64,
    pub tier: ConfidenceTier,
    pub reliability: Reliability,
    pub risk_factors: Vec<String>,
    pub explanation: String,
    pub recommended_action: RecommendedAction,
}

/// Share of completeness checks an asset's data passes
pub fn data_quality(asset: &AssetMetrics) -> f64 {
    let history = &asset.history;
    let checks = [
        !asset.name.trim().is_empty(),
        asset.cost > rust_decimal::Decimal::ZERO,
        history.transfers_in.len() >= 3 && history.transfers_out.len() >= 3,
        history.points.len() >= 3,
        !history.upcoming_difficulty.is_empty(),
    ];
    checks.iter().filter(|passed| **passed).count() as f64 / checks.len() as f64
}

pub struct ConfidenceScorer {
    config: ConfidenceConfig,
}

impl ConfidenceScorer {
    pub fn new(config: ConfidenceConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConfidenceConfig {
        &self.config
    }

    pub fn score(&self, input: &ConfidenceInput) -> ConfidenceRecord {
        let factors = self.factors(input);
        let overall = unit(factors.weighted(&self.config.weights));
        let tier = self.tier_for(overall);
        let risk_factors = self.risk_factors(&factors);
        let distance = (input.progress - 100.0).abs();
        let (reliability, recommended_action) = self.decide(overall, distance, risk_factors.len());
        let explanation = explain(&factors, overall, tier, risk_factors.len());

        ConfidenceRecord {
            factors,
            overall,
            tier,
            reliability,
            risk_factors,
            explanation,
            recommended_action,
        }
    }

    pub fn factors(&self, input: &ConfidenceInput) -> ConfidenceFactors {
        let cfg = &self.config;
        let volume_term = (input.total_activity / cfg.volume_reference).min(1.0);
        let transfer_volume = cfg.volume_share * volume_term
            + (1.0 - cfg.volume_share) * (1.0 - unit(input.wildcard_probability));

        let ownership_stability = cfg.stability.score(input.ownership_pct);

        let form_consistency = if input.recent_points.len() < cfg.min_form_rounds {
            cfg.short_history_form
        } else {
            let m = mean(&input.recent_points).unwrap_or(0.0);
            let sd = std_dev(&input.recent_points).unwrap_or(0.0);
            1.0 - (sd / (m.abs() + 1.0)).min(1.0)
        };

        let mut flag_status = 1.0 - input.flag_penalty;
        if input.flagged {
            flag_status -= cfg.flagged_deduction;
        }
        if input.locked {
            flag_status -= cfg.locked_deduction;
        }

        let wildcard_detection = unit(input.wildcard_confidence)
            * (1.0 - cfg.wildcard_noise_discount * unit(input.wildcard_probability));

        let market_condition = 1.0 - cfg.sentiment_discount * input.population_sentiment.abs().min(1.0);

        let timing = cfg.timing_bands.score(input.hours_to_deadline, input.locked);

        ConfidenceFactors {
            transfer_volume: unit(transfer_volume),
            ownership_stability: unit(ownership_stability),
            form_consistency: unit(form_consistency),
            flag_status: unit(flag_status),
            historical_model_accuracy: unit(input.model_accuracy),
            wildcard_detection: unit(wildcard_detection),
            threshold_calculation: unit(input.threshold_confidence),
            data_quality: unit(input.data_quality),
            market_condition: unit(market_condition),
            timing: unit(timing),
        }
    }

    /// Inclusive lower bounds
    pub fn tier_for(&self, overall: f64) -> ConfidenceTier {
        let cfg = &self.config;
        if overall >= cfg.very_high_from {
            ConfidenceTier::VeryHigh
        } else if overall >= cfg.high_from {
            ConfidenceTier::High
        } else if overall >= cfg.medium_from {
            ConfidenceTier::Medium
        } else if overall >= cfg.low_from {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::VeryLow
        }
    }

    pub fn risk_factors(&self, f: &ConfidenceFactors) -> Vec<String> {
        let t = &self.config.risk_thresholds;
        let checks = [
            (f.transfer_volume < t.transfer_volume, "Low transfer volume reliability"),
            (f.ownership_stability < t.ownership_stability, "Unstable ownership base"),
            (f.form_consistency < t.form_consistency, "Inconsistent recent form"),
            (f.flag_status < t.flag_status, "Recent status flag change"),
            (f.wildcard_detection < t.wildcard_detection, "High wildcard noise"),
            (f.threshold_calculation < t.threshold_calculation, "Uncertain threshold estimate"),
            (f.data_quality < t.data_quality, "Incomplete asset data"),
            (f.market_condition < t.market_condition, "Volatile market conditions"),
            (f.timing < t.timing, "Deadline timing pressure"),
        ];

        checks
            .iter()
            .filter(|(triggered, _)| *triggered)
            .map(|(_, risk)| risk.to_string())
            .collect()
    }

    /// First matching band wins
    pub fn decide(&self, overall: f64, distance: f64, risks: usize) -> (Reliability, RecommendedAction) {
        let cfg = &self.config;
        let fits = |band: &DecisionBand| {
            overall >= band.min_overall && distance >= band.min_distance && risks <= band.max_risks
        };

        if fits(&cfg.highly_reliable) {
            (Reliability::HighlyReliable, RecommendedAction::ActNow)
        } else if fits(&cfg.reliable) {
            (Reliability::Reliable, RecommendedAction::MonitorClosely)
        } else if fits(&cfg.moderately_reliable) {
            (Reliability::ModeratelyReliable, RecommendedAction::Monitor)
        } else {
            (Reliability::Unreliable, RecommendedAction::WaitForMoreData)
        }
    }
}

fn explain(factors: &ConfidenceFactors, overall: f64, tier: ConfidenceTier, risks: usize) -> String {
    let named = factors.named();
    let strongest = named
        .iter()
        .fold(named[0], |best, f| if f.1 > best.1 { *f } else { best });
    let weakest = named
        .iter()
        .fold(named[0], |worst, f| if f.1 < worst.1 { *f } else { worst });

    format!(
        "{} confidence ({:.0}%): strongest factor {} ({:.2}), weakest {} ({:.2}), {} risk factor{}",
        tier.as_str(),
        overall * 100.0,
        strongest.0,
        strongest.1,
        weakest.0,
        weakest.1,
        risks,
        if risks == 1 { "" } else { "s" }
    )
}
