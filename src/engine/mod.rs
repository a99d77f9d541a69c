//! Prediction engine
//!
//! Runs one evaluation cycle over a bulk snapshot:
//! 1. Validate elements into `AssetMetrics`, skipping bad rows
//! 2. Select candidates (activity, ownership, flag or price movement)
//! 3. Build the population-level wildcard and forecast context once
//! 4. Fan out per-asset evaluation with rayon
//! 5. Rank and bucket into risers, fallers and stable

pub mod summary;

#[cfg(test)]
mod tests;

pub use summary::{
    ChangeTiming, PredictionRecord, PredictionSummary, Predictions, SummaryCounts, SummaryMetadata,
};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::confidence::{self, ConfidenceInput, ConfidenceScorer};
use crate::data::HistoryProvider;
use crate::error::{Error, Result};
use crate::flags::{Adjustments, FlagTracker};
use crate::forecast::{ForecastContext, ForecastModel};
use crate::threshold::{SpecialAssetRule, ThresholdCalculator, ThresholdResult};
use crate::types::{AssetMetrics, BootstrapSnapshot};
use crate::utils::{mean, unit};
use crate::wildcard::{WildcardContext, WildcardFilter};

/// Orchestration constants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub algorithm_version: String,
    /// Candidate bar on transfers in + out this window
    pub min_activity: u64,
    /// Candidate bar on ownership
    pub min_ownership_pct: f64,
    pub rise_target: f64,
    pub fall_target: f64,
    pub progress_scale: f64,
    pub prediction_extrapolation: f64,
    pub hourly_rate: f64,
    pub max_hourly_change: f64,
    /// Share of the deviation kept while a flag lock is active
    pub lock_dampening: f64,
    pub special_progress_dampening: f64,
    pub special_hourly_dampening: f64,
    pub probability_distance_scale: f64,
    pub probability_cap: f64,
    pub high_volume_net: f64,
    pub high_volume_boost: f64,
    pub immediate_distance: f64,
    pub soon_distance: f64,
    pub next_cycle_distance: f64,
    /// Wildcard probability above which a noise note is attached
    pub wildcard_note_threshold: f64,
    pub max_risers: usize,
    pub max_fallers: usize,
    pub max_stable: usize,
    pub update_interval_minutes: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            algorithm_version: "2.1.0".to_string(),
            min_activity: 1_000,
            min_ownership_pct: 0.5,
            rise_target: 100.5,
            fall_target: 99.5,
            progress_scale: 100.0,
            prediction_extrapolation: 20.0,
            hourly_rate: 1.5,
            max_hourly_change: 2.0,
            lock_dampening: 0.1,
            special_progress_dampening: 0.8,
            special_hourly_dampening: 0.7,
            probability_distance_scale: 50.0,
            probability_cap: 0.8,
            high_volume_net: 50_000.0,
            high_volume_boost: 1.2,
            immediate_distance: 90.0,
            soon_distance: 50.0,
            next_cycle_distance: 20.0,
            wildcard_note_threshold: 0.4,
            max_risers: 50,
            max_fallers: 50,
            max_stable: 20,
            update_interval_minutes: 30,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fall_target > 100.0 || self.rise_target < 100.0 {
            return Err(Error::Config("rise/fall targets must straddle 100".into()));
        }
        if !(0.0..=1.0).contains(&self.lock_dampening)
            || !(0.0..=1.0).contains(&self.special_progress_dampening)
            || !(0.0..=1.0).contains(&self.special_hourly_dampening)
        {
            return Err(Error::Config("dampening factors must be within [0, 1]".into()));
        }
        if self.probability_distance_scale <= 0.0 {
            return Err(Error::Config("probability_distance_scale must be positive".into()));
        }
        Ok(())
    }
}

/// Raw progress numbers before bucketing
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub progress: f64,
    pub prediction: f64,
    pub hourly_change: f64,
}

/// Shared, read-only inputs for one cycle
pub struct CycleContext {
    pub gameweek: u32,
    pub hours_to_deadline: f64,
    pub population: u64,
    pub mean_form: f64,
    pub wildcard: WildcardContext,
    pub forecast: ForecastContext,
    pub team_names: HashMap<u32, String>,
    pub position_names: HashMap<u32, String>,
}

pub struct PredictionEngine {
    config: Config,
    history: Arc<dyn HistoryProvider>,
    thresholds: ThresholdCalculator,
    wildcard: WildcardFilter,
    flags: FlagTracker,
    forecast: ForecastModel,
    confidence: ConfidenceScorer,
}

impl PredictionEngine {
    pub fn new(config: Config, history: Arc<dyn HistoryProvider>) -> Self {
        Self {
            thresholds: ThresholdCalculator::new(config.threshold.clone())
                .with_flag_multipliers(config.flags.multipliers.clone()),
            wildcard: WildcardFilter::new(config.wildcard.clone()),
            flags: FlagTracker::new(config.flags.clone()),
            forecast: ForecastModel::new(config.forecast.clone()),
            confidence: ConfidenceScorer::new(config.confidence.clone()),
            config,
            history,
        }
    }

    /// Replace the special-asset predicate
    pub fn with_special_rule(mut self, rule: Arc<dyn SpecialAssetRule>) -> Self {
        self.thresholds = self.thresholds.with_special_rule(rule);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Evaluate every candidate in the snapshot and rank the results
    pub fn run_cycle(&self, snapshot: &BootstrapSnapshot, now: DateTime<Utc>) -> Result<PredictionSummary> {
        let assets = self.validate(snapshot)?;
        let ctx = self.build_context(snapshot, &assets);

        let candidates: Vec<&AssetMetrics> = assets.iter().filter(|a| self.is_candidate(a)).collect();
        info!(
            "Cycle for round {}: {} valid assets, {} candidates",
            snapshot.gameweek,
            assets.len(),
            candidates.len()
        );

        let records: Vec<PredictionRecord> = candidates
            .par_iter()
            .map(|asset| (asset.id, self.evaluate(asset, &ctx, now)))
            .collect::<Vec<_>>()
            .into_iter()
            .filter_map(|(id, result)| match result {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Skipping asset {}: {}", id, e);
                    None
                }
            })
            .collect();

        let summary = PredictionSummary::assemble(
            records,
            &self.config.engine,
            self.history.accuracy_last_week(),
            now,
        );

        info!(
            "Cycle complete: {} predictions, {} rises, {} falls, avg confidence {:.2}",
            summary.metadata.total_predictions,
            summary.summary.predicted_rises,
            summary.summary.predicted_falls,
            summary.metadata.confidence_average
        );

        Ok(summary)
    }

    /// Evaluate a single asset against the full-population context
    pub fn explain(
        &self,
        snapshot: &BootstrapSnapshot,
        asset_id: u32,
        now: DateTime<Utc>,
    ) -> Result<Option<PredictionRecord>> {
        let assets = self.validate(snapshot)?;
        let Some(asset) = assets.iter().find(|a| a.id == asset_id) else {
            return Ok(None);
        };
        let ctx = self.build_context(snapshot, &assets);
        self.evaluate(asset, &ctx, now).map(Some)
    }

    fn validate(&self, snapshot: &BootstrapSnapshot) -> Result<Vec<AssetMetrics>> {
        if snapshot.is_empty() {
            return Err(Error::EmptySnapshot);
        }

        let assets: Vec<AssetMetrics> = snapshot
            .elements
            .iter()
            .filter_map(|element| match element.to_metrics(&self.config.price_tiers) {
                Ok(metrics) => Some(metrics),
                Err(e) => {
                    warn!("Rejected snapshot row {}: {}", element.id, e);
                    None
                }
            })
            .collect();

        if assets.is_empty() {
            return Err(Error::EmptySnapshot);
        }
        Ok(assets)
    }

    pub fn is_candidate(&self, asset: &AssetMetrics) -> bool {
        let cfg = &self.config.engine;
        asset.total_activity() >= cfg.min_activity
            || asset.ownership_pct >= cfg.min_ownership_pct
            || asset.status.is_flagged()
            || asset.status_changed()
            || asset.price_changed()
    }

    pub fn build_context(&self, snapshot: &BootstrapSnapshot, assets: &[AssetMetrics]) -> CycleContext {
        let history = self.history.as_ref();
        let forms: Vec<f64> = assets.iter().map(|a| a.form).collect();

        let wildcard = WildcardContext::build(assets, snapshot.gameweek, history, self.wildcard.config());
        let incidence = wildcard
            .timing_strength
            .max(wildcard.best_match.score * wildcard.best_match.confidence);
        let forecast = ForecastContext::build(assets, snapshot.gameweek, history, self.forecast.config())
            .with_wildcard_incidence(incidence);

        CycleContext {
            gameweek: snapshot.gameweek,
            hours_to_deadline: snapshot.hours_to_deadline,
            population: snapshot.total_managers,
            mean_form: mean(&forms).unwrap_or(0.0),
            wildcard,
            forecast,
            team_names: snapshot.team_names(),
            position_names: snapshot.position_names(),
        }
    }

    /// Full per-asset pipeline; never touches shared mutable state
    pub fn evaluate(&self, asset: &AssetMetrics, ctx: &CycleContext, now: DateTime<Utc>) -> Result<PredictionRecord> {
        let cfg = &self.config.engine;
        let history = self.history.as_ref();

        let threshold = self
            .thresholds
            .calculate(asset, ctx.gameweek, ctx.population, ctx.mean_form)?;
        let wildcard = self.wildcard.analyze(asset, &ctx.wildcard, ctx.population);
        let flag_event = self.flags.detect(asset, now, history);
        let adjustments = self.flags.adjustments(flag_event.as_ref(), asset.status, now);
        let flag_impact = flag_event
            .as_ref()
            .map(|event| self.flags.project_impact(event, asset.ownership_pct, history));
        let forecast = self.forecast.forecast(
            asset,
            &ctx.forecast,
            ctx.gameweek,
            ctx.hours_to_deadline,
            ctx.population,
            wildcard.probability,
        );

        let net = if wildcard.valid_net_transfers.is_finite() {
            wildcard.valid_net_transfers
        } else {
            asset.net_transfers() as f64
        };

        let p = self.progress(
            net,
            &threshold,
            forecast.threshold_adjustment,
            adjustments.price_change_locked,
        );
        let distance = (p.progress - 100.0).abs();

        let target_reached =
            (p.progress > cfg.rise_target && net > 0.0) || (p.progress < cfg.fall_target && net < 0.0);
        let change_probability = self.change_probability(p.progress, net, &adjustments);
        let change_timing = self.change_timing(target_reached, distance);

        let record = self.confidence.score(&ConfidenceInput {
            total_activity: asset.total_activity() as f64,
            ownership_pct: asset.ownership_pct,
            recent_points: asset.history.points.clone(),
            flagged: asset.status.is_flagged(),
            locked: adjustments.price_change_locked,
            flag_penalty: adjustments.confidence_penalty,
            model_accuracy: history.model_accuracy(),
            wildcard_probability: wildcard.probability,
            wildcard_confidence: wildcard.confidence,
            threshold_confidence: threshold.confidence,
            data_quality: confidence::data_quality(asset),
            population_sentiment: ctx.forecast.population_sentiment,
            hours_to_deadline: ctx.hours_to_deadline,
            progress: p.progress,
        });

        let mut notes = Vec::new();
        if let Some(expiry) = adjustments.lock_expires_at {
            notes.push(format!(
                "Price change locked until {} after status change",
                expiry.format("%Y-%m-%d %H:%M UTC")
            ));
        }
        if let Some(event) = flag_event.as_ref().filter(|e| e.reset_counters) {
            notes.push(format!("Transfer counters reset by {}", event.transition.label()));
        }
        if threshold.special {
            notes.push("Special asset: movement dampened".to_string());
        }
        if wildcard.probability > cfg.wildcard_note_threshold {
            notes.push(format!(
                "High wildcard noise ({:.0}% probability)",
                wildcard.probability * 100.0
            ));
        }
        notes.extend(forecast.adjustment_reasons.iter().cloned());

        let monitoring_priority = self.flags.monitoring_priority(
            asset.ownership_pct,
            flag_event.as_ref().map(|e| e.severity),
            change_probability,
        );

        debug!(
            "Asset {} ({}): progress {:.1}, probability {:.2}, confidence {:.2}",
            asset.id, asset.name, p.progress, change_probability, record.overall
        );

        Ok(PredictionRecord {
            id: asset.id,
            name: asset.name.clone(),
            team: ctx.team_names.get(&asset.team_id).cloned().unwrap_or_default(),
            position: ctx
                .position_names
                .get(&asset.position_id)
                .cloned()
                .unwrap_or_default(),
            price: asset.cost,
            ownership_pct: asset.ownership_pct,
            progress: p.progress,
            prediction: p.prediction,
            hourly_change: p.hourly_change,
            change_timing,
            target_reached,
            change_probability,
            net_transfers: net,
            threshold,
            wildcard,
            adjustments,
            flag_event,
            flag_impact,
            forecast,
            confidence: record,
            special_notes: notes,
            monitoring_priority,
        })
    }

    /// Progress, extrapolated prediction and hourly rate for a net transfer figure
    pub fn progress(
        &self,
        net: f64,
        threshold: &ThresholdResult,
        forecast_factor: f64,
        locked: bool,
    ) -> Progress {
        let cfg = &self.config.engine;

        let (mut deviation, mut extrapolated, mut hourly) = if net > 0.0 {
            let ratio = net / threshold.adjusted_rise_threshold;
            (
                cfg.progress_scale * ratio,
                cfg.progress_scale * ratio + cfg.prediction_extrapolation * ratio,
                (cfg.hourly_rate * ratio).min(cfg.max_hourly_change),
            )
        } else if net < 0.0 {
            let ratio = -net / threshold.adjusted_fall_threshold;
            (
                -cfg.progress_scale * ratio,
                -(cfg.progress_scale * ratio + cfg.prediction_extrapolation * ratio),
                (-cfg.hourly_rate * ratio).max(-cfg.max_hourly_change),
            )
        } else {
            (0.0, 0.0, 0.0)
        };

        if forecast_factor > 0.0 {
            deviation /= forecast_factor;
            extrapolated /= forecast_factor;
        }

        if locked {
            deviation *= cfg.lock_dampening;
            extrapolated *= cfg.lock_dampening;
            hourly = 0.0;
        }

        if threshold.special {
            deviation *= cfg.special_progress_dampening;
            extrapolated *= cfg.special_progress_dampening;
            hourly *= cfg.special_hourly_dampening;
        }

        Progress {
            progress: clamp_progress(100.0 + deviation),
            prediction: clamp_progress(100.0 + extrapolated),
            hourly_change: hourly,
        }
    }

    pub fn change_probability(&self, progress: f64, net: f64, adjustments: &Adjustments) -> f64 {
        let cfg = &self.config.engine;
        let distance = (progress - 100.0).abs();

        let mut probability = (distance / cfg.probability_distance_scale).min(1.0) * cfg.probability_cap;
        if net.abs() > cfg.high_volume_net {
            probability *= cfg.high_volume_boost;
        }

        if progress > 100.0 {
            probability += adjustments.rise_probability_delta;
        } else if progress < 100.0 {
            probability += adjustments.fall_probability_delta;
        }

        unit(probability)
    }

    pub fn change_timing(&self, target_reached: bool, distance: f64) -> ChangeTiming {
        let cfg = &self.config.engine;
        if target_reached && distance >= cfg.immediate_distance {
            ChangeTiming::Immediate
        } else if target_reached && distance >= cfg.soon_distance {
            ChangeTiming::Soon
        } else if distance >= cfg.next_cycle_distance {
            ChangeTiming::NextCycle
        } else {
            ChangeTiming::Unlikely
        }
    }
}

fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        return 100.0;
    }
    value.clamp(0.0, 200.0)
}
