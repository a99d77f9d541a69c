//! Feature extraction for the transfer forecast

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::AssetMetrics;
use crate::utils::{decimal_to_f64, mean, signed_unit, slope};

/// Six bounded features, each in [-1, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastFeatures {
    /// Trend in net transfers, relative to typical activity
    pub ownership_momentum: f64,
    /// Trend in points per round
    pub form_trend: f64,
    /// Easier upcoming fixtures are positive
    pub fixture_appeal: f64,
    /// Points per cost against the position average
    pub price_value_gap: f64,
    /// Form against the position average
    pub performance_deviation: f64,
    /// Population volume against its historical average
    pub population_sentiment: f64,
}

/// Per-position averages used as reference points
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PositionStats {
    pub mean_points_per_cost: f64,
    pub mean_form: f64,
}

pub fn position_stats(assets: &[AssetMetrics]) -> HashMap<u32, PositionStats> {
    let mut grouped: HashMap<u32, (Vec<f64>, Vec<f64>)> = HashMap::new();
    for asset in assets {
        let entry = grouped.entry(asset.position_id).or_default();
        entry.0.push(points_per_cost(asset));
        entry.1.push(asset.form);
    }

    grouped
        .into_iter()
        .map(|(position, (ppc, form))| {
            (
                position,
                PositionStats {
                    mean_points_per_cost: mean(&ppc).unwrap_or(0.0),
                    mean_form: mean(&form).unwrap_or(0.0),
                },
            )
        })
        .collect()
}

pub fn points_per_cost(asset: &AssetMetrics) -> f64 {
    let cost = decimal_to_f64(asset.cost);
    if cost <= 0.0 {
        return 0.0;
    }
    asset.total_points as f64 / cost
}

pub fn ownership_momentum(asset: &AssetMetrics) -> f64 {
    let history = &asset.history;
    let net = history.net_series();
    let activity: Vec<f64> = history
        .transfers_in
        .iter()
        .zip(history.transfers_out.iter())
        .map(|(i, o)| *i as f64 + *o as f64)
        .collect();
    let typical = mean(&activity).unwrap_or(0.0).max(1.0);
    signed_unit(slope(&net) / typical)
}

pub fn form_trend(asset: &AssetMetrics, points_scale: f64) -> f64 {
    signed_unit(slope(&asset.history.points) / points_scale)
}

fn mean_difficulty(difficulty: &[u8]) -> Option<f64> {
    let values: Vec<f64> = difficulty.iter().map(|d| *d as f64).collect();
    mean(&values)
}

/// Positive when the next fixtures are easier than average
pub fn fixture_appeal(asset: &AssetMetrics, window: usize, neutral_difficulty: f64) -> f64 {
    let upcoming = &asset.history.upcoming_difficulty;
    let next = &upcoming[..upcoming.len().min(window)];
    match mean_difficulty(next) {
        Some(avg) => signed_unit((neutral_difficulty - avg) / 2.0),
        None => 0.0,
    }
}

/// Positive when the next run of fixtures is easier than the one after it
pub fn fixture_swing(asset: &AssetMetrics, window: usize) -> f64 {
    let upcoming = &asset.history.upcoming_difficulty;
    if upcoming.len() <= window {
        return 0.0;
    }
    let next = &upcoming[..window];
    let following = &upcoming[window..upcoming.len().min(window * 2)];
    match (mean_difficulty(next), mean_difficulty(following)) {
        (Some(n), Some(f)) => f - n,
        _ => 0.0,
    }
}

pub fn price_value_gap(asset: &AssetMetrics, stats: Option<&PositionStats>) -> f64 {
    match stats {
        Some(s) if s.mean_points_per_cost > 0.0 => {
            signed_unit((points_per_cost(asset) - s.mean_points_per_cost) / s.mean_points_per_cost)
        }
        _ => 0.0,
    }
}

pub fn performance_deviation(asset: &AssetMetrics, stats: Option<&PositionStats>) -> f64 {
    match stats {
        Some(s) => signed_unit((asset.form - s.mean_form) / s.mean_form.max(1.0)),
        None => 0.0,
    }
}
