//! Population-level wildcard context, built once per cycle

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::WildcardConfig;
use crate::data::{HistoryProvider, WildcardFingerprint};
use crate::types::AssetMetrics;
use crate::utils::{mean, unit};

/// Aggregate activity pattern of the current cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatePattern {
    pub total_transfers: f64,
    pub assets_affected: usize,
    pub team_spread: f64,
}

/// Closest known wildcard round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalMatch {
    pub label: Option<String>,
    /// Cosine similarity (0-1)
    pub score: f64,
    /// Recorded confidence of the matched fingerprint
    pub confidence: f64,
}

impl HistoricalMatch {
    fn none() -> Self {
        Self {
            label: None,
            score: 0.0,
            confidence: 0.0,
        }
    }
}

/// Shared, immutable inputs for every per-asset wildcard analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WildcardContext {
    pub gameweek: u32,
    pub mean_activity: f64,
    pub team_spread: f64,
    pub timing_strength: f64,
    pub pattern: AggregatePattern,
    pub best_match: HistoricalMatch,
}

impl WildcardContext {
    pub fn build(
        assets: &[AssetMetrics],
        gameweek: u32,
        history: &dyn HistoryProvider,
        config: &WildcardConfig,
    ) -> Self {
        let activity: Vec<f64> = assets.iter().map(|a| a.total_activity() as f64).collect();
        let mean_activity = mean(&activity).unwrap_or(0.0).max(1.0);
        let hot_bar = config.spread_activity_multiple * mean_activity;

        let teams: HashSet<u32> = assets.iter().map(|a| a.team_id).collect();
        let hot: Vec<&AssetMetrics> = assets
            .iter()
            .filter(|a| a.total_activity() as f64 > hot_bar)
            .collect();
        let hot_teams: HashSet<u32> = hot.iter().map(|a| a.team_id).collect();

        let team_spread = if teams.is_empty() {
            0.0
        } else {
            hot_teams.len() as f64 / teams.len() as f64
        };

        let pattern = AggregatePattern {
            total_transfers: activity.iter().sum(),
            assets_affected: hot.len(),
            team_spread,
        };

        let best_match = best_historical_match(&pattern, &history.wildcard_fingerprints(), config);

        Self {
            gameweek,
            mean_activity,
            team_spread,
            timing_strength: timing_strength(gameweek, config),
            pattern,
            best_match,
        }
    }
}

/// Elevated during known reset rounds and around break periods
pub fn timing_strength(gameweek: u32, config: &WildcardConfig) -> f64 {
    let mut strength = 0.0;
    if config.wildcard_rounds.contains(&gameweek) {
        strength += config.wildcard_round_strength;
    }
    let after_break = gameweek > 1 && config.break_rounds.contains(&(gameweek - 1));
    if config.break_rounds.contains(&gameweek) || after_break {
        strength += config.break_round_strength;
    }
    unit(strength)
}

fn best_historical_match(
    pattern: &AggregatePattern,
    fingerprints: &[WildcardFingerprint],
    config: &WildcardConfig,
) -> HistoricalMatch {
    let current = [
        pattern.total_transfers / config.total_transfers_scale,
        pattern.assets_affected as f64 / config.assets_affected_scale,
        pattern.team_spread,
    ];

    fingerprints
        .iter()
        .map(|fp| {
            let known = [
                fp.total_transfers / config.total_transfers_scale,
                fp.assets_affected / config.assets_affected_scale,
                fp.team_spread,
            ];
            HistoricalMatch {
                label: Some(fp.label.clone()),
                score: unit(cosine_similarity(&current, &known)),
                confidence: unit(fp.confidence),
            }
        })
        .fold(HistoricalMatch::none(), |best, candidate| {
            if candidate.score > best.score {
                candidate
            } else {
                best
            }
        })
}

pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}
