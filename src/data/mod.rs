//! Historical reference data
//!
//! Components never read literal tables for historical behaviour. They ask a
//! `HistoryProvider`, so a real pattern/accuracy store can replace the
//! built-in `StaticHistory` without touching component logic.

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::error::Result;
use crate::flags::FlagTransition;
use crate::types::StatusFlag;

/// Aggregate fingerprint of a past round known to be dominated by wildcards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WildcardFingerprint {
    pub label: String,
    /// Total transfers made across the population that round
    pub total_transfers: f64,
    /// Number of distinct assets with abnormal activity
    pub assets_affected: f64,
    /// Share of teams touched by abnormal activity (0-1)
    pub team_spread: f64,
    /// How sure we were this round was wildcard-driven (0-1)
    pub confidence: f64,
}

/// Historical average transfer response to a flag transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlagImpact {
    /// Net transfers per ownership percentage point
    pub net_per_ownership_pct: f64,
    /// Gross transfers (in + out) per ownership percentage point
    pub gross_per_ownership_pct: f64,
    /// Share of the response that lands within 24 hours
    pub within_24h_share: f64,
}

/// Source of historical reference data
#[cfg_attr(test, mockall::automock)]
pub trait HistoryProvider: Send + Sync {
    /// Known wildcard-round fingerprints, most recent last
    fn wildcard_fingerprints(&self) -> Vec<WildcardFingerprint>;

    /// Historical response to a flag transition, if one is recorded
    fn flag_impact(&self, transition: FlagTransition) -> Option<FlagImpact>;

    /// Slowly updated overall model accuracy (0-1)
    fn model_accuracy(&self) -> f64;

    /// Accuracy of last week's predictions (0-1)
    fn accuracy_last_week(&self) -> f64;

    /// Typical carryover fraction observed for a round
    fn carryover_baseline(&self, gameweek: u32) -> Option<f64>;

    /// Population-wide transfer volume per recent round, oldest first
    fn population_volume_history(&self) -> Vec<f64>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlagImpactEntry {
    pub transition: FlagTransition,
    pub impact: FlagImpact,
}

/// In-memory history store with built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticHistory {
    pub fingerprints: Vec<WildcardFingerprint>,
    pub flag_impacts: Vec<FlagImpactEntry>,
    pub model_accuracy: f64,
    pub accuracy_last_week: f64,
    pub carryover_baselines: BTreeMap<u32, f64>,
    pub default_carryover: f64,
    pub population_volume: Vec<f64>,
}

impl Default for StaticHistory {
    fn default() -> Self {
        let fingerprints = vec![
            WildcardFingerprint {
                label: "season-opener reset".to_string(),
                total_transfers: 9_500_000.0,
                assets_affected: 180.0,
                team_spread: 0.95,
                confidence: 0.85,
            },
            WildcardFingerprint {
                label: "international break reset".to_string(),
                total_transfers: 7_000_000.0,
                assets_affected: 140.0,
                team_spread: 0.85,
                confidence: 0.75,
            },
            WildcardFingerprint {
                label: "fixture swing reset".to_string(),
                total_transfers: 8_000_000.0,
                assets_affected: 120.0,
                team_spread: 0.60,
                confidence: 0.70,
            },
        ];

        let impact = |from, to, net, gross, within| FlagImpactEntry {
            transition: FlagTransition {
                from,
                to,
            },
            impact: FlagImpact {
                net_per_ownership_pct: net,
                gross_per_ownership_pct: gross,
                within_24h_share: within,
            },
        };
        let flag_impacts = vec![
            impact(StatusFlag::None, StatusFlag::Caution, -2_200.0, 3_000.0, 0.6),
            impact(StatusFlag::None, StatusFlag::Severe, -5_500.0, 6_500.0, 0.75),
            impact(StatusFlag::Caution, StatusFlag::None, 1_200.0, 2_000.0, 0.45),
            impact(StatusFlag::Severe, StatusFlag::None, 2_800.0, 3_800.0, 0.4),
        ];

        Self {
            fingerprints,
            flag_impacts,
            model_accuracy: 0.82,
            accuracy_last_week: 0.79,
            carryover_baselines: BTreeMap::new(),
            default_carryover: 0.2,
            population_volume: vec![4_200_000.0, 3_900_000.0, 4_600_000.0, 4_100_000.0],
        }
    }
}

impl StaticHistory {
    /// Load a history store from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}

/// History store from an optional JSON file, or the built-in defaults
pub fn load_history(path: Option<&Path>) -> Result<Arc<dyn HistoryProvider>> {
    match path {
        Some(path) => {
            let history = StaticHistory::from_json_file(path)?;
            info!(
                "Loaded history from {} ({} fingerprints, {} flag impacts)",
                path.display(),
                history.fingerprints.len(),
                history.flag_impacts.len()
            );
            Ok(Arc::new(history))
        }
        None => Ok(Arc::new(StaticHistory::default())),
    }
}

impl HistoryProvider for StaticHistory {
    fn wildcard_fingerprints(&self) -> Vec<WildcardFingerprint> {
        self.fingerprints.clone()
    }

    fn flag_impact(&self, transition: FlagTransition) -> Option<FlagImpact> {
        self.flag_impacts
            .iter()
            .find(|e| e.transition == transition)
            .map(|e| e.impact)
    }

    fn model_accuracy(&self) -> f64 {
        self.model_accuracy
    }

    fn accuracy_last_week(&self) -> f64 {
        self.accuracy_last_week
    }

    fn carryover_baseline(&self, gameweek: u32) -> Option<f64> {
        Some(
            self.carryover_baselines
                .get(&gameweek)
                .copied()
                .unwrap_or(self.default_carryover),
        )
    }

    fn population_volume_history(&self) -> Vec<f64> {
        self.population_volume.clone()
    }
}
