//! Ranked cycle output

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::EngineConfig;
use crate::confidence::{ConfidenceRecord, ConfidenceTier};
use crate::flags::{Adjustments, FlagEvent, ImpactProjection, MonitoringPriority};
use crate::forecast::ForecastOutput;
use crate::threshold::ThresholdResult;
use crate::wildcard::WildcardAnalysis;

/// Banded estimate of when a price change lands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeTiming {
    #[serde(rename = "Tonight")]
    Immediate,
    #[serde(rename = "Within 48 hours")]
    Soon,
    #[serde(rename = "Next gameweek")]
    NextCycle,
    #[serde(rename = "Unlikely")]
    Unlikely,
}

impl ChangeTiming {
    pub fn label(&self) -> &'static str {
        match self {
            ChangeTiming::Immediate => "Tonight",
            ChangeTiming::Soon => "Within 48 hours",
            ChangeTiming::NextCycle => "Next gameweek",
            ChangeTiming::Unlikely => "Unlikely",
        }
    }
}

/// Assembled per-asset prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: u32,
    pub name: String,
    pub team: String,
    pub position: String,
    pub price: Decimal,
    pub ownership_pct: f64,
    /// 100 = no change; above trends to a rise, below to a fall
    pub progress: f64,
    pub prediction: f64,
    pub hourly_change: f64,
    pub change_timing: ChangeTiming,
    pub target_reached: bool,
    pub change_probability: f64,
    /// Net transfers that drove the progress figure
    pub net_transfers: f64,
    pub threshold: ThresholdResult,
    pub wildcard: WildcardAnalysis,
    pub adjustments: Adjustments,
    pub flag_event: Option<FlagEvent>,
    /// Projected 24h transfer response to this cycle's flag change
    pub flag_impact: Option<ImpactProjection>,
    pub forecast: ForecastOutput,
    pub confidence: ConfidenceRecord,
    pub special_notes: Vec<String>,
    pub monitoring_priority: MonitoringPriority,
}

impl PredictionRecord {
    pub fn distance(&self) -> f64 {
        (self.progress - 100.0).abs()
    }

    pub fn is_special_case(&self) -> bool {
        self.threshold.special || self.adjustments.price_change_locked
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    pub risers: Vec<PredictionRecord>,
    pub fallers: Vec<PredictionRecord>,
    pub stable: Vec<PredictionRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryMetadata {
    pub algorithm_version: String,
    pub accuracy_last_week: f64,
    pub total_predictions: usize,
    pub confidence_average: f64,
    pub last_updated: DateTime<Utc>,
    pub next_update: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryCounts {
    pub predicted_rises: usize,
    pub predicted_falls: usize,
    pub high_confidence_predictions: usize,
    pub special_cases: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionSummary {
    pub predictions: Predictions,
    pub metadata: SummaryMetadata,
    pub summary: SummaryCounts,
}

impl PredictionSummary {
    /// Rank, bucket and cap evaluated records
    pub fn assemble(
        records: Vec<PredictionRecord>,
        config: &EngineConfig,
        accuracy_last_week: f64,
        now: DateTime<Utc>,
    ) -> Self {
        let total = records.len();
        let confidence_average = if total == 0 {
            0.0
        } else {
            records.iter().map(|r| r.confidence.overall).sum::<f64>() / total as f64
        };

        let summary = SummaryCounts {
            predicted_rises: records
                .iter()
                .filter(|r| r.target_reached && r.progress > 100.0)
                .count(),
            predicted_falls: records
                .iter()
                .filter(|r| r.target_reached && r.progress < 100.0)
                .count(),
            high_confidence_predictions: records
                .iter()
                .filter(|r| r.confidence.tier >= ConfidenceTier::High)
                .count(),
            special_cases: records.iter().filter(|r| r.is_special_case()).count(),
        };

        let mut predictions = Predictions::default();
        for record in records {
            if record.progress > config.rise_target {
                predictions.risers.push(record);
            } else if record.progress < config.fall_target {
                predictions.fallers.push(record);
            } else {
                predictions.stable.push(record);
            }
        }

        predictions
            .risers
            .sort_by(|a, b| b.progress.total_cmp(&a.progress).then(a.id.cmp(&b.id)));
        predictions
            .fallers
            .sort_by(|a, b| a.progress.total_cmp(&b.progress).then(a.id.cmp(&b.id)));
        predictions
            .stable
            .sort_by(|a, b| by_distance_desc(a, b).then(a.id.cmp(&b.id)));

        predictions.risers.truncate(config.max_risers);
        predictions.fallers.truncate(config.max_fallers);
        predictions.stable.truncate(config.max_stable);

        Self {
            predictions,
            metadata: SummaryMetadata {
                algorithm_version: config.algorithm_version.clone(),
                accuracy_last_week,
                total_predictions: total,
                confidence_average,
                last_updated: now,
                next_update: now + Duration::minutes(config.update_interval_minutes as i64),
            },
            summary,
        }
    }

    pub fn all_records(&self) -> impl Iterator<Item = &PredictionRecord> {
        self.predictions
            .risers
            .iter()
            .chain(self.predictions.fallers.iter())
            .chain(self.predictions.stable.iter())
    }
}

fn by_distance_desc(a: &PredictionRecord, b: &PredictionRecord) -> Ordering {
    b.distance().total_cmp(&a.distance())
}
