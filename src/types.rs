//! Core types shared across the engine
//!
//! `BootstrapSnapshot` / `BootstrapElement` mirror the bulk snapshot delivered
//! by the upstream game API collaborator. `AssetMetrics` is the validated,
//! immutable per-cycle view that every component reads.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Availability status of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusFlag {
    /// Fully available
    None,
    /// Doubtful (yellow flag)
    Caution,
    /// Injured, suspended or unavailable (red flag)
    Severe,
}

impl StatusFlag {
    pub const ALL: [StatusFlag; 3] = [StatusFlag::None, StatusFlag::Caution, StatusFlag::Severe];

    /// Map the upstream single-letter status code
    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_lowercase().as_str() {
            "a" | "none" => Some(StatusFlag::None),
            "d" | "caution" => Some(StatusFlag::Caution),
            "i" | "s" | "u" | "n" | "severe" => Some(StatusFlag::Severe),
            _ => None,
        }
    }

    pub fn is_flagged(&self) -> bool {
        *self != StatusFlag::None
    }

    /// Canonical upstream code for the flag
    pub fn code(&self) -> &'static str {
        match self {
            StatusFlag::None => "a",
            StatusFlag::Caution => "d",
            StatusFlag::Severe => "i",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusFlag::None => "none",
            StatusFlag::Caution => "caution",
            StatusFlag::Severe => "severe",
        }
    }
}

/// Price band of an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceTier {
    Budget,
    Mid,
    Premium,
}

/// Cost cutoffs used when the snapshot does not carry a tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceTierBands {
    /// Costs strictly below this are budget
    pub budget_below: Decimal,
    /// Costs at or above this are premium
    pub premium_from: Decimal,
}

impl Default for PriceTierBands {
    fn default() -> Self {
        Self {
            budget_below: dec!(6.0),
            premium_from: dec!(9.0),
        }
    }
}

impl PriceTier {
    pub fn from_cost(cost: Decimal, bands: &PriceTierBands) -> Self {
        if cost < bands.budget_below {
            PriceTier::Budget
        } else if cost >= bands.premium_from {
            PriceTier::Premium
        } else {
            PriceTier::Mid
        }
    }
}

/// Recent per-round history for an asset, oldest first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetHistory {
    pub transfers_in: Vec<u64>,
    pub transfers_out: Vec<u64>,
    pub points: Vec<f64>,
    /// Difficulty (1-5) of upcoming fixtures, soonest first
    pub upcoming_difficulty: Vec<u8>,
}

impl AssetHistory {
    /// Net transfers per round, oldest first
    pub fn net_series(&self) -> Vec<f64> {
        self.transfers_in
            .iter()
            .zip(self.transfers_out.iter())
            .map(|(i, o)| *i as f64 - *o as f64)
            .collect()
    }

    /// Number of rounds covered by every series
    pub fn depth(&self) -> usize {
        self.transfers_in
            .len()
            .min(self.transfers_out.len())
            .min(self.points.len())
    }
}

/// Raw snapshot row as delivered by the upstream collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapElement {
    pub id: u32,
    pub web_name: String,
    pub team: u32,
    pub element_type: u32,
    /// Ownership percentage (0-100)
    pub selected_by_percent: f64,
    #[serde(default)]
    pub form: f64,
    #[serde(default)]
    pub event_points: f64,
    #[serde(default)]
    pub total_points: i32,
    /// Upstream status code ("a", "d", "i", "s", "u", "n")
    pub status: String,
    #[serde(default)]
    pub previous_status: Option<String>,
    #[serde(default)]
    pub news_added: Option<DateTime<Utc>>,
    /// Cost in millions
    pub now_cost: Decimal,
    #[serde(default)]
    pub cost_change_event: Decimal,
    #[serde(default)]
    pub price_tier: Option<PriceTier>,
    #[serde(default)]
    pub special: bool,
    #[serde(default)]
    pub transfers_in_event: u64,
    #[serde(default)]
    pub transfers_out_event: u64,
    #[serde(default)]
    pub history: AssetHistory,
}

impl BootstrapElement {
    /// Validate the raw row into an `AssetMetrics`
    pub fn to_metrics(&self, bands: &PriceTierBands) -> Result<AssetMetrics> {
        let ownership = self.selected_by_percent;
        if !ownership.is_finite() || !(0.0..=100.0).contains(&ownership) {
            return Err(Error::validation(
                self.id,
                format!("ownership {} outside [0, 100]", ownership),
            ));
        }
        if self.now_cost < Decimal::ZERO {
            return Err(Error::validation(
                self.id,
                format!("negative cost {}", self.now_cost),
            ));
        }
        if !self.form.is_finite() || !self.event_points.is_finite() {
            return Err(Error::validation(self.id, "non-finite form or points"));
        }

        let status = StatusFlag::from_code(&self.status).ok_or_else(|| {
            Error::validation(self.id, format!("unknown status flag '{}'", self.status))
        })?;
        let previous_status = match &self.previous_status {
            Some(code) => Some(StatusFlag::from_code(code).ok_or_else(|| {
                Error::validation(self.id, format!("unknown previous status flag '{}'", code))
            })?),
            None => None,
        };

        Ok(AssetMetrics {
            id: self.id,
            name: self.web_name.clone(),
            team_id: self.team,
            position_id: self.element_type,
            ownership_pct: ownership,
            form: self.form,
            recent_points: self.event_points,
            total_points: self.total_points,
            status,
            previous_status,
            status_changed_at: self.news_added,
            price_tier: self
                .price_tier
                .unwrap_or_else(|| PriceTier::from_cost(self.now_cost, bands)),
            cost: self.now_cost,
            cost_change: self.cost_change_event,
            special: self.special,
            transfers_in: self.transfers_in_event,
            transfers_out: self.transfers_out_event,
            history: self.history.clone(),
        })
    }
}

/// Validated, immutable per-cycle metrics for one asset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetMetrics {
    pub id: u32,
    pub name: String,
    pub team_id: u32,
    pub position_id: u32,
    /// Ownership percentage (0-100)
    pub ownership_pct: f64,
    pub form: f64,
    pub recent_points: f64,
    pub total_points: i32,
    pub status: StatusFlag,
    /// Flag observed in the previous cycle, if known
    pub previous_status: Option<StatusFlag>,
    pub status_changed_at: Option<DateTime<Utc>>,
    pub price_tier: PriceTier,
    /// Cost in millions
    pub cost: Decimal,
    pub cost_change: Decimal,
    /// Upstream special-asset marker
    pub special: bool,
    pub transfers_in: u64,
    pub transfers_out: u64,
    pub history: AssetHistory,
}

impl AssetMetrics {
    pub fn ownership_fraction(&self) -> f64 {
        self.ownership_pct / 100.0
    }

    pub fn total_activity(&self) -> u64 {
        self.transfers_in.saturating_add(self.transfers_out)
    }

    /// Saturates at the `i64` range
    pub fn net_transfers(&self) -> i64 {
        let net = self.transfers_in as i128 - self.transfers_out as i128;
        net.clamp(i64::MIN as i128, i64::MAX as i128) as i64
    }

    pub fn status_changed(&self) -> bool {
        matches!(self.previous_status, Some(prev) if prev != self.status)
    }

    pub fn price_changed(&self) -> bool {
        self.cost_change != Decimal::ZERO
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub short_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: u32,
    pub singular_name: String,
}

/// Full-population snapshot for one evaluation cycle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapSnapshot {
    /// Current round index (1-based)
    pub gameweek: u32,
    /// Hours until the next transfer deadline
    pub hours_to_deadline: f64,
    /// Total manager population
    pub total_managers: u64,
    #[serde(default)]
    pub teams: Vec<Team>,
    #[serde(default)]
    pub positions: Vec<Position>,
    pub elements: Vec<BootstrapElement>,
}

impl BootstrapSnapshot {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty() || self.total_managers == 0
    }

    pub fn team_names(&self) -> HashMap<u32, String> {
        self.teams.iter().map(|t| (t.id, t.name.clone())).collect()
    }

    pub fn position_names(&self) -> HashMap<u32, String> {
        self.positions
            .iter()
            .map(|p| (p.id, p.singular_name.clone()))
            .collect()
    }
}
