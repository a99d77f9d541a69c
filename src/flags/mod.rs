//! Status flag tracking
//!
//! Models the `none ↔ caution ↔ severe` state machine of an asset's
//! availability flag. A transition produces a `FlagEvent`, which in turn
//! yields `Adjustments`:
//! - **Lock window**: price change prediction is suppressed for a while
//!   after the transition, since it invalidates recent transfer signal
//! - **Counter reset**: some transitions reset the upstream transfer counters
//! - **Severity**: transition type amplified by ownership
//! - **Probability deltas**: bad news raises fall probability and vice versa

pub mod ledger;


pub use ledger::FlagLedger;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::data::HistoryProvider;
use crate::error::{Error, Result};
use crate::types::{AssetMetrics, StatusFlag};

/// A directed change between two different flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FlagTransition {
    pub from: StatusFlag,
    pub to: StatusFlag,
}

impl FlagTransition {
    /// Transition between two flags; `None` when nothing changed
    pub fn between(from: StatusFlag, to: StatusFlag) -> Option<Self> {
        if from == to {
            None
        } else {
            Some(Self { from, to })
        }
    }

    /// All six valid transitions
    pub fn all() -> Vec<FlagTransition> {
        StatusFlag::ALL
            .iter()
            .flat_map(|from| {
                StatusFlag::ALL
                    .iter()
                    .filter_map(move |to| FlagTransition::between(*from, *to))
            })
            .collect()
    }

    /// Moving to a worse availability state
    pub fn is_bad_news(&self) -> bool {
        self.to > self.from
    }

    pub fn label(&self) -> String {
        format!("{}_to_{}", self.from.as_str(), self.to.as_str())
    }
}

/// Impact severity tier of a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

/// Behaviour attached to one transition
///
/// Keys missing from a row default to a rule with no effect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagRule {
    /// Hours during which price change prediction is suppressed
    pub lock_hours: f64,
    /// Whether upstream transfer counters are reset
    pub reset_counters: bool,
    /// Base severity score before ownership amplification
    pub severity_score: f64,
    /// Added to fall probability
    pub fall_probability_delta: f64,
    /// Added to rise probability
    pub rise_probability_delta: f64,
    /// Fallback net transfers per ownership point when no history is recorded
    pub net_impact_per_ownership_pct: f64,
}

impl FlagRule {
    fn new(lock_hours: f64, reset_counters: bool, severity_score: f64, fall: f64, rise: f64, impact: f64) -> Self {
        Self {
            lock_hours,
            reset_counters,
            severity_score,
            fall_probability_delta: fall,
            rise_probability_delta: rise,
            net_impact_per_ownership_pct: impact,
        }
    }
}

/// Rule per directed transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagRuleTable {
    pub none_to_caution: FlagRule,
    pub none_to_severe: FlagRule,
    pub caution_to_none: FlagRule,
    pub caution_to_severe: FlagRule,
    pub severe_to_none: FlagRule,
    pub severe_to_caution: FlagRule,
}

impl Default for FlagRuleTable {
    fn default() -> Self {
        Self {
            none_to_caution: FlagRule::new(12.0, true, 1.5, 0.15, -0.15, -2_500.0),
            none_to_severe: FlagRule::new(24.0, true, 3.0, 0.30, -0.30, -6_000.0),
            caution_to_none: FlagRule::new(12.0, false, 0.5, -0.10, 0.10, 1_500.0),
            caution_to_severe: FlagRule::new(12.0, true, 2.0, 0.20, -0.20, -3_500.0),
            severe_to_none: FlagRule::new(24.0, false, 1.0, -0.15, 0.15, 3_000.0),
            severe_to_caution: FlagRule::new(6.0, false, 1.0, -0.05, 0.05, 1_000.0),
        }
    }
}

impl FlagRuleTable {
    pub fn rule(&self, transition: FlagTransition) -> Option<&FlagRule> {
        use StatusFlag as F;
        match (transition.from, transition.to) {
            (F::None, F::Caution) => Some(&self.none_to_caution),
            (F::None, F::Severe) => Some(&self.none_to_severe),
            (F::Caution, F::None) => Some(&self.caution_to_none),
            (F::Caution, F::Severe) => Some(&self.caution_to_severe),
            (F::Severe, F::None) => Some(&self.severe_to_none),
            (F::Severe, F::Caution) => Some(&self.severe_to_caution),
            (F::None, F::None) | (F::Caution, F::Caution) | (F::Severe, F::Severe) => None,
        }
    }
}

/// Threshold multiplier per current flag
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagMultipliers {
    pub none: f64,
    pub caution: f64,
    pub severe: f64,
}

impl Default for FlagMultipliers {
    fn default() -> Self {
        Self {
            none: 1.0,
            caution: 0.85,
            severe: 0.70,
        }
    }
}

impl FlagMultipliers {
    pub fn for_flag(&self, flag: StatusFlag) -> f64 {
        match flag {
            StatusFlag::None => self.none,
            StatusFlag::Caution => self.caution,
            StatusFlag::Severe => self.severe,
        }
    }
}

/// Score cutoffs for severity tiers (inclusive lower bounds)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityBands {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
}

impl Default for SeverityBands {
    fn default() -> Self {
        Self {
            critical: 3.0,
            high: 2.0,
            medium: 1.0,
        }
    }
}

/// Confidence penalty per severity tier
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SeverityPenalties {
    pub critical: f64,
    pub high: f64,
    pub medium: f64,
    pub low: f64,
}

impl Default for SeverityPenalties {
    fn default() -> Self {
        Self {
            critical: 0.30,
            high: 0.20,
            medium: 0.10,
            low: 0.05,
        }
    }
}

impl SeverityPenalties {
    pub fn for_severity(&self, severity: Severity) -> f64 {
        match severity {
            Severity::Critical => self.critical,
            Severity::High => self.high,
            Severity::Medium => self.medium,
            Severity::Low => self.low,
        }
    }
}

/// Split used when no historical impact is recorded for a transition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImpactHeuristic {
    /// Gross transfers per ownership point
    pub gross_per_ownership_pct: f64,
    pub bad_news_outflow_share: f64,
    pub bad_news_within_24h: f64,
    pub good_news_inflow_share: f64,
    pub good_news_within_24h: f64,
}

impl Default for ImpactHeuristic {
    fn default() -> Self {
        Self {
            gross_per_ownership_pct: 3_000.0,
            bad_news_outflow_share: 0.8,
            bad_news_within_24h: 0.7,
            good_news_inflow_share: 0.7,
            good_news_within_24h: 0.4,
        }
    }
}

/// Banded contributions to the monitoring priority score
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorityBands {
    /// (minimum ownership pct, points), checked in order
    pub ownership: Vec<(f64, u32)>,
    pub ownership_floor: u32,
    pub critical: u32,
    pub high: u32,
    pub medium: u32,
    pub low: u32,
    /// (minimum change probability, points), checked in order
    pub probability: Vec<(f64, u32)>,
    pub probability_floor: u32,
    pub urgent_from: u32,
    pub high_from: u32,
    pub medium_from: u32,
}

impl Default for PriorityBands {
    fn default() -> Self {
        Self {
            ownership: vec![(30.0, 40), (15.0, 30), (5.0, 20)],
            ownership_floor: 10,
            critical: 40,
            high: 30,
            medium: 20,
            low: 10,
            probability: vec![(0.8, 20), (0.6, 15), (0.4, 10)],
            probability_floor: 5,
            urgent_from: 80,
            high_from: 60,
            medium_from: 40,
        }
    }
}

/// Flag tracker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FlagConfig {
    pub rules: FlagRuleTable,
    pub multipliers: FlagMultipliers,
    /// Ownership at or above which severity is amplified
    pub high_ownership_pct: f64,
    pub high_ownership_amplifier: f64,
    pub severity_bands: SeverityBands,
    pub penalties: SeverityPenalties,
    pub heuristic: ImpactHeuristic,
    pub priority: PriorityBands,
}

impl Default for FlagConfig {
    fn default() -> Self {
        Self {
            rules: FlagRuleTable::default(),
            multipliers: FlagMultipliers::default(),
            high_ownership_pct: 20.0,
            high_ownership_amplifier: 1.5,
            severity_bands: SeverityBands::default(),
            penalties: SeverityPenalties::default(),
            heuristic: ImpactHeuristic::default(),
            priority: PriorityBands::default(),
        }
    }
}

impl FlagConfig {
    /// Severe news must never rank milder than caution news
    pub fn validate(&self) -> Result<()> {
        let r = &self.rules;
        if r.none_to_severe.severity_score < r.none_to_caution.severity_score {
            return Err(Error::Config(
                "flags.rules.none_to_severe severity_score is below none_to_caution".into(),
            ));
        }
        if r.none_to_severe.lock_hours < r.none_to_caution.lock_hours {
            return Err(Error::Config(
                "flags.rules.none_to_severe lock_hours is below none_to_caution".into(),
            ));
        }
        let all = [
            &r.none_to_caution,
            &r.none_to_severe,
            &r.caution_to_none,
            &r.caution_to_severe,
            &r.severe_to_none,
            &r.severe_to_caution,
        ];
        if all.iter().any(|rule| rule.lock_hours < 0.0 || rule.severity_score < 0.0) {
            return Err(Error::Config("flags.rules lock_hours and severity_score must be non-negative".into()));
        }

        let b = &self.severity_bands;
        if !(b.critical >= b.high && b.high >= b.medium) {
            return Err(Error::Config("flags.severity_bands must be ordered critical >= high >= medium".into()));
        }
        let p = &self.penalties;
        if !(p.critical >= p.high && p.high >= p.medium && p.medium >= p.low) {
            return Err(Error::Config(
                "flags.penalties must be ordered critical >= high >= medium >= low".into(),
            ));
        }
        let m = &self.multipliers;
        if !(m.none >= m.caution && m.caution >= m.severe && m.severe > 0.0) {
            return Err(Error::Config(
                "flags.multipliers must be positive and ordered none >= caution >= severe".into(),
            ));
        }
        if self.high_ownership_amplifier < 1.0 {
            return Err(Error::Config("flags.high_ownership_amplifier must be >= 1".into()));
        }
        Ok(())
    }
}

/// A detected flag change; never mutated after creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlagEvent {
    pub transition: FlagTransition,
    pub changed_at: DateTime<Utc>,
    pub lock_hours: f64,
    pub reset_counters: bool,
    pub severity: Severity,
    pub severity_score: f64,
    /// Expected net transfers caused by the change
    pub expected_transfer_impact: f64,
}

impl FlagEvent {
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.changed_at + Duration::seconds((self.lock_hours * 3600.0).round() as i64)
    }

    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at()
    }
}

/// Effects of the current flag state on a prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Adjustments {
    pub price_change_locked: bool,
    pub lock_expires_at: Option<DateTime<Utc>>,
    pub threshold_multiplier: f64,
    pub rise_probability_delta: f64,
    pub fall_probability_delta: f64,
    pub confidence_penalty: f64,
}

impl Adjustments {
    /// No transition this cycle: only the current flag matters
    pub fn neutral(current: StatusFlag, multipliers: &FlagMultipliers) -> Self {
        Self {
            price_change_locked: false,
            lock_expires_at: None,
            threshold_multiplier: multipliers.for_flag(current),
            rise_probability_delta: 0.0,
            fall_probability_delta: 0.0,
            confidence_penalty: 0.0,
        }
    }

    pub fn from_event(
        event: &FlagEvent,
        current: StatusFlag,
        config: &FlagConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let Some(rule) = config.rules.rule(event.transition) else {
            return Self::neutral(current, &config.multipliers);
        };

        let locked = event.is_active(now);
        Self {
            price_change_locked: locked,
            lock_expires_at: if locked { Some(event.expires_at()) } else { None },
            threshold_multiplier: config.multipliers.for_flag(current),
            rise_probability_delta: rule.rise_probability_delta,
            fall_probability_delta: rule.fall_probability_delta,
            confidence_penalty: config.penalties.for_severity(event.severity),
        }
    }
}

/// Projected 24h transfer response to a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImpactProjection {
    pub transfers_in_24h: f64,
    pub transfers_out_24h: f64,
    pub net_24h: f64,
    pub source: ImpactSource,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImpactSource {
    HistoricalTable,
    Heuristic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityTier {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoringPriority {
    /// 0-100
    pub score: u32,
    pub tier: PriorityTier,
}

/// Detects flag transitions and derives their effects
pub struct FlagTracker {
    config: FlagConfig,
}

impl FlagTracker {
    pub fn new(config: FlagConfig) -> Self {
        Self { config }
    }

    pub fn with_defaults() -> Self {
        Self::new(FlagConfig::default())
    }

    pub fn config(&self) -> &FlagConfig {
        &self.config
    }

    /// Emit an event when the asset's flag differs from the previous observation
    pub fn detect(
        &self,
        asset: &AssetMetrics,
        now: DateTime<Utc>,
        history: &dyn HistoryProvider,
    ) -> Option<FlagEvent> {
        let previous = asset.previous_status?;
        let transition = FlagTransition::between(previous, asset.status)?;
        let rule = self.config.rules.rule(transition)?;

        let (severity_score, severity) = self.severity(transition, asset.ownership_pct);
        let net_per_pct = history
            .flag_impact(transition)
            .map(|impact| impact.net_per_ownership_pct)
            .unwrap_or(rule.net_impact_per_ownership_pct);

        Some(FlagEvent {
            transition,
            changed_at: asset.status_changed_at.unwrap_or(now),
            lock_hours: rule.lock_hours,
            reset_counters: rule.reset_counters,
            severity,
            severity_score,
            expected_transfer_impact: net_per_pct * asset.ownership_pct,
        })
    }

    /// Severity score and tier; higher ownership amplifies the base score
    pub fn severity(&self, transition: FlagTransition, ownership_pct: f64) -> (f64, Severity) {
        let base = self
            .config
            .rules
            .rule(transition)
            .map(|r| r.severity_score)
            .unwrap_or(0.0);

        let amplifier = if ownership_pct >= self.config.high_ownership_pct {
            self.config.high_ownership_amplifier
        } else {
            1.0
        };
        let score = base * amplifier;

        let bands = &self.config.severity_bands;
        let tier = if score >= bands.critical {
            Severity::Critical
        } else if score >= bands.high {
            Severity::High
        } else if score >= bands.medium {
            Severity::Medium
        } else {
            Severity::Low
        };

        (score, tier)
    }

    /// Derive adjustments from an event, or neutral ones for the current flag
    pub fn adjustments(
        &self,
        event: Option<&FlagEvent>,
        current: StatusFlag,
        now: DateTime<Utc>,
    ) -> Adjustments {
        match event {
            Some(event) => Adjustments::from_event(event, current, &self.config, now),
            None => Adjustments::neutral(current, &self.config.multipliers),
        }
    }

    /// Project the next 24h of transfer response to a transition
    pub fn project_impact(
        &self,
        event: &FlagEvent,
        ownership_pct: f64,
        history: &dyn HistoryProvider,
    ) -> ImpactProjection {
        let ownership_pct = ownership_pct.max(0.0);

        if let Some(impact) = history.flag_impact(event.transition) {
            let gross = impact.gross_per_ownership_pct * ownership_pct;
            let net = impact.net_per_ownership_pct * ownership_pct;
            let share = impact.within_24h_share.clamp(0.0, 1.0);
            let transfers_in = ((gross + net) / 2.0).max(0.0) * share;
            let transfers_out = ((gross - net) / 2.0).max(0.0) * share;

            return ImpactProjection {
                transfers_in_24h: transfers_in,
                transfers_out_24h: transfers_out,
                net_24h: transfers_in - transfers_out,
                source: ImpactSource::HistoricalTable,
            };
        }

        let h = &self.config.heuristic;
        let gross = h.gross_per_ownership_pct * ownership_pct;
        let (in_share, within) = if event.transition.is_bad_news() {
            (1.0 - h.bad_news_outflow_share, h.bad_news_within_24h)
        } else {
            (h.good_news_inflow_share, h.good_news_within_24h)
        };

        let transfers_in = gross * in_share * within;
        let transfers_out = gross * (1.0 - in_share) * within;

        ImpactProjection {
            transfers_in_24h: transfers_in,
            transfers_out_24h: transfers_out,
            net_24h: transfers_in - transfers_out,
            source: ImpactSource::Heuristic,
        }
    }

    /// Banded monitoring priority
    pub fn monitoring_priority(
        &self,
        ownership_pct: f64,
        severity: Option<Severity>,
        change_probability: f64,
    ) -> MonitoringPriority {
        let bands = &self.config.priority;

        let ownership_points = bands
            .ownership
            .iter()
            .find(|(min, _)| ownership_pct >= *min)
            .map(|(_, points)| *points)
            .unwrap_or(bands.ownership_floor);

        let severity_points = match severity {
            Some(Severity::Critical) => bands.critical,
            Some(Severity::High) => bands.high,
            Some(Severity::Medium) => bands.medium,
            Some(Severity::Low) => bands.low,
            None => 0,
        };

        let probability_points = bands
            .probability
            .iter()
            .find(|(min, _)| change_probability >= *min)
            .map(|(_, points)| *points)
            .unwrap_or(bands.probability_floor);

        let score = (ownership_points + severity_points + probability_points).min(100);
        let tier = if score >= bands.urgent_from {
            PriorityTier::Urgent
        } else if score >= bands.high_from {
            PriorityTier::High
        } else if score >= bands.medium_from {
            PriorityTier::Medium
        } else {
            PriorityTier::Low
        };

        MonitoringPriority { score, tier }
    }
}
