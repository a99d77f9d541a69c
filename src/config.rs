//! Configuration
//!
//! Every tunable weight, band and lookup table lives in one of the component
//! configs aggregated here. A TOML file is merged key by key over the
//! built-in defaults, so a partial table keeps its other defaults. `${VAR}`
//! references in the file are expanded from the environment, and
//! `PREDICTOR__*` variables override individual keys (e.g.
//! `PREDICTOR__ENGINE__MAX_RISERS`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::confidence::ConfidenceConfig;
use crate::engine::EngineConfig;
use crate::error::{Error, Result};
use crate::flags::FlagConfig;
use crate::forecast::ForecastConfig;
use crate::threshold::ThresholdConfig;
use crate::types::PriceTierBands;
use crate::wildcard::WildcardConfig;

/// Settings for the long-running `watch` command
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    pub interval_secs: u64,
    /// How long a seen flag change keeps its lock window across cycles
    pub ledger_retain_hours: f64,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            ledger_retain_hours: 24.0,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub threshold: ThresholdConfig,
    pub wildcard: WildcardConfig,
    pub flags: FlagConfig,
    pub forecast: ForecastConfig,
    pub confidence: ConfidenceConfig,
    pub price_tiers: PriceTierBands,
    pub watch: WatchConfig,
    /// JSON history store; built-in defaults when unset
    pub history_file: Option<PathBuf>,
}

impl Config {
    /// Load from a TOML file, falling back to defaults when it does not exist
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => {
                info!("Loaded configuration from {}", path.display());
                raw
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config file {} not found, using defaults", path.display());
                String::new()
            }
            Err(e) => return Err(e.into()),
        };

        let expanded = shellexpand::env(&raw)
            .map_err(|e| Error::Config(format!("failed to expand {}: {}", path.display(), e)))?;

        let config: Config = config::Config::builder()
            .add_source(config::Config::try_from(&Config::default())?)
            .add_source(config::File::from_str(&expanded, config::FileFormat::Toml))
            .add_source(
                config::Environment::with_prefix("PREDICTOR")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    /// Reject inconsistent weights and bands
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        self.wildcard.validate()?;
        self.forecast.validate()?;
        self.confidence.validate()?;
        self.flags.validate()?;

        if self.threshold.min_threshold <= 0.0 {
            return Err(Error::Config("threshold.min_threshold must be positive".into()));
        }
        if !is_descending(&self.threshold.ownership_bands) {
            return Err(Error::Config("threshold.ownership_bands must be ordered highest first".into()));
        }
        if !is_descending(&self.wildcard.ownership_bands) {
            return Err(Error::Config("wildcard.ownership_bands must be ordered highest first".into()));
        }
        if self.price_tiers.budget_below > self.price_tiers.premium_from {
            return Err(Error::Config("price_tiers.budget_below exceeds premium_from".into()));
        }
        Ok(())
    }
}

fn is_descending(bands: &[(f64, f64)]) -> bool {
    bands.windows(2).all(|pair| pair[0].0 >= pair[1].0)
}
