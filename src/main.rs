//! Price Change Predictor
//!
//! Predicts near-term price rises and falls from bulk transfer snapshots.

use chrono::Utc;
use clap::{Parser, Subcommand};
use fpl_price_predictor::{
    config::Config,
    data::load_history,
    engine::{PredictionEngine, PredictionRecord, PredictionSummary},
    flags::FlagLedger,
    types::BootstrapSnapshot,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "price-predictor")]
#[command(about = "Predict asset price changes from transfer activity")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one prediction cycle over a snapshot
    Predict {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,
        /// History store JSON file (overrides config)
        #[arg(long)]
        history: Option<PathBuf>,
        /// Write the full summary as JSON
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Rows to print per bucket
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Re-run predictions on an interval, tracking flag changes between cycles
    Watch {
        /// Snapshot JSON file, re-read every cycle
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Seconds between cycles (overrides config)
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show the full breakdown for one asset
    Explain {
        /// Snapshot JSON file
        #[arg(short, long)]
        snapshot: PathBuf,
        /// Asset id
        #[arg(short, long)]
        asset: u32,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Predict {
            snapshot,
            history,
            output,
            limit,
        } => predict(config, &snapshot, history, output, limit).await,
        Commands::Watch {
            snapshot,
            interval_secs,
        } => watch(config, &snapshot, interval_secs).await,
        Commands::Explain { snapshot, asset } => explain(config, &snapshot, asset).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn build_engine(config: Config, history: Option<PathBuf>) -> anyhow::Result<PredictionEngine> {
    let history_path = history.or_else(|| config.history_file.clone());
    let provider = load_history(history_path.as_deref())?;
    Ok(PredictionEngine::new(config, provider))
}

async fn read_snapshot(path: &Path) -> anyhow::Result<BootstrapSnapshot> {
    let raw = tokio::fs::read_to_string(path).await?;
    Ok(BootstrapSnapshot::from_json_str(&raw)?)
}

async fn predict(
    config: Config,
    snapshot_path: &Path,
    history: Option<PathBuf>,
    output: Option<PathBuf>,
    limit: usize,
) -> anyhow::Result<()> {
    let engine = build_engine(config, history)?;
    let snapshot = read_snapshot(snapshot_path).await?;
    let summary = engine.run_cycle(&snapshot, Utc::now())?;

    print_summary(&summary, limit);

    if let Some(path) = output {
        tokio::fs::write(&path, serde_json::to_string_pretty(&summary)?).await?;
        tracing::info!("Summary written to {}", path.display());
    }

    Ok(())
}

async fn watch(config: Config, snapshot_path: &Path, interval_secs: Option<u64>) -> anyhow::Result<()> {
    let interval_secs = interval_secs.unwrap_or(config.watch.interval_secs).max(1);
    let mut ledger = FlagLedger::new(config.watch.ledger_retain_hours);
    let engine = build_engine(config, None)?;

    tracing::info!(
        "👀 Watching {} every {}s",
        snapshot_path.display(),
        interval_secs
    );

    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down watcher");
                return Ok(());
            }
        }

        let mut snapshot = match read_snapshot(snapshot_path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Failed to read snapshot: {}", e);
                continue;
            }
        };

        let now = Utc::now();
        ledger.annotate(&mut snapshot, now);

        match engine.run_cycle(&snapshot, now) {
            Ok(summary) => {
                println!(
                    "[{}] rises: {} | falls: {} | high confidence: {} | special: {}",
                    now.format("%H:%M:%S"),
                    summary.summary.predicted_rises,
                    summary.summary.predicted_falls,
                    summary.summary.high_confidence_predictions,
                    summary.summary.special_cases
                );
                for record in summary.predictions.risers.iter().take(3) {
                    println!("  ▲ {}", row(record));
                }
                for record in summary.predictions.fallers.iter().take(3) {
                    println!("  ▼ {}", row(record));
                }
            }
            Err(e) => tracing::error!("Cycle failed: {}", e),
        }

        ledger.record(&snapshot, now);
    }
}

async fn explain(config: Config, snapshot_path: &Path, asset_id: u32) -> anyhow::Result<()> {
    let engine = build_engine(config, None)?;
    let snapshot = read_snapshot(snapshot_path).await?;

    let Some(record) = engine.explain(&snapshot, asset_id, Utc::now())? else {
        anyhow::bail!("Asset {} not found in snapshot", asset_id);
    };

    println!("\n🔎 {} ({}, {})\n", record.name, record.team, record.position);
    println!("Price: £{}m | Ownership: {:.1}%", record.price, record.ownership_pct);
    println!(
        "Progress: {:.1} → {:.1} | Hourly: {:+.2} | {}",
        record.progress,
        record.prediction,
        record.hourly_change,
        record.change_timing.label()
    );
    println!(
        "Change probability: {:.0}% | Target reached: {}",
        record.change_probability * 100.0,
        record.target_reached
    );

    let t = &record.threshold;
    println!("\nThresholds:");
    println!(
        "  rise {:.0} (base {:.0}) | fall {:.0} (base {:.0})",
        t.adjusted_rise_threshold, t.base_rise_threshold, t.adjusted_fall_threshold, t.base_fall_threshold
    );
    println!(
        "  decay {:.3} ownership {:.2} form {:.2} tier {:.2} flag {:.2} special {:.2}",
        t.multipliers.decay,
        t.multipliers.ownership,
        t.multipliers.form,
        t.multipliers.price_tier,
        t.multipliers.flag,
        t.multipliers.special
    );

    let w = &record.wildcard;
    println!("\nWildcard: {:.0}% probability, net valid {:.0}", w.probability * 100.0, w.valid_net_transfers);
    for indicator in &w.indicators {
        println!("  {:?} {:.2}: {}", indicator.kind, indicator.strength, indicator.description);
    }

    if let Some(event) = &record.flag_event {
        println!(
            "\nFlag: {} ({:?}), lock {}h, expected impact {:.0}",
            event.transition.label(),
            event.severity,
            event.lock_hours,
            event.expected_transfer_impact
        );
    }
    if let Some(impact) = &record.flag_impact {
        println!(
            "  next 24h: in {:.0} / out {:.0} / net {:+.0} ({:?})",
            impact.transfers_in_24h, impact.transfers_out_24h, impact.net_24h, impact.source
        );
    }

    let f = &record.forecast;
    println!(
        "\nForecast: in {:.0} / out {:.0} (±{:.0}%), carryover {:.2}, peak {}",
        f.predicted_transfers_in,
        f.predicted_transfers_out,
        f.uncertainty * 100.0,
        f.carryover,
        f.peak_window.as_str()
    );

    let c = &record.confidence;
    println!("\nConfidence: {}", c.explanation);
    println!("  {:?} → {:?}", c.reliability, c.recommended_action);
    for risk in &c.risk_factors {
        println!("  ⚠️  {}", risk);
    }

    if !record.special_notes.is_empty() {
        println!("\nNotes:");
        for note in &record.special_notes {
            println!("  - {}", note);
        }
    }

    Ok(())
}

fn row(record: &PredictionRecord) -> String {
    let name = if record.name.chars().count() > 20 {
        format!("{}...", record.name.chars().take(17).collect::<String>())
    } else {
        record.name.clone()
    };
    format!(
        "{:<20} {:>6.1}% {:>7.1} {:>6.0}% {:<16} {}",
        name,
        record.ownership_pct,
        record.progress,
        record.change_probability * 100.0,
        record.change_timing.label(),
        record.confidence.tier.as_str()
    )
}

fn print_summary(summary: &PredictionSummary, limit: usize) {
    let header = format!(
        "{:<20} {:>7} {:>7} {:>7} {:<16} {}",
        "Asset", "Owned", "Prog", "Prob", "Timing", "Confidence"
    );

    for (title, records) in [
        ("📈 Risers", &summary.predictions.risers),
        ("📉 Fallers", &summary.predictions.fallers),
        ("➖ Stable", &summary.predictions.stable),
    ] {
        println!("\n{} ({})\n", title, records.len());
        println!("{}", header);
        println!("{}", "-".repeat(80));
        for record in records.iter().take(limit) {
            println!("{}", row(record));
        }
    }

    println!(
        "\n{} predictions | avg confidence {:.0}% | last week accuracy {:.0}% | next update {}",
        summary.metadata.total_predictions,
        summary.metadata.confidence_average * 100.0,
        summary.metadata.accuracy_last_week * 100.0,
        summary.metadata.next_update.format("%H:%M UTC")
    );
}
