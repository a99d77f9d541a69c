//! Tests for the prediction engine

use super::*;
use crate::data::StaticHistory;
use crate::fixtures::{fixed_now, make_asset, make_element, make_snapshot};
use crate::flags::FlagMultipliers;
use crate::threshold::ThresholdMultipliers;
use crate::types::StatusFlag;

fn engine() -> PredictionEngine {
    PredictionEngine::new(Config::default(), Arc::new(StaticHistory::default()))
}

fn threshold(rise: f64, fall: f64, special: bool) -> ThresholdResult {
    ThresholdResult {
        base_rise_threshold: rise,
        base_fall_threshold: fall,
        multipliers: ThresholdMultipliers {
            decay: 1.0,
            ownership: 1.0,
            form: 1.0,
            price_tier: 1.0,
            flag: 1.0,
            special: 1.0,
        },
        adjusted_rise_threshold: rise,
        adjusted_fall_threshold: fall,
        special,
        confidence: 0.85,
    }
}

fn neutral() -> Adjustments {
    Adjustments::neutral(StatusFlag::None, &FlagMultipliers::default())
}

#[test]
fn test_progress_rise() {
    let engine = engine();
    let p = engine.progress(5_000.0, &threshold(10_000.0, 10_000.0, false), 1.0, false);
    assert!((p.progress - 150.0).abs() < 1e-9);
    assert!((p.prediction - 160.0).abs() < 1e-9);
    assert!((p.hourly_change - 0.75).abs() < 1e-9);
}

#[test]
fn test_progress_fall() {
    let engine = engine();
    let p = engine.progress(-5_000.0, &threshold(10_000.0, 10_000.0, false), 1.0, false);
    assert!((p.progress - 50.0).abs() < 1e-9);
    assert!((p.prediction - 40.0).abs() < 1e-9);
    assert!((p.hourly_change + 0.75).abs() < 1e-9);
}

#[test]
fn test_progress_zero_net() {
    let engine = engine();
    let p = engine.progress(0.0, &threshold(10_000.0, 10_000.0, false), 1.0, false);
    assert_eq!(p.progress, 100.0);
    assert_eq!(p.prediction, 100.0);
    assert_eq!(p.hourly_change, 0.0);
}

#[test]
fn test_progress_clamped() {
    let engine = engine();
    let t = threshold(1.0, 1.0, false);

    let up = engine.progress(10_000_000.0, &t, 1.0, false);
    assert_eq!(up.progress, 200.0);
    assert_eq!(up.prediction, 200.0);
    assert_eq!(up.hourly_change, 2.0);

    let down = engine.progress(-10_000_000.0, &t, 1.0, false);
    assert_eq!(down.progress, 0.0);
    assert_eq!(down.hourly_change, -2.0);
}

#[test]
fn test_progress_forecast_factor_divides_deviation() {
    let engine = engine();
    let p = engine.progress(5_000.0, &threshold(10_000.0, 10_000.0, false), 1.25, false);
    assert!((p.progress - 140.0).abs() < 1e-9);
}

#[test]
fn test_progress_locked() {
    let engine = engine();
    let p = engine.progress(5_000.0, &threshold(10_000.0, 10_000.0, false), 1.0, true);
    assert!((p.progress - 105.0).abs() < 1e-9);
    assert_eq!(p.hourly_change, 0.0);
}

#[test]
fn test_progress_special_dampened() {
    let engine = engine();
    let p = engine.progress(5_000.0, &threshold(10_000.0, 10_000.0, true), 1.0, false);
    assert!((p.progress - 140.0).abs() < 1e-9);
    assert!((p.hourly_change - 0.525).abs() < 1e-9);
}

#[test]
fn test_change_probability() {
    let engine = engine();
    let adj = neutral();

    assert!((engine.change_probability(150.0, 5_000.0, &adj) - 0.8).abs() < 1e-9);
    assert!((engine.change_probability(125.0, 5_000.0, &adj) - 0.4).abs() < 1e-9);
    // High volume boost
    assert!((engine.change_probability(150.0, 60_000.0, &adj) - 0.96).abs() < 1e-9);
    assert_eq!(engine.change_probability(100.0, 0.0, &adj), 0.0);

    let mut bad_news = neutral();
    bad_news.fall_probability_delta = 0.3;
    bad_news.rise_probability_delta = -0.3;
    assert!((engine.change_probability(50.0, -5_000.0, &bad_news) - 1.0).abs() < 1e-9);
    assert!((engine.change_probability(110.0, 1_000.0, &bad_news) - 0.0).abs() < 1e-9);
}

#[test]
fn test_change_timing_bands() {
    let engine = engine();
    assert_eq!(engine.change_timing(true, 95.0), ChangeTiming::Immediate);
    assert_eq!(engine.change_timing(true, 60.0), ChangeTiming::Soon);
    assert_eq!(engine.change_timing(false, 95.0), ChangeTiming::NextCycle);
    assert_eq!(engine.change_timing(true, 25.0), ChangeTiming::NextCycle);
    assert_eq!(engine.change_timing(false, 10.0), ChangeTiming::Unlikely);
}

#[test]
fn test_candidate_selection() {
    let engine = engine();

    let quiet = make_asset(1, 0.1, 100, 100);
    assert!(!engine.is_candidate(&quiet));

    let active = make_asset(2, 0.1, 900, 200);
    assert!(engine.is_candidate(&active));

    let owned = make_asset(3, 0.5, 0, 0);
    assert!(engine.is_candidate(&owned));

    let mut flagged = make_asset(4, 0.1, 0, 0);
    flagged.status = StatusFlag::Caution;
    assert!(engine.is_candidate(&flagged));

    let mut repriced = make_asset(5, 0.1, 0, 0);
    repriced.cost_change = rust_decimal_macros::dec!(0.1);
    assert!(engine.is_candidate(&repriced));
}

#[test]
fn test_empty_snapshot_rejected() {
    let engine = engine();
    let result = engine.run_cycle(&make_snapshot(vec![]), fixed_now());
    assert!(matches!(result, Err(Error::EmptySnapshot)));
}

#[test]
fn test_snapshot_without_valid_rows_rejected() {
    let engine = engine();
    let mut bad = make_element(1, 10.0, 1_000, 0);
    bad.selected_by_percent = 140.0;
    let mut unknown = make_element(2, 10.0, 1_000, 0);
    unknown.status = "x".to_string();

    let result = engine.run_cycle(&make_snapshot(vec![bad, unknown]), fixed_now());
    assert!(matches!(result, Err(Error::EmptySnapshot)));
}

#[test]
fn test_bad_rows_skipped() {
    let engine = engine();
    let mut bad = make_element(1, 10.0, 1_000, 0);
    bad.selected_by_percent = f64::NAN;
    let good = make_element(2, 10.0, 500_000, 0);

    let summary = engine.run_cycle(&make_snapshot(vec![bad, good]), fixed_now()).unwrap();
    assert_eq!(summary.metadata.total_predictions, 1);
    assert_eq!(summary.predictions.risers[0].id, 2);
}

#[test]
fn test_huge_transfer_counts_do_not_abort_cycle() {
    let engine = engine();
    let mut element = make_element(1, 10.0, 0, 1);
    element.transfers_in_event = u64::MAX;
    let mut history_heavy = make_element(2, 10.0, 50_000, 0);
    history_heavy.history.transfers_in = vec![u64::MAX, u64::MAX, u64::MAX];
    history_heavy.history.transfers_out = vec![u64::MAX, 1, u64::MAX];

    let summary = engine
        .run_cycle(&make_snapshot(vec![element, history_heavy]), fixed_now())
        .unwrap();
    assert_eq!(summary.metadata.total_predictions, 2);
    for record in summary.all_records() {
        assert!((0.0..=200.0).contains(&record.progress));
    }
}

#[test]
fn test_cycle_buckets_and_orders() {
    let engine = engine();
    let snapshot = make_snapshot(vec![
        make_element(1, 10.0, 500_000, 0),
        make_element(2, 10.0, 0, 500_000),
        make_element(3, 10.0, 20_000, 20_000),
        make_element(4, 12.0, 300_000, 0),
        make_element(5, 8.0, 0, 300_000),
    ]);

    let summary = engine.run_cycle(&snapshot, fixed_now()).unwrap();
    assert_eq!(summary.metadata.total_predictions, 5);

    let risers: Vec<u32> = summary.predictions.risers.iter().map(|r| r.id).collect();
    let fallers: Vec<u32> = summary.predictions.fallers.iter().map(|r| r.id).collect();
    assert!(risers.contains(&1) && risers.contains(&4));
    assert!(fallers.contains(&2) && fallers.contains(&5));

    assert!(summary
        .predictions
        .risers
        .windows(2)
        .all(|w| w[0].progress >= w[1].progress));
    assert!(summary
        .predictions
        .fallers
        .windows(2)
        .all(|w| w[0].progress <= w[1].progress));

    assert_eq!(summary.summary.predicted_rises, 2);
    assert_eq!(summary.summary.predicted_falls, 2);

    for record in summary.all_records() {
        assert!((0.0..=200.0).contains(&record.progress));
        assert!((0.0..=1.0).contains(&record.change_probability));
        assert!((0.0..=1.0).contains(&record.confidence.overall));
        assert_eq!(record.team, format!("Team {}", record.id % 20 + 1));
    }
}

#[test]
fn test_caps_apply_after_counting() {
    let mut config = Config::default();
    config.engine.max_risers = 2;
    let engine = PredictionEngine::new(config, Arc::new(StaticHistory::default()));

    let elements = (1..=5).map(|id| make_element(id, 10.0, 500_000, 0)).collect();
    let summary = engine.run_cycle(&make_snapshot(elements), fixed_now()).unwrap();

    assert_eq!(summary.predictions.risers.len(), 2);
    assert_eq!(summary.summary.predicted_rises, 5);
    assert_eq!(summary.metadata.total_predictions, 5);
    // Clamped progress ties break on id
    assert_eq!(summary.predictions.risers[0].id, 1);
    assert_eq!(summary.predictions.risers[1].id, 2);
}

#[test]
fn test_metadata() {
    let engine = engine();
    let now = fixed_now();
    let summary = engine
        .run_cycle(&make_snapshot(vec![make_element(1, 10.0, 50_000, 0)]), now)
        .unwrap();

    assert_eq!(summary.metadata.algorithm_version, "2.1.0");
    assert_eq!(summary.metadata.last_updated, now);
    assert_eq!(summary.metadata.next_update, now + chrono::Duration::minutes(30));
    assert!((summary.metadata.accuracy_last_week - 0.79).abs() < 1e-9);
}

#[test]
fn test_flag_change_is_locked_and_noted() {
    let engine = engine();
    let mut element = make_element(1, 25.0, 0, 400_000);
    element.previous_status = Some("a".to_string());
    element.status = "i".to_string();
    element.news_added = Some(fixed_now() - chrono::Duration::hours(2));

    let record = engine
        .explain(&make_snapshot(vec![element]), 1, fixed_now())
        .unwrap()
        .expect("asset present");

    assert!(record.adjustments.price_change_locked);
    assert_eq!(record.hourly_change, 0.0);
    assert!(record.flag_event.is_some());
    let impact = record.flag_impact.expect("projection for flag change");
    assert_eq!(impact.source, crate::flags::ImpactSource::HistoricalTable);
    assert!(impact.net_24h < 0.0);
    assert!(record.is_special_case());
    assert!(record.special_notes.iter().any(|n| n.contains("locked until")));
    assert!(record.special_notes.iter().any(|n| n.contains("none_to_severe")));
}

#[test]
fn test_flag_multiplier_reported_matches_applied() {
    let mut config = Config::default();
    config.flags.multipliers.severe = 0.5;
    let engine = PredictionEngine::new(config, Arc::new(StaticHistory::default()));

    let mut element = make_element(1, 20.0, 0, 30_000);
    element.status = "i".to_string();
    let record = engine
        .explain(&make_snapshot(vec![element]), 1, fixed_now())
        .unwrap()
        .unwrap();

    assert_eq!(record.threshold.multipliers.flag, 0.5);
    assert_eq!(record.adjustments.threshold_multiplier, record.threshold.multipliers.flag);
}

#[test]
fn test_explain_missing_asset() {
    let engine = engine();
    let snapshot = make_snapshot(vec![make_element(1, 10.0, 50_000, 0)]);
    assert!(engine.explain(&snapshot, 99, fixed_now()).unwrap().is_none());
}

#[test]
fn test_summary_serializes_timing_labels() {
    let engine = engine();
    let summary = engine
        .run_cycle(&make_snapshot(vec![make_element(1, 10.0, 500_000, 0)]), fixed_now())
        .unwrap();
    let json = serde_json::to_string(&summary).unwrap();
    assert!(json.contains("\"change_timing\":\"Tonight\""));
}
