//! Tests for wildcard noise filtering

use super::context::{cosine_similarity, timing_strength};
use super::*;
use crate::data::{MockHistoryProvider, StaticHistory, WildcardFingerprint};
use crate::fixtures::make_asset;

const POPULATION: u64 = 10_000_000;

fn population_with_spike() -> Vec<AssetMetrics> {
    let mut assets: Vec<AssetMetrics> = (1..=10).map(|id| make_asset(id, 5.0, 600, 400)).collect();
    assets.push(make_asset(11, 5.0, 90_000, 10_000));
    assets
}

#[test]
fn test_timing_strength() {
    let cfg = WildcardConfig::default();
    assert_eq!(timing_strength(3, &cfg), 0.0);
    assert!((timing_strength(1, &cfg) - 0.7).abs() < 1e-9);
    // Round right after a break
    assert!((timing_strength(5, &cfg) - 0.4).abs() < 1e-9);
    // Reset round that is also a break saturates
    assert_eq!(timing_strength(8, &cfg), 1.0);
}

#[test]
fn test_cosine_similarity() {
    assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[2.0, 4.0, 6.0]) - 1.0).abs() < 1e-9);
    assert_eq!(cosine_similarity(&[1.0, 0.0, 0.0], &[0.0, 1.0, 0.0]), 0.0);
    assert_eq!(cosine_similarity(&[0.0, 0.0, 0.0], &[1.0, 1.0, 1.0]), 0.0);
}

#[test]
fn test_context_population_stats() {
    let assets = population_with_spike();
    let ctx = WildcardContext::build(&assets, 3, &StaticHistory::default(), &WildcardConfig::default());

    assert!((ctx.mean_activity - 10_000.0).abs() < 1e-9);
    assert_eq!(ctx.pattern.assets_affected, 1);
    assert!((ctx.pattern.total_transfers - 110_000.0).abs() < 1e-9);
    assert!((ctx.team_spread - 1.0 / 11.0).abs() < 1e-9);
    assert!(ctx.best_match.label.is_some());
}

#[test]
fn test_context_empty_population() {
    let ctx = WildcardContext::build(&[], 3, &StaticHistory::default(), &WildcardConfig::default());
    assert_eq!(ctx.team_spread, 0.0);
    assert_eq!(ctx.mean_activity, 1.0);
}

#[test]
fn test_historical_match_uses_provider() {
    let assets = population_with_spike();
    let cfg = WildcardConfig::default();

    let mut mock = MockHistoryProvider::new();
    mock.expect_wildcard_fingerprints().returning(|| {
        vec![WildcardFingerprint {
            label: "mirror".to_string(),
            total_transfers: 110_000.0,
            assets_affected: 1.0,
            team_spread: 1.0 / 11.0,
            confidence: 0.9,
        }]
    });

    let ctx = WildcardContext::build(&assets, 3, &mock, &cfg);
    assert!((ctx.best_match.score - 1.0).abs() < 1e-9);
    assert_eq!(ctx.best_match.confidence, 0.9);
    assert_eq!(ctx.best_match.label.as_deref(), Some("mirror"));

    let mut empty = MockHistoryProvider::new();
    empty.expect_wildcard_fingerprints().returning(Vec::new);
    let ctx = WildcardContext::build(&assets, 3, &empty, &cfg);
    assert_eq!(ctx.best_match.score, 0.0);
    assert!(ctx.best_match.label.is_none());
}

#[test]
fn test_mass_transfer_strength() {
    let assets = population_with_spike();
    let filter = WildcardFilter::new(WildcardConfig::default());
    let ctx = WildcardContext::build(&assets, 3, &StaticHistory::default(), filter.config());

    let quiet = make_asset(50, 5.0, 6_000, 4_000);
    assert_eq!(filter.mass_transfer_strength(&quiet, &ctx), 0.0);

    let loud = make_asset(51, 5.0, 100_000, 0);
    assert_eq!(filter.mass_transfer_strength(&loud, &ctx), 1.0);
}

#[test]
fn test_ownership_pattern_strength() {
    let filter = WildcardFilter::new(WildcardConfig::default());

    // Expected activity at 5% of 10M with 2% turnover is 10,000
    let normal = make_asset(1, 5.0, 5_000, 5_000);
    assert_eq!(filter.ownership_pattern_strength(&normal, POPULATION), 0.0);

    let surge = make_asset(2, 5.0, 50_000, 0);
    assert!((filter.ownership_pattern_strength(&surge, POPULATION) - 0.8).abs() < 1e-9);
}

#[test]
fn test_probability_bounded_and_denoising() {
    let assets = population_with_spike();
    let filter = WildcardFilter::new(WildcardConfig::default());

    for gameweek in [1, 3, 8, 17, 38] {
        let ctx = WildcardContext::build(&assets, gameweek, &StaticHistory::default(), filter.config());
        for asset in &assets {
            let analysis = filter.analyze(asset, &ctx, POPULATION);
            assert!(analysis.probability >= 0.0 && analysis.probability <= 1.0);
            assert!(analysis.confidence >= 0.0 && analysis.confidence <= 1.0);
            assert!(analysis.valid_transfers_in <= asset.transfers_in as f64);
            assert!(analysis.valid_transfers_out <= asset.transfers_out as f64);
            assert!(analysis.valid_transfers_in >= asset.transfers_in as f64 * 0.6 - 1e-9);
        }
    }
}

#[test]
fn test_spike_flagged_as_noise() {
    let assets = population_with_spike();
    let filter = WildcardFilter::new(WildcardConfig::default());
    let ctx = WildcardContext::build(&assets, 8, &StaticHistory::default(), filter.config());

    let spike = filter.analyze(&assets[10], &ctx, POPULATION);
    let calm = filter.analyze(&assets[0], &ctx, POPULATION);
    assert!(spike.probability > calm.probability);
    assert!(spike.strength(IndicatorKind::MassTransfer) > 0.0);
    assert!(spike
        .indicators
        .iter()
        .any(|i| i.kind == IndicatorKind::TimingPattern));
}

#[test]
fn test_low_ownership_lowers_confidence() {
    let filter = WildcardFilter::new(WildcardConfig::default());
    let assets = population_with_spike();
    let ctx = WildcardContext::build(&assets, 3, &StaticHistory::default(), filter.config());

    let thin = filter.analyze(&make_asset(1, 0.5, 20_000, 5_000), &ctx, POPULATION);
    let broad = filter.analyze(&make_asset(1, 15.0, 20_000, 5_000), &ctx, POPULATION);
    assert!(thin.confidence < broad.confidence);
}

#[test]
fn test_weight_validation() {
    assert!(WildcardConfig::default().validate().is_ok());

    let mut cfg = WildcardConfig::default();
    cfg.weights.mass_transfer = 0.5;
    assert!(cfg.validate().is_err());

    let mut cfg = WildcardConfig::default();
    cfg.max_discount = 1.5;
    assert!(cfg.validate().is_err());
}
