//! Tests for historical reference data

use super::*;
use std::io::Write;

#[test]
fn test_static_history_defaults() {
    let history = StaticHistory::default();
    assert_eq!(history.wildcard_fingerprints().len(), 3);
    assert!((history.model_accuracy() - 0.82).abs() < 1e-9);
    assert_eq!(history.carryover_baseline(12), Some(0.2));
    assert_eq!(history.population_volume_history().len(), 4);
}

#[test]
fn test_flag_impact_lookup() {
    let history = StaticHistory::default();

    let to_severe = FlagTransition::between(StatusFlag::None, StatusFlag::Severe).unwrap();
    let impact = history.flag_impact(to_severe).expect("recorded transition");
    assert!(impact.net_per_ownership_pct < 0.0);

    // Not every transition has a recorded history
    let softening = FlagTransition::between(StatusFlag::Severe, StatusFlag::Caution).unwrap();
    assert!(history.flag_impact(softening).is_none());
}

#[test]
fn test_carryover_baseline_override() {
    let mut history = StaticHistory::default();
    history.carryover_baselines.insert(1, 0.35);
    assert_eq!(history.carryover_baseline(1), Some(0.35));
    assert_eq!(history.carryover_baseline(2), Some(0.2));
}

#[test]
fn test_from_json_file_partial() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{"model_accuracy": 0.9, "fingerprints": [{{"label": "gw1", "total_transfers": 1000.0, "assets_affected": 10.0, "team_spread": 0.5, "confidence": 0.6}}]}}"#
    )
    .unwrap();

    let history = StaticHistory::from_json_file(file.path()).unwrap();
    assert!((history.model_accuracy() - 0.9).abs() < 1e-9);
    assert_eq!(history.wildcard_fingerprints().len(), 1);
    // Untouched fields keep defaults
    assert_eq!(history.flag_impacts.len(), 4);
}

#[test]
fn test_from_json_file_missing() {
    let result = StaticHistory::from_json_file("/nonexistent/history.json");
    assert!(result.is_err());
}

#[test]
fn test_mock_provider_substitution() {
    let mut mock = MockHistoryProvider::new();
    mock.expect_model_accuracy().return_const(0.5);
    mock.expect_wildcard_fingerprints().returning(Vec::new);

    let provider: &dyn HistoryProvider = &mock;
    assert_eq!(provider.model_accuracy(), 0.5);
    assert!(provider.wildcard_fingerprints().is_empty());
}

#[test]
fn test_load_history_defaults() {
    let provider = load_history(None).unwrap();
    assert_eq!(provider.wildcard_fingerprints().len(), 3);
    assert!(load_history(Some(Path::new("/nonexistent/history.json"))).is_err());
}
