//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use rust_decimal_macros::dec;
    use std::io::Write;

    #[test]
    fn test_config_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.engine.max_risers, 50);
        assert_eq!(config.engine.max_stable, 20);
        assert_eq!(config.engine.update_interval_minutes, 30);
        assert_eq!(config.threshold.rise_base_multiplier, 45.0);
        assert_eq!(config.threshold.min_threshold, 1_000.0);
        assert_eq!(config.price_tiers.premium_from, dec!(9.0));
        assert!(config.history_file.is_none());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.wildcard.max_discount, 0.40);
        assert_eq!(config.forecast.inflow_rate, 0.002);
        assert_eq!(config.confidence.very_high_from, 0.90);
        assert_eq!(config.watch.interval_secs, 300);
    }

    #[test]
    fn test_partial_section_override() {
        let toml_str = r#"
[engine]
max_risers = 10
algorithm_version = "test"

[wildcard.weights]
mass_transfer = 0.30

[flags.rules.none_to_severe]
lock_hours = 36.0
reset_counters = true
severity_score = 3.5
fall_probability_delta = 0.35
rise_probability_delta = -0.35
net_impact_per_ownership_pct = -7000.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.engine.max_risers, 10);
        assert_eq!(config.engine.max_fallers, 50);
        assert_eq!(config.engine.algorithm_version, "test");
        assert_eq!(config.wildcard.weights.mass_transfer, 0.30);
        assert_eq!(config.wildcard.weights.ownership_pattern, 0.20);
        assert_eq!(config.flags.rules.none_to_severe.lock_hours, 36.0);
        assert_eq!(config.flags.rules.none_to_caution.lock_hours, 12.0);
        // 0.30 + 0.20 + 0.15 + 0.15 + 0.15 stays within 1
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_overweight_wildcard() {
        let toml_str = r#"
[wildcard.weights]
mass_transfer = 0.5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_confidence_weights() {
        let toml_str = r#"
[confidence.weights]
timing = 0.5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("confidence weights"));
    }

    #[test]
    fn test_validate_rejects_unordered_bands() {
        let toml_str = r#"
[threshold]
ownership_bands = [[1.0, 0.9], [40.0, 1.3]]
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_inverted_flag_rules() {
        let toml_str = r#"
[flags.rules.none_to_caution]
severity_score = 9.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("none_to_severe"));
    }

    #[test]
    fn test_validate_rejects_unordered_severity_tables() {
        let toml_str = r#"
[flags.severity_bands]
high = 4.0
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());

        let toml_str = r#"
[flags.penalties]
low = 0.5
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("flags.penalties"));

        let toml_str = r#"
[flags.multipliers]
severe = 0.9
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_rows_parse() {
        let toml_str = r#"
[flags.rules.none_to_caution]
lock_hours = 6.0

[confidence.reliable]
max_risks = 3
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.flags.rules.none_to_caution.lock_hours, 6.0);
        assert_eq!(config.confidence.reliable.max_risks, 3);
    }

    #[test]
    fn test_load_partial_rows_keep_row_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[flags.rules.none_to_caution]
lock_hours = 6.0

[confidence.reliable]
max_risks = 3

[confidence.timing_bands]
rushed = 0.5
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        let rule = &config.flags.rules.none_to_caution;
        assert_eq!(rule.lock_hours, 6.0);
        assert!(rule.reset_counters);
        assert_eq!(rule.severity_score, 1.5);
        assert_eq!(rule.net_impact_per_ownership_pct, -2_500.0);

        let band = &config.confidence.reliable;
        assert_eq!(band.max_risks, 3);
        assert_eq!(band.min_overall, 0.65);
        assert_eq!(band.min_distance, 25.0);

        assert_eq!(config.confidence.timing_bands.rushed, 0.5);
        assert_eq!(config.confidence.timing_bands.relaxed, 0.9);
        assert_eq!(config.price_tiers.premium_from, dec!(9.0));
        assert_eq!(config.threshold.ownership_bands.len(), 5);
    }

    #[test]
    fn test_load_rejects_inverted_flag_rules() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[flags.rules.none_to_caution]\nseverity_score = 9.0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let config = Config::load("/nonexistent/predictor.toml").unwrap();
        assert_eq!(config.engine.max_fallers, 50);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
history_file = "history.json"

[engine]
update_interval_minutes = 15

[threshold]
min_threshold = 500.0

[watch]
interval_secs = 60
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.engine.update_interval_minutes, 15);
        assert_eq!(config.threshold.min_threshold, 500.0);
        assert_eq!(config.watch.interval_secs, 60);
        assert_eq!(
            config.history_file.as_deref(),
            Some(std::path::Path::new("history.json"))
        );
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[engine]\nrise_target = 90.0").unwrap();
        assert!(Config::load(file.path()).is_err());
    }
}
