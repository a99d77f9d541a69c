//! Tests for error types

#[cfg(test)]
mod tests {
    use super::super::error::*;

    #[test]
    fn test_validation_error_message() {
        let err = Error::validation(42, "ownership 120.0 outside [0, 100]");
        assert_eq!(
            err.to_string(),
            "Invalid asset 42: ownership 120.0 outside [0, 100]"
        );
        assert!(err.is_per_asset());
    }

    #[test]
    fn test_empty_snapshot_is_cycle_level() {
        let err = Error::EmptySnapshot;
        assert!(!err.is_per_asset());
        assert!(err.to_string().contains("no assets"));
    }

    #[test]
    fn test_json_error_conversion() {
        let parse: std::result::Result<serde_json::Value, _> = serde_json::from_str("{not json");
        let err: Error = parse.unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
        assert!(!err.is_per_asset());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.json");
        let err: Error = io.into();
        assert!(err.to_string().starts_with("IO error"));
    }
}
