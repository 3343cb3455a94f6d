//! Configuration validation.

use super::{Config, TableConfig, MAX_WORKERS};
use crate::error::{DiffError, Result};
use crate::source::mysql::parse_ssl_mode;

/// Validate the configuration before connecting to either side.
pub fn validate(config: &Config) -> Result<()> {
    validate_table("left", &config.left)?;
    validate_table("right", &config.right)?;

    if let Some(pk) = &config.primary_key {
        if pk.trim().is_empty() {
            return Err(DiffError::Config("primary_key must not be empty".into()));
        }
    }

    if config.diff_columns.iter().any(|c| c.trim().is_empty()) {
        return Err(DiffError::Config(
            "diff_columns must not contain empty names".into(),
        ));
    }

    // Segment config validation - only check if explicitly set
    if let Some(step) = config.segment.step {
        if step <= 0 {
            return Err(DiffError::Config(format!(
                "segment.step must be at least 1, got {}",
                step
            )));
        }
    }
    if let Some(to) = config.segment.to {
        if to == i64::MAX {
            return Err(DiffError::Config(format!(
                "segment.to must be less than {}",
                i64::MAX
            )));
        }
        if to < config.segment.from {
            return Err(DiffError::Config(format!(
                "segment.to ({}) must not be less than segment.from ({})",
                to, config.segment.from
            )));
        }
    }

    if let Some(0) = config.concurrency.workers {
        return Err(DiffError::Config(
            "concurrency.workers must be at least 1".into(),
        ));
    }
    if let Some(workers) = config.concurrency.workers {
        if workers > MAX_WORKERS {
            return Err(DiffError::Config(format!(
                "concurrency.workers must be at most {}, got {}",
                MAX_WORKERS, workers
            )));
        }
    }
    if let Some(0) = config.concurrency.max_connections {
        return Err(DiffError::Config(
            "concurrency.max_connections must be at least 1".into(),
        ));
    }

    if let Some(filter) = &config.filter.where_clause {
        if filter.trim().is_empty() {
            return Err(DiffError::Config("filter.where must not be blank".into()));
        }
    }

    Ok(())
}

fn validate_table(side: &str, table: &TableConfig) -> Result<()> {
    if table.host.is_empty() {
        return Err(DiffError::Config(format!("{}.host is required", side)));
    }
    if table.database.is_empty() {
        return Err(DiffError::Config(format!("{}.database is required", side)));
    }
    if table.user.is_empty() {
        return Err(DiffError::Config(format!("{}.user is required", side)));
    }
    if table.table.is_empty() {
        return Err(DiffError::Config(format!("{}.table is required", side)));
    }
    if parse_ssl_mode(&table.ssl_mode).is_none() {
        return Err(DiffError::Config(format!(
            "{}.ssl_mode must be one of disabled, preferred, required, verify_ca, verify_identity, got '{}'",
            side, table.ssl_mode
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{
        ConcurrencyConfig, FilterConfig, OutputConfig, SegmentConfig,
    };

    fn table(name: &str) -> TableConfig {
        TableConfig {
            host: "localhost".to_string(),
            port: 3306,
            database: "shop".to_string(),
            user: "root".to_string(),
            password: "password".to_string(),
            table: name.to_string(),
            ssl_mode: "disabled".to_string(),
        }
    }

    fn valid_config() -> Config {
        Config {
            primary_key: None,
            diff_columns: vec![],
            left: table("users"),
            right: table("users_copy"),
            segment: SegmentConfig::default(),
            filter: FilterConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            output: OutputConfig::default(),
        }
    }

    #[test]
    fn test_valid_config() {
        let config = valid_config();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_missing_left_host() {
        let mut config = valid_config();
        config.left.host = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("left.host"), "got: {}", err);
    }

    #[test]
    fn test_missing_right_table() {
        let mut config = valid_config();
        config.right.table = "".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("right.table"), "got: {}", err);
    }

    #[test]
    fn test_zero_step_rejected() {
        let mut config = valid_config();
        config.segment.step = Some(0);
        assert!(validate(&config).is_err());
        config.segment.step = Some(-10);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let mut config = valid_config();
        config.segment.from = 100;
        config.segment.to = Some(50);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_max_upper_bound_rejected() {
        let mut config = valid_config();
        config.segment.to = Some(i64::MAX);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("segment.to"), "got: {}", err);

        config.segment.to = Some(i64::MAX - 1);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_huge_worker_count_rejected() {
        let mut config = valid_config();
        config.concurrency.workers = Some(usize::MAX);
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("concurrency.workers"), "got: {}", err);

        config.concurrency.workers = Some(MAX_WORKERS);
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = valid_config();
        config.concurrency.workers = Some(0);
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_filter_rejected() {
        let mut config = valid_config();
        config.filter.where_clause = Some("   ".to_string());
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_unknown_ssl_mode_rejected() {
        let mut config = valid_config();
        config.left.ssl_mode = "sometimes".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("left.ssl_mode"), "got: {}", err);
    }

    #[test]
    fn test_table_config_debug_redacts_password() {
        let mut config = valid_config();
        config.left.password = "super_secret_password_123".to_string();
        let debug_output = format!("{:?}", config.left);
        assert!(
            debug_output.contains("[REDACTED]"),
            "Debug output should contain [REDACTED]"
        );
        assert!(
            !debug_output.contains("super_secret_password_123"),
            "Debug output should not contain actual password value"
        );
    }
}
