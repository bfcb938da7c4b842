use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;
use crate::domain::models::verdict::JudgeKind;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid max_concurrency: {0}. Must be between 1 and 64")]
    InvalidMaxConcurrency(usize),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Invalid threshold for {0}: {1}. Must be between 0.0 and 1.0")]
    InvalidThreshold(String, f64),

    #[error("Unknown judge in thresholds: {0}")]
    UnknownJudge(String),

    #[error("Invalid max_blast_radius: {0}. Must be at least 1")]
    InvalidBlastRadius(usize),

    #[error("Invalid regression_tolerance: {0}. Must be between 0.0 and 1.0")]
    InvalidRegressionTolerance(f64),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .tuneloop/config.yaml (project config)
    /// 3. .tuneloop/local.yaml (local overrides, optional)
    /// 4. Environment variables (TUNELOOP_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Self::base_figment()
            .merge(Yaml::file(".tuneloop/config.yaml"))
            .merge(Yaml::file(".tuneloop/local.yaml"))
            .merge(Env::prefixed("TUNELOOP_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honoring environment overrides
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("Config file not found: {}", path.display());
        }

        let config: Config = Self::base_figment()
            .merge(Yaml::file(path))
            .merge(Env::prefixed("TUNELOOP_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// `--config` wins when given, the project hierarchy otherwise
    pub fn load_with_override(path: Option<&Path>) -> Result<Config> {
        match path {
            Some(path) => Self::load_from_file(path),
            None => Self::load(),
        }
    }

    fn base_figment() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let evaluation = &config.evaluation;
        if evaluation.max_concurrency == 0 || evaluation.max_concurrency > 64 {
            return Err(ConfigError::InvalidMaxConcurrency(
                evaluation.max_concurrency,
            ));
        }

        for (name, threshold) in &evaluation.thresholds {
            if JudgeKind::from_str(name).is_none() {
                return Err(ConfigError::UnknownJudge(name.clone()));
            }
            if !(0.0..=1.0).contains(threshold) {
                return Err(ConfigError::InvalidThreshold(name.clone(), *threshold));
            }
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(
                config.logging.rotation.clone(),
            ));
        }

        if config.retry.initial_backoff_ms >= config.retry.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.retry.initial_backoff_ms,
                config.retry.max_backoff_ms,
            ));
        }

        let optimizer = &config.optimizer;
        if optimizer.max_blast_radius == 0 {
            return Err(ConfigError::InvalidBlastRadius(optimizer.max_blast_radius));
        }
        if !(0.0..=1.0).contains(&optimizer.regression_tolerance) {
            return Err(ConfigError::InvalidRegressionTolerance(
                optimizer.regression_tolerance,
            ));
        }
        if optimizer.instruction_char_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "optimizer.instruction_char_limit must be positive".to_string(),
            ));
        }
        if optimizer.max_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "optimizer.max_iterations must be at least 1".to_string(),
            ));
        }
        if optimizer.plateau_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "optimizer.plateau_iterations must be at least 1".to_string(),
            ));
        }
        if evaluation.repeatability_runs == 0 {
            return Err(ConfigError::ValidationFailed(
                "evaluation.repeatability_runs must be at least 1".to_string(),
            ));
        }

        let storage = &config.storage;
        for (field, value) in [
            ("storage.benchmarks_path", &storage.benchmarks_path),
            ("storage.metadata_path", &storage.metadata_path),
            ("storage.mirror_dir", &storage.mirror_dir),
            ("storage.artifacts_dir", &storage.artifacts_dir),
        ] {
            if value.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{field} cannot be empty"
                )));
            }
        }

        if config.judges.profile.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "judges.profile cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.evaluation.max_concurrency, 4);
        assert_eq!(config.evaluation.min_benchmarks, 20);
        assert_eq!(config.optimizer.max_blast_radius, 5);
        assert_eq!(config.optimizer.instruction_char_limit, 4_000);
        assert_eq!(config.optimizer.max_iterations, 5);
        assert_eq!(config.optimizer.plateau_iterations, 2);
        assert_eq!(config.evaluation.repeatability_runs, 2);
        assert_eq!(config.storage.artifacts_dir, ".tuneloop/artifacts");
        assert_eq!(config.logging.level, "info");
        assert_eq!(
            config.evaluation.threshold(JudgeKind::SyntaxValidity),
            Some(0.98)
        );
        ConfigLoader::validate(&config).expect("Default config should be valid");
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml = r"
evaluation:
  max_concurrency: 8
  min_benchmarks: 10
optimizer:
  max_blast_radius: 3
  regression_tolerance: 0.05
logging:
  level: debug
  format: json
";

        let config: Config = serde_yaml::from_str(yaml).expect("YAML should parse");

        assert_eq!(config.evaluation.max_concurrency, 8);
        assert_eq!(config.evaluation.min_benchmarks, 10);
        assert_eq!(config.optimizer.max_blast_radius, 3);
        assert!((config.optimizer.regression_tolerance - 0.05).abs() < f64::EPSILON);
        // Untouched sections keep their defaults
        assert_eq!(config.optimizer.recurrence_limit, 2);
        assert_eq!(config.rate_limit.generation_interval_ms, 12_000);
        assert_eq!(config.logging.format, "json");

        ConfigLoader::validate(&config).expect("Parsed config should be valid");
    }

    #[test]
    fn test_validate_zero_concurrency() {
        let mut config = Config::default();
        config.evaluation.max_concurrency = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidMaxConcurrency(0))
        ));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "invalid".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::InvalidLogLevel(level)) => assert_eq!(level, "invalid"),
            other => panic!("Expected InvalidLogLevel error, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_invalid_log_format() {
        let mut config = Config::default();
        config.logging.format = "xml".to_string();

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidLogFormat(_))
        ));
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config
            .evaluation
            .thresholds
            .insert("completeness".to_string(), 1.5);

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidThreshold(name, _)) if name == "completeness"
        ));
    }

    #[test]
    fn test_validate_unknown_judge_threshold() {
        let mut config = Config::default();
        config
            .evaluation
            .thresholds
            .insert("vibes".to_string(), 0.5);

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::UnknownJudge(name)) if name == "vibes"
        ));
    }

    #[test]
    fn test_validate_zero_blast_radius() {
        let mut config = Config::default();
        config.optimizer.max_blast_radius = 0;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBlastRadius(0))
        ));
    }

    #[test]
    fn test_validate_zero_iterations() {
        let mut config = Config::default();
        config.optimizer.max_iterations = 0;

        match ConfigLoader::validate(&config) {
            Err(ConfigError::ValidationFailed(msg)) => assert!(msg.contains("max_iterations")),
            other => panic!("Expected ValidationFailed error, got {other:?}"),
        }

        let mut config = Config::default();
        config.evaluation.repeatability_runs = 0;
        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::ValidationFailed(msg)) if msg.contains("repeatability_runs")
        ));
    }

    #[test]
    fn test_validate_invalid_backoff() {
        let mut config = Config::default();
        config.retry.initial_backoff_ms = 30_000;
        config.retry.max_backoff_ms = 10_000;

        assert!(matches!(
            ConfigLoader::validate(&config),
            Err(ConfigError::InvalidBackoff(30_000, 10_000))
        ));
    }

    #[test]
    fn test_validate_empty_storage_path() {
        let mut config = Config::default();
        config.storage.mirror_dir = "  ".to_string();

        match ConfigLoader::validate(&config) {
            Err(ConfigError::ValidationFailed(msg)) => assert!(msg.contains("mirror_dir")),
            other => panic!("Expected ValidationFailed error, got {other:?}"),
        }
    }

    #[test]
    fn test_hierarchical_merging() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut base_file = NamedTempFile::new().unwrap();
        writeln!(
            base_file,
            "evaluation:\n  max_concurrency: 2\nlogging:\n  level: info\n  format: json"
        )
        .unwrap();
        base_file.flush().unwrap();

        let mut override_file = NamedTempFile::new().unwrap();
        writeln!(
            override_file,
            "evaluation:\n  max_concurrency: 6\nlogging:\n  level: debug"
        )
        .unwrap();
        override_file.flush().unwrap();

        let config: Config = ConfigLoader::base_figment()
            .merge(Yaml::file(base_file.path()))
            .merge(Yaml::file(override_file.path()))
            .extract()
            .unwrap();

        assert_eq!(config.evaluation.max_concurrency, 6, "Override should win");
        assert_eq!(config.logging.level, "debug");
        assert_eq!(
            config.logging.format, "json",
            "Base value should persist when not overridden"
        );
    }

    #[test]
    fn test_env_override_applies_to_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "optimizer:\n  max_blast_radius: 3").unwrap();
        file.flush().unwrap();

        temp_env::with_vars(
            [
                ("TUNELOOP_OPTIMIZER__MAX_BLAST_RADIUS", Some("7")),
                ("TUNELOOP_LOGGING__LEVEL", Some("warn")),
            ],
            || {
                let config = ConfigLoader::load_from_file(file.path()).unwrap();
                assert_eq!(config.optimizer.max_blast_radius, 7);
                assert_eq!(config.logging.level, "warn");
            },
        );
    }

    #[test]
    fn test_missing_config_file() {
        let err = ConfigLoader::load_from_file("/nonexistent/tuneloop.yaml").unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
