use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::verdict::JudgeKind;

/// Main configuration structure for Tuneloop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Evaluation configuration
    #[serde(default)]
    pub evaluation: EvaluationConfig,

    /// Minimum spacing between external calls
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Retry policy for external calls
    #[serde(default)]
    pub retry: RetryConfig,

    /// Judge profile selection
    #[serde(default)]
    pub judges: JudgesConfig,

    /// Patch proposal, validation and verification limits
    #[serde(default)]
    pub optimizer: OptimizerConfig,

    /// File locations
    #[serde(default)]
    pub storage: StorageConfig,

    /// External collaborator endpoints
    #[serde(default)]
    pub services: ServicesConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Evaluation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EvaluationConfig {
    /// Questions evaluated concurrently
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    /// Fewer surviving benchmarks than this aborts a full-scope run
    #[serde(default = "default_min_benchmarks")]
    pub min_benchmarks: usize,

    /// Pass-rate threshold per judge name, as a fraction
    #[serde(default = "default_thresholds")]
    pub thresholds: BTreeMap<String, f64>,

    /// Extra generations per question when repeatability is checked
    #[serde(default = "default_repeatability_runs")]
    pub repeatability_runs: usize,
}

const fn default_repeatability_runs() -> usize {
    2
}

const fn default_max_concurrency() -> usize {
    4
}

const fn default_min_benchmarks() -> usize {
    20
}

fn default_thresholds() -> BTreeMap<String, f64> {
    [
        (JudgeKind::SyntaxValidity, 0.98),
        (JudgeKind::SchemaAccuracy, 0.95),
        (JudgeKind::LogicalAccuracy, 0.90),
        (JudgeKind::SemanticEquivalence, 0.90),
        (JudgeKind::Completeness, 0.90),
        (JudgeKind::AssetRouting, 0.95),
        (JudgeKind::ResultCorrectness, 0.85),
        (JudgeKind::Repeatability, 0.90),
    ]
    .into_iter()
    .map(|(k, v)| (k.as_str().to_string(), v))
    .collect()
}

impl EvaluationConfig {
    pub fn threshold(&self, judge: JudgeKind) -> Option<f64> {
        self.thresholds.get(judge.as_str()).copied()
    }
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            min_benchmarks: default_min_benchmarks(),
            thresholds: default_thresholds(),
            repeatability_runs: default_repeatability_runs(),
        }
    }
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RateLimitConfig {
    /// Minimum milliseconds between query-generation calls
    #[serde(default = "default_generation_interval_ms")]
    pub generation_interval_ms: u64,

    /// Minimum milliseconds between reasoning-model calls
    #[serde(default = "default_reasoning_interval_ms")]
    pub reasoning_interval_ms: u64,
}

const fn default_generation_interval_ms() -> u64 {
    12_000
}

const fn default_reasoning_interval_ms() -> u64 {
    1_000
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            generation_interval_ms: default_generation_interval_ms(),
            reasoning_interval_ms: default_reasoning_interval_ms(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    1_000
}

const fn default_max_backoff_ms() -> u64 {
    30_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
        }
    }
}

/// Judge profile selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct JudgesConfig {
    /// Named profile version, `builtin` for the compiled-in prompts
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Directory holding `<profile>/<judge>.txt` templates
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: String,
}

fn default_profile() -> String {
    "builtin".to_string()
}

fn default_prompts_dir() -> String {
    ".tuneloop/prompts".to_string()
}

impl Default for JudgesConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

/// Patch proposal, validation and verification limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct OptimizerConfig {
    /// Maximum distinct objects one patch set may touch
    #[serde(default = "default_max_blast_radius")]
    pub max_blast_radius: usize,

    /// Hard ceiling on routing instruction text
    #[serde(default = "default_instruction_char_limit")]
    pub instruction_char_limit: usize,

    /// Arbiter `genie_correct` verdicts needed before expected queries are rewritten
    #[serde(default = "default_arbiter_correction_threshold")]
    pub arbiter_correction_threshold: usize,

    /// Largest tolerated pass-rate drop after apply, as a fraction
    #[serde(default = "default_regression_tolerance")]
    pub regression_tolerance: f64,

    /// Prior proposals for one failure before the known-limitations table is consulted
    #[serde(default = "default_recurrence_limit")]
    pub recurrence_limit: u32,

    /// Upper bound on evaluate, diagnose and repair passes in one run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Consecutive passes without beating the best accuracy before the loop stops
    #[serde(default = "default_plateau_iterations")]
    pub plateau_iterations: usize,
}

const fn default_max_iterations() -> usize {
    5
}

const fn default_plateau_iterations() -> usize {
    2
}

const fn default_max_blast_radius() -> usize {
    5
}

const fn default_instruction_char_limit() -> usize {
    4_000
}

const fn default_arbiter_correction_threshold() -> usize {
    3
}

const fn default_regression_tolerance() -> f64 {
    0.02
}

const fn default_recurrence_limit() -> u32 {
    2
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_blast_radius: default_max_blast_radius(),
            instruction_char_limit: default_instruction_char_limit(),
            arbiter_correction_threshold: default_arbiter_correction_threshold(),
            regression_tolerance: default_regression_tolerance(),
            recurrence_limit: default_recurrence_limit(),
            max_iterations: default_max_iterations(),
            plateau_iterations: default_plateau_iterations(),
        }
    }
}

/// File locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// YAML benchmark definitions
    #[serde(default = "default_benchmarks_path")]
    pub benchmarks_path: String,

    /// JSON metadata catalog used as the live store
    #[serde(default = "default_metadata_path")]
    pub metadata_path: String,

    /// Versioned mirror, one YAML file per object
    #[serde(default = "default_mirror_dir")]
    pub mirror_dir: String,

    /// Run artifacts and proposal history
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
}

fn default_benchmarks_path() -> String {
    ".tuneloop/benchmarks.yaml".to_string()
}

fn default_metadata_path() -> String {
    ".tuneloop/metadata.json".to_string()
}

fn default_mirror_dir() -> String {
    ".tuneloop/mirror".to_string()
}

fn default_artifacts_dir() -> String {
    ".tuneloop/artifacts".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            benchmarks_path: default_benchmarks_path(),
            metadata_path: default_metadata_path(),
            mirror_dir: default_mirror_dir(),
            artifacts_dir: default_artifacts_dir(),
        }
    }
}

/// External collaborator endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServicesConfig {
    /// Query generation endpoint (POST `{"question"}` -> `{"query"}`)
    #[serde(default = "default_generation_url")]
    pub generation_url: String,

    /// Query execution base URL (`/execute` and `/explain`)
    #[serde(default = "default_execution_url")]
    pub execution_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Reasoning model settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

fn default_generation_url() -> String {
    "http://localhost:8080/generate".to_string()
}

fn default_execution_url() -> String {
    "http://localhost:8081".to_string()
}

const fn default_timeout_secs() -> u64 {
    120
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            generation_url: default_generation_url(),
            execution_url: default_execution_url(),
            timeout_secs: default_timeout_secs(),
            reasoning: ReasoningConfig::default(),
        }
    }
}

/// Reasoning model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReasoningConfig {
    #[serde(default = "default_reasoning_base_url")]
    pub base_url: String,

    #[serde(default = "default_reasoning_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_reasoning_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_reasoning_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_api_key_env() -> String {
    "ANTHROPIC_API_KEY".to_string()
}

const fn default_max_tokens() -> u32 {
    1024
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            base_url: default_reasoning_base_url(),
            model: default_reasoning_model(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}
