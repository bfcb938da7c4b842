//! Wires the configured adapters into the services a command needs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::domain::models::{Config, JudgeProfile};
use crate::domain::ports::ReasoningModel;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::fs::{
    load_profile, JsonMetadataStore, JsonRunStore, YamlBenchmarkRepository, YamlConfigMirror,
};
use crate::infrastructure::http::{
    build_client, AnthropicReasoningModel, HttpQueryExecutor, HttpQueryGenerator,
};
use crate::infrastructure::logging::{LogConfig, LoggerImpl};
use crate::services::{Collaborators, Orchestrator};

/// Loaded configuration plus the process-wide logger
pub struct AppContext {
    pub config: Config,
    _logger: LoggerImpl,
}

impl AppContext {
    /// Load configuration and install logging
    pub fn init(config_path: Option<&Path>, verbose: bool) -> Result<Self> {
        let config = ConfigLoader::load_with_override(config_path)?;
        let mut log_config = LogConfig::from_settings(&config.logging)?;
        if verbose {
            log_config = log_config.with_level("debug");
        }
        let logger = LoggerImpl::init(&log_config)?;
        Ok(Self {
            config,
            _logger: logger,
        })
    }

    /// Run artifacts store rooted at the configured artifacts directory
    pub fn run_store(&self) -> JsonRunStore {
        JsonRunStore::new(PathBuf::from(&self.config.storage.artifacts_dir))
    }

    fn collaborators(&self, reasoning: Arc<dyn ReasoningModel>) -> Result<Collaborators> {
        let config = &self.config;
        let client = build_client(config.services.timeout_secs)?;
        Ok(Collaborators {
            generator: Arc::new(HttpQueryGenerator::new(
                client.clone(),
                &config.services.generation_url,
            )),
            executor: Arc::new(HttpQueryExecutor::new(client, &config.services.execution_url)),
            reasoning,
            metadata: Arc::new(JsonMetadataStore::new(&config.storage.metadata_path)),
            mirror: Arc::new(YamlConfigMirror::new(&config.storage.mirror_dir)),
            benchmarks: Arc::new(YamlBenchmarkRepository::new(&config.storage.benchmarks_path)),
            runs: Arc::new(self.run_store()),
        })
    }

    /// Build an orchestrator against the configured collaborators
    pub async fn orchestrator(&self) -> Result<Orchestrator> {
        let config = &self.config;
        let reasoning = AnthropicReasoningModel::from_config(
            build_client(config.services.timeout_secs)?,
            &config.services.reasoning,
        )?;
        let collaborators = self.collaborators(Arc::new(reasoning))?;

        let profile = load_profile(Path::new(&config.judges.prompts_dir), &config.judges.profile)
            .await
            .context("Failed to resolve judge profile")?;

        Ok(Orchestrator::new(
            config.clone(),
            collaborators,
            Arc::new(profile),
        ))
    }

    /// Orchestrator for rollback, which replays a persisted log and never
    /// reaches the reasoning model, so no API key is required
    pub fn offline_orchestrator(&self) -> Result<Orchestrator> {
        let reasoning = AnthropicReasoningModel::new(
            build_client(self.config.services.timeout_secs)?,
            &self.config.services.reasoning.base_url,
            String::new(),
            &self.config.services.reasoning.model,
            self.config.services.reasoning.max_tokens,
        );
        Ok(Orchestrator::new(
            self.config.clone(),
            self.collaborators(Arc::new(reasoning))?,
            Arc::new(JudgeProfile::builtin()),
        ))
    }
}
