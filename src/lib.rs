//! Tuneloop - evaluation and self-repair loop for natural-language-to-query systems
//!
//! Tuneloop scores a query generator against a benchmark with a panel of
//! judges, clusters the failures by root cause, and turns recurring causes
//! into small, validated, reversible edits to the metadata the generator
//! reads.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): Evaluation, clustering, patching and the run loop
//! - **Infrastructure Layer** (`infrastructure`): Config, logging and port adapters
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use tuneloop::services::{Orchestrator, RunOptions};
//! use tuneloop::domain::models::Scope;
//!
//! let summary = orchestrator.run(RunOptions::evaluate_only(Scope::Full)).await?;
//! println!("accuracy {:.1}%", summary.accuracy * 100.0);
//! ```

pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    BenchmarkQuestion, Config, EvaluationRecord, MetadataObject, PatchProposal, RunSummary, Scope,
};
pub use domain::ports::{
    BenchmarkRepository, CollaboratorError, ConfigMirror, MetadataStore, QueryExecutor,
    QueryGenerator, ReasoningModel, RunStore,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{Orchestrator, RunOptions};
