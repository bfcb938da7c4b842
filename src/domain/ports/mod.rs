//! Port trait definitions (Hexagonal Architecture)
//!
//! Async interfaces the external collaborators implement:
//! - QueryGenerator: natural-language-to-query generation
//! - QueryExecutor: query execution and planning
//! - ReasoningModel: free-form completion used by the reasoning judges
//! - MetadataStore: the live metadata catalog
//! - ConfigMirror: versioned, one-file-per-object copy of the catalog
//! - BenchmarkRepository: benchmark definitions
//! - RunStore: immutable run artifacts and proposal history

pub mod benchmark_repository;
pub mod config_mirror;
pub mod errors;
pub mod metadata_store;
pub mod query_executor;
pub mod query_generator;
pub mod reasoning_model;
pub mod run_store;

pub use benchmark_repository::BenchmarkRepository;
pub use config_mirror::ConfigMirror;
pub use errors::CollaboratorError;
pub use metadata_store::MetadataStore;
pub use query_executor::QueryExecutor;
pub use query_generator::QueryGenerator;
pub use reasoning_model::ReasoningModel;
pub use run_store::{ProposalHistory, RunStore};
