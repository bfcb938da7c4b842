//! Infrastructure layer module
//!
//! Adapters and cross-cutting concerns:
//! - Configuration management (figment)
//! - Logging (tracing)
//! - File-backed and HTTP implementations of the domain ports
//! - In-memory implementations for tests and local runs
//! - Retry and call spacing for external calls
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod fs;
pub mod http;
pub mod logging;
pub mod memory;
pub mod resilience;
