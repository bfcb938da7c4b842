//! Domain layer for Tuneloop
//!
//! Models of the evaluation and repair loop, the errors it can raise and the
//! port traits its external collaborators implement.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{DomainError, DomainResult};
