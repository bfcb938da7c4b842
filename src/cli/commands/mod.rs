//! CLI command implementations.

pub mod evaluate;
pub mod rollback;
pub mod run;
pub mod show;

use anyhow::{bail, Result};
use clap::{Args, ValueEnum};

use crate::domain::models::{PriorityTier, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ScopeKind {
    Full,
    Slice,
    Critical,
    HeldOut,
}

/// Benchmark selection shared by `run` and `evaluate`
#[derive(Args, Debug, Clone)]
pub struct ScopeArgs {
    /// Which benchmark questions to cover
    #[arg(long, value_enum, default_value = "full")]
    pub scope: ScopeKind,

    /// Patched object ids selecting the slice (repeatable)
    #[arg(long = "patched", value_name = "ID")]
    pub patched: Vec<String>,
}

impl ScopeArgs {
    pub fn to_scope(&self) -> Result<Scope> {
        Ok(match self.scope {
            ScopeKind::Full => Scope::Full,
            ScopeKind::Slice => {
                if self.patched.is_empty() {
                    bail!("--scope slice needs at least one --patched <ID>");
                }
                Scope::Slice {
                    patched: self.patched.clone(),
                }
            }
            ScopeKind::Critical => Scope::Tier {
                tier: PriorityTier::Critical,
            },
            ScopeKind::HeldOut => Scope::HeldOut,
        })
    }
}
