//! File-backed adapters
//!
//! - YAML benchmark definitions
//! - JSON metadata catalog (the live store when no remote catalog is wired)
//! - YAML directory mirror, one file per object
//! - JSON run artifacts and proposal history
//! - Versioned judge prompt profiles

pub mod benchmark_file;
pub mod metadata_catalog;
pub mod prompt_profile;
pub mod run_store;
pub mod yaml_mirror;

use std::path::Path;

use crate::domain::ports::CollaboratorError;

pub use benchmark_file::YamlBenchmarkRepository;
pub use metadata_catalog::JsonMetadataStore;
pub use prompt_profile::load_profile;
pub use run_store::JsonRunStore;
pub use yaml_mirror::YamlConfigMirror;

/// Replace `path` by writing a sibling temp file and renaming it over the target
pub(crate) async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), CollaboratorError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
