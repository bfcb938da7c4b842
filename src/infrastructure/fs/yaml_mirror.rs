use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::write_atomic;
use crate::domain::models::MetadataObject;
use crate::domain::ports::{CollaboratorError, ConfigMirror};

/// Mirror directory holding one `<id>.yaml` file per metadata object, meant
/// to be committed to version control
#[derive(Debug, Clone)]
pub struct YamlConfigMirror {
    root: PathBuf,
}

impl YamlConfigMirror {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File path for an object id. Path separators are replaced so every
    /// object lands directly under the mirror root.
    pub fn file_for(&self, id: &str) -> PathBuf {
        let name: String = id
            .chars()
            .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
            .collect();
        self.root.join(format!("{name}.yaml"))
    }
}

#[async_trait]
impl ConfigMirror for YamlConfigMirror {
    async fn read(&self, id: &str) -> Result<Option<MetadataObject>, CollaboratorError> {
        let path = self.file_for(id);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => serde_yaml::from_str(&text)
                .map(Some)
                .map_err(|e| CollaboratorError::InvalidResponse(format!("{}: {e}", path.display()))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CollaboratorError::Storage(format!("{}: {e}", path.display()))),
        }
    }

    async fn write(&self, object: &MetadataObject) -> Result<(), CollaboratorError> {
        let yaml =
            serde_yaml::to_string(object).map_err(|e| CollaboratorError::Storage(e.to_string()))?;
        write_atomic(&self.file_for(&object.id), yaml.as_bytes()).await
    }

    async fn remove(&self, id: &str) -> Result<(), CollaboratorError> {
        match tokio::fs::remove_file(self.file_for(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
