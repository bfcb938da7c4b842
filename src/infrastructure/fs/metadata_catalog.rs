use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

use super::write_atomic;
use crate::domain::models::MetadataObject;
use crate::domain::ports::{CollaboratorError, MetadataStore};

/// Metadata catalog kept as a pretty-printed JSON array, ordered by id.
///
/// The file is re-read on every call so edits made outside the process are
/// picked up between runs.
#[derive(Debug)]
pub struct JsonMetadataStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonMetadataStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_catalog(&self) -> Result<BTreeMap<String, MetadataObject>, CollaboratorError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(CollaboratorError::Storage(format!(
                    "{}: {e}",
                    self.path.display()
                )))
            }
        };
        let objects: Vec<MetadataObject> = serde_json::from_str(&text).map_err(|e| {
            CollaboratorError::InvalidResponse(format!("{}: {e}", self.path.display()))
        })?;
        Ok(objects.into_iter().map(|o| (o.id.clone(), o)).collect())
    }

    async fn write_catalog(
        &self,
        catalog: &BTreeMap<String, MetadataObject>,
    ) -> Result<(), CollaboratorError> {
        let objects: Vec<&MetadataObject> = catalog.values().collect();
        let json = serde_json::to_vec_pretty(&objects)
            .map_err(|e| CollaboratorError::Storage(e.to_string()))?;
        write_atomic(&self.path, &json).await
    }
}

#[async_trait]
impl MetadataStore for JsonMetadataStore {
    async fn get(&self, id: &str) -> Result<Option<MetadataObject>, CollaboratorError> {
        Ok(self.read_catalog().await?.remove(id))
    }

    async fn list(&self) -> Result<Vec<MetadataObject>, CollaboratorError> {
        Ok(self.read_catalog().await?.into_values().collect())
    }

    async fn replace(&self, object: &MetadataObject) -> Result<(), CollaboratorError> {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.read_catalog().await?;
        catalog.insert(object.id.clone(), object.clone());
        self.write_catalog(&catalog).await
    }

    async fn remove(&self, id: &str) -> Result<(), CollaboratorError> {
        let _guard = self.write_lock.lock().await;
        let mut catalog = self.read_catalog().await?;
        if catalog.remove(id).is_some() {
            self.write_catalog(&catalog).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::ObjectKind;

    #[tokio::test]
    async fn test_replace_then_list_is_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMetadataStore::new(dir.path().join("metadata.json"));

        store
            .replace(&MetadataObject::new("sales.revenue", ObjectKind::Column, "Gross revenue"))
            .await
            .unwrap();
        store
            .replace(&MetadataObject::new("instructions", ObjectKind::Instructions, ""))
            .await
            .unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(ids, vec!["instructions", "sales.revenue"]);
    }

    #[tokio::test]
    async fn test_missing_catalog_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMetadataStore::new(dir.path().join("absent.json"));
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("anything").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remove_missing_object_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonMetadataStore::new(dir.path().join("metadata.json"));
        store.remove("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn test_replace_preserves_other_objects_byte_for_byte() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        let store = JsonMetadataStore::new(&path);
        let keep = MetadataObject::new("stores", ObjectKind::Entity, "One row per store")
            .with_tags(["compliance"]);
        store.replace(&keep).await.unwrap();
        store
            .replace(&MetadataObject::new("sales", ObjectKind::Entity, "v1"))
            .await
            .unwrap();
        store
            .replace(&MetadataObject::new("sales", ObjectKind::Entity, "v2"))
            .await
            .unwrap();

        assert_eq!(store.get("stores").await.unwrap(), Some(keep));
        assert_eq!(store.get("sales").await.unwrap().unwrap().value, "v2");
    }
}
