//! Registry backends

use super::{IdentityRecord, IdentityRegistry, RegistryError};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Registry kept in a JSON file, re-read on every lookup so edits to the
/// file take effect without a restart
pub struct FileIdentityRegistry {
    path: PathBuf,
}

impl FileIdentityRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl IdentityRegistry for FileIdentityRegistry {
    async fn records(&self) -> Result<Vec<IdentityRecord>, RegistryError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| RegistryError::Read {
                path: self.path.clone(),
                source,
            })?;
        let records: Vec<IdentityRecord> =
            serde_json::from_str(&raw).map_err(|source| RegistryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        debug!("Loaded {} identity records from {:?}", records.len(), self.path);
        Ok(records)
    }
}

/// Registry held in memory
#[derive(Default)]
pub struct MemoryIdentityRegistry {
    records: Arc<RwLock<Vec<IdentityRecord>>>,
}

impl MemoryIdentityRegistry {
    pub fn new(records: Vec<IdentityRecord>) -> Self {
        Self {
            records: Arc::new(RwLock::new(records)),
        }
    }
}

#[async_trait]
impl IdentityRegistry for MemoryIdentityRegistry {
    async fn records(&self) -> Result<Vec<IdentityRecord>, RegistryError> {
        Ok(self.records.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityLookup;
    use pretty_assertions::assert_eq;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("dao-ballot-{}-{}.json", name, uuid::Uuid::new_v4()))
    }

    #[tokio::test]
    async fn test_file_registry_rereads_on_each_lookup() {
        let path = temp_path("reread");
        tokio::fs::write(
            &path,
            r#"[{"signature":"sig-a","name":"Alice","status":"ACTIVE"}]"#,
        )
        .await
        .unwrap();
        let registry = FileIdentityRegistry::new(&path);

        assert_eq!(
            registry.resolve("sig-a").await.unwrap(),
            IdentityLookup::Active {
                name: "Alice".to_string()
            }
        );

        tokio::fs::write(
            &path,
            r#"[{"signature":"sig-a","name":"Alice","status":"SUSPENDED"}]"#,
        )
        .await
        .unwrap();
        assert!(matches!(
            registry.resolve("sig-a").await.unwrap(),
            IdentityLookup::Inactive { .. }
        ));

        let _ = tokio::fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn test_memory_registry_lookups() {
        let registry = MemoryIdentityRegistry::new(vec![IdentityRecord {
            signature: "sig-b".to_string(),
            name: "Bob".to_string(),
            status: "Suspended".to_string(),
        }]);
        assert!(matches!(
            registry.resolve("sig-b").await.unwrap(),
            IdentityLookup::Inactive { .. }
        ));
        assert_eq!(registry.resolve("sig-c").await.unwrap(), IdentityLookup::NotFound);
    }

    #[tokio::test]
    async fn test_file_registry_reports_missing_and_malformed_files() {
        let missing = FileIdentityRegistry::new(temp_path("missing"));
        assert!(matches!(
            missing.resolve("sig").await,
            Err(RegistryError::Read { .. })
        ));

        let path = temp_path("malformed");
        tokio::fs::write(&path, "not json").await.unwrap();
        let malformed = FileIdentityRegistry::new(&path);
        assert!(matches!(
            malformed.resolve("sig").await,
            Err(RegistryError::Parse { .. })
        ));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
