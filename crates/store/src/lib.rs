//! Chat store implementations for FinTrack.

pub mod in_memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use in_memory::InMemoryChatStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteChatStore;

use std::sync::Arc;
use fintrack_config::StoreConfig;
use fintrack_core::error::StoreError;
use fintrack_core::store::ChatStore;

/// Open the backend named in configuration.
pub async fn open(config: &StoreConfig) -> Result<Arc<dyn ChatStore>, StoreError> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryChatStore::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let path = config.database_path();
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StoreError::Storage(format!("Cannot create {}: {e}", parent.display()))
                })?;
            }
            let url = format!("sqlite://{}", path.display());
            Ok(Arc::new(SqliteChatStore::new(&url).await?))
        }
        other => Err(StoreError::Storage(format!("Unknown store backend: {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_memory_backend() {
        let config = StoreConfig {
            backend: "memory".into(),
            path: None,
        };
        let store = open(&config).await.unwrap();
        assert_eq!(store.name(), "in_memory");
    }

    #[tokio::test]
    async fn open_sqlite_backend_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chats.db");
        let config = StoreConfig {
            backend: "sqlite".into(),
            path: Some(path.display().to_string()),
        };
        let store = open(&config).await.unwrap();
        assert_eq!(store.name(), "sqlite");
        assert!(path.exists());
    }

    #[tokio::test]
    async fn unknown_backend_rejected() {
        let config = StoreConfig {
            backend: "redis".into(),
            path: None,
        };
        assert!(open(&config).await.is_err());
    }
}
