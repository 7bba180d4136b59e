use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use wr_core::{ArticleStorage, Error, Result};

pub mod backends;

pub use backends::*;

#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn get_error_message() -> &'static str;
    async fn new() -> Result<Self> where Self: Sized;
}

/// Builds the article store selected on the command line.
pub async fn create_storage(kind: &str, database: Option<&Path>) -> Result<Arc<dyn ArticleStorage>> {
    match kind {
        "memory" => Ok(Arc::new(InMemoryStorage::new())),
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            let storage = match database {
                Some(path) => SQLiteStorage::new_with_path(path).await,
                None => <SQLiteStorage as StorageBackend>::new().await,
            }
            .map_err(|e| {
                tracing::error!("{} ({})", <SQLiteStorage as StorageBackend>::get_error_message(), e);
                e
            })?;
            Ok(Arc::new(storage))
        }
        other => {
            let _ = database;
            Err(Error::InvalidInput(format!("Unknown storage backend: {}", other)))
        }
    }
}
