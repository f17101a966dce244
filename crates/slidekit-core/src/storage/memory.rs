//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::document::Presentation;
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    presentations: RwLock<HashMap<String, Presentation>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, Presentation>>> {
        self.presentations
            .read()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, Presentation>>> {
        self.presentations
            .write()
            .map_err(|e| StorageError::Other(format!("Lock error: {}", e)))
    }
}

impl Storage for MemoryStorage {
    fn save(&self, id: &str, presentation: &Presentation) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        let presentation = presentation.clone();
        Box::pin(async move {
            self.write()?.insert(id, presentation);
            Ok(())
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Presentation>> {
        let id = id.to_string();
        Box::pin(async move { self.read()?.get(&id).cloned().ok_or(StorageError::NotFound(id)) })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let id = id.to_string();
        Box::pin(async move {
            self.write()?.remove(&id);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move { Ok(self.read()?.keys().cloned().collect()) })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let id = id.to_string();
        Box::pin(async move { Ok(self.read()?.contains_key(&id)) })
    }
}
