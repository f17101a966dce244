//! Auto-save: the editor hands over documents without blocking, the host
//! flushes them to storage on its own schedule.

use super::{Persistence, Storage, StorageResult};
use crate::document::Presentation;
use std::sync::Arc;

#[cfg(not(target_arch = "wasm32"))]
use std::time::{Duration, Instant};

#[cfg(target_arch = "wasm32")]
use web_time::{Duration, Instant};

/// Default auto-save interval in seconds.
pub const DEFAULT_AUTOSAVE_INTERVAL_SECS: u64 = 30;

/// Key under which the most recently saved presentation is kept.
pub const LAST_DOCUMENT_KEY: &str = "__last_presentation__";

/// Queues presentations handed over by the editor and writes them to a
/// [`Storage`] backend when the host calls [`AutoSaveManager::flush`].
pub struct AutoSaveManager<S: Storage> {
    storage: Arc<S>,
    interval: Duration,
    last_save: Option<Instant>,
    /// Latest document handed over and not yet written.
    pending: Option<Presentation>,
    /// Document restored by [`AutoSaveManager::restore`], waiting for the editor.
    restored: Option<Presentation>,
    current_id: Option<String>,
}

impl<S: Storage> AutoSaveManager<S> {
    /// Create a new auto-save manager with the given storage backend.
    pub fn new(storage: Arc<S>) -> Self {
        Self {
            storage,
            interval: Duration::from_secs(DEFAULT_AUTOSAVE_INTERVAL_SECS),
            last_save: None,
            pending: None,
            restored: None,
            current_id: None,
        }
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether a handed-over document has not been written yet.
    pub fn is_dirty(&self) -> bool {
        self.pending.is_some()
    }

    pub fn set_document_id(&mut self, id: Option<String>) {
        self.current_id = id;
    }

    pub fn document_id(&self) -> Option<&str> {
        self.current_id.as_deref()
    }

    /// Dirty and the interval has elapsed since the last write.
    pub fn should_save(&self) -> bool {
        if !self.is_dirty() {
            return false;
        }
        match self.last_save {
            Some(last) => last.elapsed() >= self.interval,
            None => true,
        }
    }

    /// Flush if [`AutoSaveManager::should_save`]. Returns true if written.
    pub async fn maybe_flush(&mut self) -> StorageResult<bool> {
        if !self.should_save() {
            return Ok(false);
        }
        self.flush().await
    }

    /// Write the pending document now. Returns false if nothing was pending.
    /// On failure the document stays pending.
    pub async fn flush(&mut self) -> StorageResult<bool> {
        let Some(presentation) = self.pending.take() else {
            return Ok(false);
        };
        match self.write(&presentation).await {
            Ok(()) => Ok(true),
            Err(err) => {
                log::error!("Auto-save failed: {}", err);
                self.pending = Some(presentation);
                Err(err)
            }
        }
    }

    async fn write(&mut self, presentation: &Presentation) -> StorageResult<()> {
        if let Some(id) = &self.current_id {
            self.storage.save(id, presentation).await?;
        }
        self.storage.save(LAST_DOCUMENT_KEY, presentation).await?;
        self.last_save = Some(Instant::now());
        log::debug!("Saved presentation ({} slides)", presentation.slides.len());
        Ok(())
    }

    /// Load a presentation by id and make it the current one.
    pub async fn load(&mut self, id: &str) -> StorageResult<Presentation> {
        let presentation = self.storage.load(id).await?;
        self.current_id = Some(id.to_string());
        self.pending = None;
        self.last_save = Some(Instant::now());
        Ok(presentation)
    }

    /// Fetch the last saved presentation from storage so that
    /// [`Persistence::load_last`] can hand it to the editor.
    /// Returns whether one was found.
    pub async fn restore(&mut self) -> bool {
        match self.storage.load(LAST_DOCUMENT_KEY).await {
            Ok(presentation) => {
                self.restored = Some(presentation);
                self.last_save = Some(Instant::now());
                true
            }
            Err(err) => {
                log::info!("No presentation to restore: {}", err);
                false
            }
        }
    }

    pub async fn delete(&self, id: &str) -> StorageResult<()> {
        self.storage.delete(id).await
    }

    /// All stored ids except the last-presentation slot.
    pub async fn list_documents(&self) -> StorageResult<Vec<String>> {
        let mut ids = self.storage.list().await?;
        ids.retain(|id| id != LAST_DOCUMENT_KEY);
        Ok(ids)
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }
}

impl<S: Storage> Persistence for AutoSaveManager<S> {
    fn save_current(&mut self, presentation: &Presentation) {
        self.pending = Some(presentation.clone());
    }

    fn load_last(&mut self) -> Option<Presentation> {
        self.restored.take().or_else(|| self.pending.clone())
    }
}

/// Auto-save manager over the default on-disk location.
#[cfg(not(target_arch = "wasm32"))]
pub fn create_autosave_manager() -> StorageResult<AutoSaveManager<super::FileStorage>> {
    let storage = super::FileStorage::default_location()?;
    Ok(AutoSaveManager::new(Arc::new(storage)))
}
