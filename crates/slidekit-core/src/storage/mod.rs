//! Storage abstraction for persistence.
//!
//! The editor only sees [`Persistence`]: a synchronous, non-blocking
//! "save current" and "load last". Actual I/O happens behind a [`Storage`]
//! backend, driven by the host through [`AutoSaveManager`].

mod autosave;
mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod file;

pub use autosave::{AutoSaveManager, DEFAULT_AUTOSAVE_INTERVAL_SECS, LAST_DOCUMENT_KEY};
pub use memory::MemoryStorage;

#[cfg(not(target_arch = "wasm32"))]
pub use autosave::create_autosave_manager;
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;

use crate::document::Presentation;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Trait for presentation storage backends.
///
/// On native platforms, implementations must be Send + Sync.
/// On WASM, these bounds are relaxed since it's single-threaded.
#[cfg(not(target_arch = "wasm32"))]
pub trait Storage: Send + Sync {
    /// Save a presentation.
    fn save(&self, id: &str, presentation: &Presentation) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a presentation.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Presentation>>;

    /// Delete a presentation.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all stored IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a presentation exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

/// Trait for presentation storage backends (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait Storage {
    /// Save a presentation.
    fn save(&self, id: &str, presentation: &Presentation) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a presentation.
    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Presentation>>;

    /// Delete a presentation.
    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all stored IDs.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a presentation exists.
    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>>;
}

/// The editor's persistence collaborator. Both calls must return
/// immediately; any I/O is the implementation's business.
pub trait Persistence {
    /// Record the current document as the one to save.
    fn save_current(&mut self, presentation: &Presentation);

    /// The last saved document, if one is available.
    fn load_last(&mut self) -> Option<Presentation>;
}

/// Persistence that keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPersistence;

impl Persistence for NoPersistence {
    fn save_current(&mut self, _presentation: &Presentation) {}

    fn load_last(&mut self) -> Option<Presentation> {
        None
    }
}

#[cfg(test)]
pub(crate) fn block_on<F: std::future::Future>(f: F) -> F::Output {
    use std::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};

    fn dummy_raw_waker() -> RawWaker {
        fn no_op(_: *const ()) {}
        fn clone(_: *const ()) -> RawWaker {
            dummy_raw_waker()
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, no_op, no_op, no_op);
        RawWaker::new(std::ptr::null(), &VTABLE)
    }

    let waker = unsafe { Waker::from_raw(dummy_raw_waker()) };
    let mut cx = Context::from_waker(&waker);
    let mut f = std::pin::pin!(f);

    loop {
        if let Poll::Ready(result) = f.as_mut().poll(&mut cx) {
            return result;
        }
    }
}
