//! File-based storage implementation for native platforms.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use crate::document::Presentation;
use std::fs;
use std::path::{Path, PathBuf};

/// Stores presentations as JSON files in a directory.
pub struct FileStorage {
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a file storage rooted at `base_path`, creating the directory
    /// if needed.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path)
                .map_err(|e| StorageError::Io(format!("Failed to create storage directory: {}", e)))?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/slidekit/presentations/`
    /// On Windows: `%LOCALAPPDATA%\slidekit\presentations\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("slidekit").join("presentations"))
    }

    /// File path for an id. Characters outside `[A-Za-z0-9_-]` become `_`.
    fn presentation_path(&self, id: &str) -> PathBuf {
        let safe_id: String = id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_id))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save(&self, id: &str, presentation: &Presentation) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.presentation_path(id);
        let json = presentation.to_json();
        Box::pin(async move {
            let json = json.map_err(|e| StorageError::Serialization(e.to_string()))?;
            fs::write(&path, json).map_err(|e| StorageError::Io(format!("Failed to write {}: {}", path.display(), e)))
        })
    }

    fn load(&self, id: &str) -> BoxFuture<'_, StorageResult<Presentation>> {
        let path = self.presentation_path(id);
        let id = id.to_string();
        Box::pin(async move {
            if !path.exists() {
                return Err(StorageError::NotFound(id));
            }
            let json = fs::read_to_string(&path)
                .map_err(|e| StorageError::Io(format!("Failed to read {}: {}", path.display(), e)))?;
            Presentation::from_json(&json)
                .map_err(|e| StorageError::Serialization(format!("Failed to parse {}: {}", path.display(), e)))
        })
    }

    fn delete(&self, id: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.presentation_path(id);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path)
                    .map_err(|e| StorageError::Io(format!("Failed to delete {}: {}", path.display(), e)))?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries = fs::read_dir(&base).map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;
            let ids = entries
                .flatten()
                .map(|entry| entry.path())
                .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
                .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(str::to_string))
                .collect();
            Ok(ids)
        })
    }

    fn exists(&self, id: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.presentation_path(id);
        Box::pin(async move { Ok(path.exists()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ElementKind;
    use crate::storage::block_on;
    use serde_json::json;

    #[test]
    fn test_roundtrip_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().join("decks")).unwrap();

        let mut doc = Presentation::default();
        let slide = doc.slides[0].id.clone();
        doc.add_element(&slide, ElementKind::Text, json!("Hello"), 24.0).unwrap();

        block_on(storage.save("deck-1", &doc)).unwrap();
        assert!(dir.path().join("decks").join("deck-1.json").exists());
        assert_eq!(block_on(storage.load("deck-1")).unwrap(), doc);
        assert_eq!(block_on(storage.list()).unwrap(), vec!["deck-1".to_string()]);
    }

    #[test]
    fn test_ids_are_sanitized() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        block_on(storage.save("../escape", &Presentation::default())).unwrap();
        assert!(dir.path().join("___escape.json").exists());
    }

    #[test]
    fn test_missing_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(block_on(storage.load("x")), Err(StorageError::NotFound(_))));

        block_on(storage.save("x", &Presentation::default())).unwrap();
        block_on(storage.delete("x")).unwrap();
        assert!(!block_on(storage.exists("x")).unwrap());
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        assert!(matches!(block_on(storage.load("bad")), Err(StorageError::Serialization(_))));
    }
}
