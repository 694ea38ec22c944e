use std::fs;
use std::path::{Path, PathBuf};

use super::KeyValueStore;
use crate::error::{EaselError, Result};

pub const EASEL_DIR: &str = ".easel";

/// Key-value store backed by one JSON file per key inside `.easel/`.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Initialize a new easel project
    pub fn init(root: &Path) -> Result<Self> {
        let dir = root.join(EASEL_DIR);

        if dir.exists() {
            return Err(EaselError::AlreadyInitialized);
        }

        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Open an existing easel project
    pub fn open(root: &Path) -> Result<Self> {
        let dir = root.join(EASEL_DIR);

        if !dir.is_dir() {
            return Err(EaselError::NotInitialized);
        }

        Ok(Self { dir })
    }

    pub fn easel_dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
            && !key.starts_with('.');
        if !valid {
            return Err(EaselError::Config(format!("invalid storage key '{}'", key)));
        }
        Ok(self.dir.join(format!("{}.json", key)))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Writes go to a sibling temp file first, so a crash mid-write never
    /// leaves a truncated collection behind.
    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_creates_easel_directory() {
        let tmp = TempDir::new().unwrap();
        let _store = FileStore::init(tmp.path()).unwrap();

        assert!(tmp.path().join(".easel").is_dir());
    }

    #[test]
    fn test_init_fails_if_already_initialized() {
        let tmp = TempDir::new().unwrap();
        FileStore::init(tmp.path()).unwrap();

        let result = FileStore::init(tmp.path());
        assert!(matches!(result, Err(EaselError::AlreadyInitialized)));
    }

    #[test]
    fn test_open_fails_if_not_initialized() {
        let tmp = TempDir::new().unwrap();

        let result = FileStore::open(tmp.path());
        assert!(matches!(result, Err(EaselError::NotInitialized)));
    }

    #[test]
    fn test_set_then_get_after_reopen() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileStore::init(tmp.path()).unwrap();
        assert_eq!(store.get("canvas-notes").unwrap(), None);

        store.set("canvas-notes", "[]").unwrap();
        store.set("canvas-notes", "[1]").unwrap();

        let reopened = FileStore::open(tmp.path()).unwrap();
        assert_eq!(reopened.get("canvas-notes").unwrap().as_deref(), Some("[1]"));
        assert!(!tmp.path().join(".easel/canvas-notes.json.tmp").exists());
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let tmp = TempDir::new().unwrap();
        let mut store = FileStore::init(tmp.path()).unwrap();

        assert!(store.set("../escape", "x").is_err());
        assert!(store.get("").is_err());
    }
}
