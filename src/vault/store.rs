//! Vault store: atomic read/write/list/delete of Markdown files under a
//! rooted directory, serialized by a single process-wide lock (grounded
//! on the write-temp-then-rename pattern used throughout this codebase's
//! directory-backed managers).

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

use crate::error::Result;

pub const DIR_LOGS: &str = "logs";
pub const DIR_TODOS_ACTIVE: &str = "todos/active";
pub const DIR_TODOS_DONE: &str = "todos/done";
pub const DIR_INSIGHTS: &str = "insights";
pub const DIR_CORE: &str = "core";
pub const DIR_CLASSIFIED: &str = "classified";

pub struct VaultStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

fn is_safe_name(name: &str) -> bool {
    !name.contains('/') && !name.contains("..") && !name.is_empty()
}

impl VaultStore {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    fn resolve(&self, dir: &str, name: &str) -> crate::error::Result<PathBuf> {
        if !is_safe_name(name) {
            return Err(crate::error::SoulAgentError::Validation(format!(
                "unsafe file name: {name}"
            )));
        }
        Ok(self.root.join(dir).join(name))
    }

    /// Returns file contents, or `None` if the file does not exist.
    pub fn read(&self, dir: &str, name: &str) -> Result<Option<String>> {
        let path = self.resolve(dir, name)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically write `content` to `dir/name`, creating `dir` on demand.
    pub fn write(&self, dir: &str, name: &str, content: &str) -> Result<()> {
        let path = self.resolve(dir, name)?;
        let _guard = self.write_lock.lock();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("md.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Removes a file, returning whether one was actually removed.
    pub fn delete(&self, dir: &str, name: &str) -> Result<bool> {
        let path = self.resolve(dir, name)?;
        let _guard = self.write_lock.lock();
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Lexicographically ordered list of `*.md` file names in `dir`.
    pub fn list(&self, dir: &str) -> Result<Vec<String>> {
        let path = self.root.join(dir);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = std::fs::read_dir(&path)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                if name.ends_with(".md") {
                    Some(name)
                } else {
                    None
                }
            })
            .collect();
        names.sort();
        Ok(names)
    }

    /// Convenience: write a short content-addressed note to `classified/`.
    /// The filename is deterministic from a hash of the text and source.
    pub fn ingest_text(&self, text: &str, source: &str) -> Result<String> {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        hasher.update(source.as_bytes());
        let digest = hasher.finalize();
        let hash16 = hex16(&digest);
        let name = format!("{hash16}.md");
        self.write(DIR_CLASSIFIED, &name, text)?;
        Ok(name)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

pub fn hex16(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

pub fn content_hash16(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex16(&hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> VaultStore {
        let dir = std::env::temp_dir().join(format!("vault-test-{}", uuid::Uuid::new_v4()));
        VaultStore::new(dir).unwrap()
    }

    #[test]
    fn test_write_read_roundtrip() {
        let store = temp_store();
        store.write(DIR_LOGS, "2026-03-01.md", "hello").unwrap();
        let content = store.read(DIR_LOGS, "2026-03-01.md").unwrap();
        assert_eq!(content, Some("hello".to_string()));
    }

    #[test]
    fn test_read_missing_returns_none() {
        let store = temp_store();
        let content = store.read(DIR_LOGS, "nope.md").unwrap();
        assert_eq!(content, None);
    }

    #[test]
    fn test_delete_returns_whether_removed() {
        let store = temp_store();
        store.write(DIR_LOGS, "x.md", "a").unwrap();
        assert!(store.delete(DIR_LOGS, "x.md").unwrap());
        assert!(!store.delete(DIR_LOGS, "x.md").unwrap());
    }

    #[test]
    fn test_list_is_sorted_and_filtered() {
        let store = temp_store();
        store.write(DIR_LOGS, "b.md", "").unwrap();
        store.write(DIR_LOGS, "a.md", "").unwrap();
        store.write(DIR_LOGS, "ignore.txt", "").unwrap();
        let names = store.list(DIR_LOGS).unwrap();
        assert_eq!(names, vec!["a.md".to_string(), "b.md".to_string()]);
    }

    #[test]
    fn test_rejects_path_traversal() {
        let store = temp_store();
        let result = store.write(DIR_LOGS, "../escape.md", "x");
        assert!(result.is_err());
    }

    #[test]
    fn test_ingest_text_deterministic_name() {
        let store = temp_store();
        let name1 = store.ingest_text("hello", "note").unwrap();
        let name2 = store.ingest_text("hello", "note").unwrap();
        assert_eq!(name1, name2);
    }
}
