use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use anyhow::Context;

use crate::foundation::error::{ArcraftError, ArcraftResult};

/// Flat string key/value persistence.
///
/// Writes may fail at any time (quota, disk, permissions); callers treat that as degraded
/// persistence, never as fatal.
pub trait KvBackend {
    fn get(&self, key: &str) -> ArcraftResult<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> ArcraftResult<()>;
    fn remove(&mut self, key: &str) -> ArcraftResult<()>;
}

/// In-process backend with an optional byte quota over all stored values.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    entries: BTreeMap<String, String>,
    quota_bytes: Option<usize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: usize) -> Self {
        Self {
            entries: BTreeMap::new(),
            quota_bytes: Some(quota_bytes),
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn used_bytes_without(&self, key: &str) -> usize {
        self.entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }
}

impl KvBackend for MemoryBackend {
    fn get(&self, key: &str) -> ArcraftResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> ArcraftResult<()> {
        if let Some(quota) = self.quota_bytes {
            let needed = self.used_bytes_without(key) + key.len() + value.len();
            if needed > quota {
                return Err(ArcraftError::storage_write_failed(format!(
                    "quota exceeded writing '{key}' ({needed} > {quota} bytes)"
                )));
            }
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> ArcraftResult<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Directory-backed store: one `<key>.json` file per key.
#[derive(Clone, Debug)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn open(root: impl Into<PathBuf>) -> ArcraftResult<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("create store directory '{}'", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> ArcraftResult<PathBuf> {
        if key.is_empty()
            || !key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ArcraftError::validation(format!(
                "store key '{key}' is not a plain file name"
            )));
        }
        Ok(self.root.join(format!("{key}.json")))
    }
}

impl KvBackend for FileBackend {
    fn get(&self, key: &str) -> ArcraftResult<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(anyhow::Error::new(e)
                .context(format!("read '{}'", path.display()))
                .into()),
        }
    }

    fn set(&mut self, key: &str, value: &str) -> ArcraftResult<()> {
        let path = self.path_for(key)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(|e| {
            ArcraftError::storage_write_failed(format!("write '{}': {e}", tmp.display()))
        })?;
        std::fs::rename(&tmp, &path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            ArcraftError::storage_write_failed(format!("replace '{}': {e}", path.display()))
        })
    }

    fn remove(&mut self, key: &str) -> ArcraftResult<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ArcraftError::storage_write_failed(format!(
                "remove '{}': {e}",
                path.display()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_quota_rejects_writes_but_allows_replacing_smaller() {
        let mut b = MemoryBackend::with_quota(20);
        b.set("k", "0123456789").unwrap();
        assert!(matches!(
            b.set("other", "0123456789abcdef"),
            Err(ArcraftError::StorageWriteFailed(_))
        ));
        b.set("k", "01234").unwrap();
        assert_eq!(b.get("k").unwrap().as_deref(), Some("01234"));
        assert_eq!(b.get("other").unwrap(), None);
    }

    #[test]
    fn file_backend_round_trip_and_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = FileBackend::open(dir.path().join("store")).unwrap();
        assert_eq!(b.get("ar_x").unwrap(), None);
        b.set("ar_x", "{\"a\":1}").unwrap();
        assert_eq!(b.get("ar_x").unwrap().as_deref(), Some("{\"a\":1}"));
        b.remove("ar_x").unwrap();
        b.remove("ar_x").unwrap();
        assert_eq!(b.get("ar_x").unwrap(), None);
    }

    #[test]
    fn file_backend_rejects_path_like_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = FileBackend::open(dir.path()).unwrap();
        assert!(b.set("../escape", "x").is_err());
        assert!(b.get("a/b").is_err());
    }
}
