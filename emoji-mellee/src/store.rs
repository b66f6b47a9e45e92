use crate::error::Result;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

// Local persistence behind one injectable trait: a string key-value area for JSON documents
// and a blob area for card images keyed by card id.

pub trait Storage {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> Result<()>;
    fn remove(&mut self, key: &str) -> Result<()>;
    fn put_blob(&mut self, id: &str, bytes: &[u8]) -> Result<()>;
    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>>;
    fn delete_blob(&mut self, id: &str) -> Result<()>;

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

pub fn load_json<T: DeserializeOwned>(store: &dyn Storage, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_json<T: Serialize + ?Sized>(store: &mut dyn Storage, key: &str, value: &T) -> Result<()> {
    let raw = serde_json::to_string(value)?;
    store.set(key, &raw)
}

/// In-process store. An optional byte quota makes writes fail the way a full browser store does.
#[derive(Default, Debug)]
pub struct MemoryStorage {
    entries: HashMap<String, String>,
    blobs: HashMap<String, Vec<u8>>,
    quota: Option<usize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    #[cfg(test)]
    pub(crate) fn set_quota(&mut self, quota: Option<usize>) {
        self.quota = quota;
    }

    fn used_without(&self, key: &str) -> usize {
        let entries: usize = self
            .entries
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(k, v)| k.len() + v.len())
            .sum();
        let blobs: usize = self
            .blobs
            .iter()
            .filter(|(k, _)| k.as_str() != key)
            .map(|(_, v)| v.len())
            .sum();
        entries + blobs
    }

    fn check_quota(&self, key: &str, incoming: usize) -> Result<()> {
        if let Some(quota) = self.quota {
            if self.used_without(key) + incoming > quota {
                return Err(io::Error::other("storage quota exceeded").into());
            }
        }
        Ok(())
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.check_quota(key, key.len() + value.len())?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }

    fn put_blob(&mut self, id: &str, bytes: &[u8]) -> Result<()> {
        self.check_quota(id, bytes.len())?;
        self.blobs.insert(id.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.get(id).cloned())
    }

    fn delete_blob(&mut self, id: &str) -> Result<()> {
        self.blobs.remove(id);
        Ok(())
    }
}

/// Directory-backed store: `kv.json` holds every entry, `blobs/` one file per image.
#[derive(Debug)]
pub struct FileStorage {
    root: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStorage {
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("blobs"))?;
        let index = root.join("kv.json");
        let entries = if index.exists() {
            let raw = fs::read_to_string(&index)?;
            match serde_json::from_str(&raw) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("unreadable store index {}: {}, starting empty", index.display(), e);
                    BTreeMap::new()
                }
            }
        } else {
            BTreeMap::new()
        };
        debug!("opened store at {} with {} entries", root.display(), entries.len());
        Ok(Self { root, entries })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, id: &str) -> PathBuf {
        let name: String = id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.root.join("blobs").join(name)
    }

    fn write_index(&self) -> Result<()> {
        let tmp = self.root.join("kv.json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(&self.entries)?)?;
        fs::rename(&tmp, self.root.join("kv.json"))?;
        Ok(())
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        self.write_index()
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        if self.entries.remove(key).is_some() {
            self.write_index()?;
        }
        Ok(())
    }

    fn put_blob(&mut self, id: &str, bytes: &[u8]) -> Result<()> {
        fs::write(self.blob_path(id), bytes)?;
        Ok(())
    }

    fn get_blob(&self, id: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.blob_path(id)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete_blob(&mut self, id: &str) -> Result<()> {
        match fs::remove_file(self.blob_path(id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.write_index()
    }
}
