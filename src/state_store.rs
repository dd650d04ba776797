//! The State Store collaborator contract (§6): save/load a small typed
//! value under a string key. The kernel uses this for
//! `last_check_<taskName>` timestamps; a missing key is a no-op, not an
//! error.

use std::path::PathBuf;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};

use crate::os_provider::{OpenFlags, OsProvider};
use crate::Result;

pub trait StateStore: Send + Sync {
    fn save_json(&self, key: &str, value: &serde_json::Value) -> Result<()>;
    fn load_json(&self, key: &str) -> Result<Option<serde_json::Value>>;
}

/// Convenience helpers generic over the stored type, mirroring the
/// `Save(key, value)` / `Load(key, &out)` contract from §6.
pub trait StateStoreExt: StateStore {
    fn save<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let encoded = serde_json::to_value(value)?;
        self.save_json(key, &encoded)
    }

    fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.load_json(key)? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }
}

impl<S: StateStore + ?Sized> StateStoreExt for S {}

/// File-per-key JSON state store: `<dir>/<key>.json`.
pub struct JsonFileStateStore {
    dir: PathBuf,
    os: Arc<dyn OsProvider>,
}

impl JsonFileStateStore {
    pub fn new(dir: impl Into<PathBuf>, os: Arc<dyn OsProvider>) -> Result<Self> {
        let dir = dir.into();
        os.mkdir_all(&dir).map_err(|e| crate::Error::io(&dir, e))?;
        Ok(JsonFileStateStore { dir, os })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StateStore for JsonFileStateStore {
    fn save_json(&self, key: &str, value: &serde_json::Value) -> Result<()> {
        let path = self.path_for(key);
        let bytes = serde_json::to_vec_pretty(value)?;
        let mut handle = self
            .os
            .open_file(&path, OpenFlags::create_truncate_write())
            .map_err(|e| crate::Error::io(&path, e))?;
        use std::io::Write;
        handle.write_all(&bytes).map_err(|e| crate::Error::io(&path, e))?;
        handle.sync_all().map_err(|e| crate::Error::io(&path, e))?;
        Ok(())
    }

    fn load_json(&self, key: &str) -> Result<Option<serde_json::Value>> {
        let path = self.path_for(key);
        match self.os.read_file(&path) {
            Ok(bytes) => {
                if bytes.is_empty() {
                    return Ok(None);
                }
                Ok(Some(serde_json::from_slice(&bytes)?))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(crate::Error::io(&path, e)),
        }
    }
}
