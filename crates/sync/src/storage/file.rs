//! JSON-file storage backend.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::{Cookie, CookieJar, KeyValueStore, StorageError};

/// On-disk layout of a profile.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ProfileData {
    #[serde(default)]
    items: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, Cookie>,
}

/// A browser-like profile persisted as a single JSON file.
///
/// Every operation re-reads the file so that several processes pointed at
/// the same profile see each other's writes, with the same last-writer-wins
/// behavior as shared browser storage.
#[derive(Debug)]
pub struct FileProfile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileProfile {
    /// Open (or lazily create) a profile at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Location of the profile file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<ProfileData, StorageError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(ProfileData::default()),
            Ok(contents) => Ok(serde_json::from_str(&contents)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(ProfileData::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, data: &ProfileData) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_vec_pretty(data)?)?;
        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut ProfileData)) -> Result<(), StorageError> {
        let _guard = self.lock.lock();
        let mut data = self.load()?;
        f(&mut data);
        self.save(&data)
    }
}

impl KeyValueStore for FileProfile {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        Ok(self.load()?.items.remove(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.update(|data| {
            data.items.insert(key.to_string(), value.to_string());
        })
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.update(|data| {
            data.items.remove(key);
        })
    }
}

impl CookieJar for FileProfile {
    fn get_cookie(&self, name: &str) -> Result<Option<String>, StorageError> {
        let _guard = self.lock.lock();
        let now = Utc::now();
        Ok(self
            .load()?
            .cookies
            .remove(name)
            .filter(|cookie| !cookie.is_expired_at(now))
            .map(|cookie| cookie.value))
    }

    fn set_cookie(&self, cookie: Cookie) -> Result<(), StorageError> {
        let now = Utc::now();
        self.update(|data| {
            data.cookies.retain(|_, existing| !existing.is_expired_at(now));
            data.cookies.insert(cookie.name.clone(), cookie);
        })
    }

    fn remove_cookie(&self, name: &str) -> Result<(), StorageError> {
        self.update(|data| {
            data.cookies.remove(name);
        })
    }

    fn live_cookies(&self) -> Result<Vec<Cookie>, StorageError> {
        let _guard = self.lock.lock();
        let now = Utc::now();
        Ok(self
            .load()?
            .cookies
            .into_values()
            .filter(|cookie| !cookie.is_expired_at(now))
            .collect())
    }
}
