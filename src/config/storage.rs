//! Credentials file backing the token store

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};

use super::Config;
use crate::auth::Storage;

/// Key/value credentials persisted as TOML.
///
/// Reads are served from memory; every write goes through to disk.
pub struct FileStorage {
    path: PathBuf,
    cache: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// Open the credentials file in the platform data directory
    pub fn open_default() -> Result<Self> {
        Self::open(Config::credentials_path()?)
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let entries = if path.exists() {
            let content = fs::read_to_string(&path).context("Failed to read credentials file")?;
            toml::from_str(&content).context("Failed to parse credentials file")?
        } else {
            BTreeMap::new()
        };

        Ok(Self {
            path,
            cache: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir).context("Failed to create data directory")?;
        }

        let content = toml::to_string_pretty(entries).context("Failed to serialize credentials")?;
        fs::write(&self.path, content).context("Failed to write credentials file")?;

        // Set restrictive permissions on credentials file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(&self.path, perms)
                .context("Failed to set credentials permissions")?;
        }

        Ok(())
    }

    fn persist_or_warn(&self, entries: &BTreeMap<String, String>) {
        if let Err(e) = self.persist(entries) {
            tracing::warn!("Credentials not saved to {}: {:#}", self.path.display(), e);
        }
    }
}

impl Storage for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        let guard = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        guard.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        let mut guard = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        guard.insert(key.to_string(), value.to_string());
        self.persist_or_warn(&guard);
    }

    fn remove(&self, key: &str) {
        let mut guard = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if guard.remove(key).is_some() {
            self.persist_or_warn(&guard);
        }
    }
}
