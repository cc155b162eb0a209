//! Persisted access token storage.
//!
//! The token lives under one fixed entry name, [`ACCESS_TOKEN_KEY`].
//! `FileTokenStore` keeps entries in a small JSON object on disk so the
//! token survives a restart and is gone only after an explicit `clear`.
//! `MemoryTokenStore` is the non-durable variant.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::ApiError;

/// Entry name the access token is stored under.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Durable home of the bearer token.
pub trait TokenStore: Send + Sync {
    fn load(&self) -> Result<Option<String>, ApiError>;
    fn save(&self, token: &str) -> Result<(), ApiError>;
    fn clear(&self) -> Result<(), ApiError>;
}

#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(token: &str) -> Self {
        Self {
            token: Mutex::new(Some(token.to_string())),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        let token = self.token.lock().map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(token.clone())
    }

    fn save(&self, token: &str) -> Result<(), ApiError> {
        let mut slot = self.token.lock().map_err(|e| ApiError::Storage(e.to_string()))?;
        *slot = Some(token.to_string());
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        let mut slot = self.token.lock().map_err(|e| ApiError::Storage(e.to_string()))?;
        *slot = None;
        Ok(())
    }
}

/// Token store backed by a JSON file of named entries. Entries other than
/// the access token are preserved on write.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    lock: Mutex<()>,
}

type Entries = BTreeMap<String, String>;

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(&self) -> Result<Entries, ApiError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(ApiError::Storage(e.to_string())),
        };
        if raw.trim().is_empty() {
            return Ok(Entries::new());
        }
        serde_json::from_str(&raw).map_err(|e| ApiError::Storage(e.to_string()))
    }

    fn write_entries(&self, entries: &Entries) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ApiError::Storage(e.to_string()))?;
        }
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|e| ApiError::Storage(e.to_string()))?;
        fs::write(&self.path, raw).map_err(|e| ApiError::Storage(e.to_string()))
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, ApiError> {
        let _guard = self.lock.lock().map_err(|e| ApiError::Storage(e.to_string()))?;
        Ok(self.read_entries()?.remove(ACCESS_TOKEN_KEY))
    }

    fn save(&self, token: &str) -> Result<(), ApiError> {
        let _guard = self.lock.lock().map_err(|e| ApiError::Storage(e.to_string()))?;
        let mut entries = self.read_entries()?;
        entries.insert(ACCESS_TOKEN_KEY.to_string(), token.to_string());
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<(), ApiError> {
        let _guard = self.lock.lock().map_err(|e| ApiError::Storage(e.to_string()))?;
        let mut entries = self.read_entries()?;
        if entries.remove(ACCESS_TOKEN_KEY).is_none() {
            return Ok(());
        }
        self.write_entries(&entries)
    }
}
