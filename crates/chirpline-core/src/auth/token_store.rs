use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use keyring::Entry;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::TokenPair;

/// Storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Storage key for the refresh token
pub const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Token file name in cache directory
const TOKEN_FILE: &str = "tokens.json";

/// Keychain service name
const SERVICE_NAME: &str = "chirpline";

#[derive(Error, Debug)]
pub enum TokenStoreError {
    #[error("Failed to access token file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode tokens: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Keychain error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Persistent storage for the bearer token pair.
///
/// Tokens are opaque; nothing here looks inside them. Reads never fail:
/// an unreadable or empty entry is reported as absent.
pub trait TokenStore: Send + Sync {
    /// Persist both tokens
    fn save(&self, pair: &TokenPair) -> Result<(), TokenStoreError>;

    /// Replace the access token, keeping the stored refresh token
    fn save_access(&self, access: &str) -> Result<(), TokenStoreError>;

    fn load_access(&self) -> Option<String>;

    fn load_refresh(&self) -> Option<String>;

    /// Remove both tokens
    fn clear(&self) -> Result<(), TokenStoreError>;
}

/// On-disk and in-memory layout: two string entries under fixed keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(rename = "accessToken", default, skip_serializing_if = "Option::is_none")]
    access: Option<String>,
    #[serde(rename = "refreshToken", default, skip_serializing_if = "Option::is_none")]
    refresh: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ============================================================================
// In-memory
// ============================================================================

/// Tokens held for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<StoredTokens>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pair(pair: TokenPair) -> Self {
        Self {
            tokens: RwLock::new(StoredTokens {
                access: Some(pair.access),
                refresh: Some(pair.refresh),
            }),
        }
    }

    fn read(&self) -> StoredTokens {
        self.tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn write(&self, f: impl FnOnce(&mut StoredTokens)) {
        let mut guard = self
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard);
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        self.write(|t| {
            t.access = Some(pair.access.clone());
            t.refresh = Some(pair.refresh.clone());
        });
        Ok(())
    }

    fn save_access(&self, access: &str) -> Result<(), TokenStoreError> {
        self.write(|t| t.access = Some(access.to_string()));
        Ok(())
    }

    fn load_access(&self) -> Option<String> {
        non_empty(self.read().access)
    }

    fn load_refresh(&self) -> Option<String> {
        non_empty(self.read().refresh)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.write(|t| *t = StoredTokens::default());
        Ok(())
    }
}

// ============================================================================
// File
// ============================================================================

/// Tokens persisted as JSON in the cache directory. Survives restarts.
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes read-modify-write of the file within this process
    lock: Mutex<()>,
}

impl FileTokenStore {
    pub fn new(cache_dir: &Path) -> Self {
        Self {
            path: cache_dir.join(TOKEN_FILE),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> TokenStoreError {
        TokenStoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn read(&self) -> StoredTokens {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return StoredTokens::default(),
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to read token file");
                return StoredTokens::default();
            }
        };
        match serde_json::from_str(&contents) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(path = ?self.path, error = %e, "Failed to parse token file");
                StoredTokens::default()
            }
        }
    }

    fn write(&self, tokens: &StoredTokens) -> Result<(), TokenStoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let contents = serde_json::to_string_pretty(tokens)?;

        let mut options = std::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(&self.path).map_err(|e| self.io_error(e))?;

        // `mode` only applies when the file is created
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(|e| self.io_error(e))?;
        }

        file.write_all(contents.as_bytes())
            .map_err(|e| self.io_error(e))?;

        debug!(path = ?self.path, "Tokens written");
        Ok(())
    }

    fn guard(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        let _guard = self.guard();
        self.write(&StoredTokens {
            access: Some(pair.access.clone()),
            refresh: Some(pair.refresh.clone()),
        })
    }

    fn save_access(&self, access: &str) -> Result<(), TokenStoreError> {
        let _guard = self.guard();
        let mut tokens = self.read();
        tokens.access = Some(access.to_string());
        self.write(&tokens)
    }

    fn load_access(&self) -> Option<String> {
        let _guard = self.guard();
        non_empty(self.read().access)
    }

    fn load_refresh(&self) -> Option<String> {
        let _guard = self.guard();
        non_empty(self.read().refresh)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        let _guard = self.guard();
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

// ============================================================================
// OS keychain
// ============================================================================

/// Tokens stored in the OS keychain, one entry per key.
#[derive(Debug)]
pub struct KeyringTokenStore {
    service: String,
    // One entry per key, opened on first use
    entries: Mutex<HashMap<&'static str, Arc<Entry>>>,
}

impl Default for KeyringTokenStore {
    fn default() -> Self {
        Self::new(SERVICE_NAME)
    }
}

impl KeyringTokenStore {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    #[cfg(test)]
    fn with_entries(access: Entry, refresh: Entry) -> Self {
        let store = Self::new(SERVICE_NAME);
        {
            let mut entries = store.entries_guard();
            entries.insert(ACCESS_TOKEN_KEY, Arc::new(access));
            entries.insert(REFRESH_TOKEN_KEY, Arc::new(refresh));
        }
        store
    }

    fn entries_guard(&self) -> std::sync::MutexGuard<'_, HashMap<&'static str, Arc<Entry>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn entry(&self, key: &'static str) -> Result<Arc<Entry>, TokenStoreError> {
        let mut entries = self.entries_guard();
        if let Some(entry) = entries.get(key) {
            return Ok(Arc::clone(entry));
        }
        let entry = Arc::new(Entry::new(&self.service, key)?);
        entries.insert(key, Arc::clone(&entry));
        Ok(entry)
    }

    fn load(&self, key: &'static str) -> Option<String> {
        match self.entry(key).map(|entry| entry.get_password()) {
            Ok(Ok(value)) => non_empty(Some(value)),
            Ok(Err(keyring::Error::NoEntry)) => None,
            Ok(Err(e)) => {
                warn!(key, error = %e, "Failed to read token from keychain");
                None
            }
            Err(e) => {
                warn!(key, error = %e, "Failed to open keychain entry");
                None
            }
        }
    }

    fn delete(&self, key: &'static str) -> Result<(), TokenStoreError> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenStore for KeyringTokenStore {
    /// Writes the access entry, then the refresh entry. If the second write
    /// fails the access entry is put back, so the stored pair never mixes
    /// old and new tokens.
    fn save(&self, pair: &TokenPair) -> Result<(), TokenStoreError> {
        let access = self.entry(ACCESS_TOKEN_KEY)?;
        let refresh = self.entry(REFRESH_TOKEN_KEY)?;
        let previous = self.load(ACCESS_TOKEN_KEY);

        access.set_password(&pair.access)?;
        if let Err(e) = refresh.set_password(&pair.refresh) {
            let restored = match previous {
                Some(old) => access.set_password(&old),
                None => match access.delete_credential() {
                    Err(keyring::Error::NoEntry) => Ok(()),
                    other => other,
                },
            };
            if let Err(restore) = restored {
                warn!(error = %restore, "Failed to restore access token after partial save");
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn save_access(&self, access: &str) -> Result<(), TokenStoreError> {
        self.entry(ACCESS_TOKEN_KEY)?.set_password(access)?;
        Ok(())
    }

    fn load_access(&self) -> Option<String> {
        self.load(ACCESS_TOKEN_KEY)
    }

    fn load_refresh(&self) -> Option<String> {
        self.load(REFRESH_TOKEN_KEY)
    }

    fn clear(&self) -> Result<(), TokenStoreError> {
        self.delete(ACCESS_TOKEN_KEY)?;
        self.delete(REFRESH_TOKEN_KEY)
    }
}
