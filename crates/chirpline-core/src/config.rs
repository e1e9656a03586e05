//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! which backend to talk to, where tokens are kept, and a few behaviour
//! switches for the session.
//!
//! Configuration is stored at `~/.config/chirpline/config.json`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiClient, ClientConfig};
use crate::auth::{
    FileTokenStore, KeyringTokenStore, MemoryTokenStore, RegisterPolicy, SessionController,
    TokenStore,
};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "chirpline";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Backend origin for local development
const DEVELOPMENT_ORIGIN: &str = "http://localhost:8001";

/// Backend origin for the hosted deployment
const PRODUCTION_ORIGIN: &str = "https://twitter-backend-i09m.onrender.com";

/// REST endpoints live under this path on the backend origin
const API_PATH: &str = "/api";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Production,
}

impl Environment {
    pub fn backend_origin(&self) -> &'static str {
        match self {
            Environment::Development => DEVELOPMENT_ORIGIN,
            Environment::Production => PRODUCTION_ORIGIN,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Some(Environment::Development),
            "production" | "prod" => Some(Environment::Production),
            _ => None,
        }
    }
}

/// Where the token pair is persisted
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenStorage {
    /// `tokens.json` in the cache directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Process memory only; every run starts signed out
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub environment: Environment,
    /// Overrides the environment's `<origin>/api`
    pub api_base_url: Option<String>,
    /// Overrides the environment's origin for avatar and image URLs
    pub media_origin: Option<String>,
    pub last_username: Option<String>,
    pub token_storage: TokenStorage,
    pub register_policy: RegisterPolicy,
    pub coalesce_refresh: bool,
    pub request_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            api_base_url: None,
            media_origin: None,
            last_username: None,
            token_storage: TokenStorage::default(),
            register_policy: RegisterPolicy::default(),
            coalesce_refresh: false,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Apply `CHIRPLINE_ENV` and `CHIRPLINE_API_URL` on top of the file
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(
            std::env::var("CHIRPLINE_ENV").ok().as_deref(),
            std::env::var("CHIRPLINE_API_URL").ok(),
        );
    }

    fn apply_overrides(&mut self, environment: Option<&str>, api_base_url: Option<String>) {
        if let Some(name) = environment {
            match Environment::from_name(name) {
                Some(env) => self.environment = env,
                None => tracing::warn!(value = name, "Ignoring unknown CHIRPLINE_ENV"),
            }
        }
        if let Some(url) = api_base_url.filter(|u| !u.trim().is_empty()) {
            self.api_base_url = Some(url);
        }
    }

    pub fn api_base_url(&self) -> String {
        match &self.api_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("{}{}", self.environment.backend_origin(), API_PATH),
        }
    }

    pub fn media_origin(&self) -> String {
        match &self.media_origin {
            Some(origin) => origin.trim_end_matches('/').to_string(),
            None => self.environment.backend_origin().to_string(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_base_url())
            .with_timeout(self.request_timeout())
            .with_coalesced_refresh(self.coalesce_refresh)
    }

    pub fn token_store(&self) -> Result<Arc<dyn TokenStore>> {
        let store: Arc<dyn TokenStore> = match self.token_storage {
            TokenStorage::File => Arc::new(FileTokenStore::new(&self.cache_dir()?)),
            TokenStorage::Keyring => Arc::new(KeyringTokenStore::default()),
            TokenStorage::Memory => Arc::new(MemoryTokenStore::new()),
        };
        debug!(storage = ?self.token_storage, "Token store configured");
        Ok(store)
    }

    /// Wire up token store, API client and session controller from this
    /// configuration. The session starts in `Loading` and already follows
    /// sign-in-required events, so it must be built inside a tokio runtime.
    pub fn build_session(&self) -> Result<Arc<SessionController>> {
        let api = ApiClient::new(self.client_config(), self.token_store()?)
            .context("Failed to build HTTP client")?;
        Ok(SessionController::spawn(api, self.register_policy))
    }
}
