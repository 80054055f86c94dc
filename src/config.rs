use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::error::{Error, Result};

/// Size of each platform chunk fetch (512 KB).
pub const CHUNK_SIZE: u64 = 512 * 1024;

/// Maximum in-flight units of work a session accepts before it stops being selectable.
pub const DEFAULT_SESSION_CAPACITY: u32 = 100;

/// Page size used when a catalog listing omits `limit`.
pub const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Upper bound on the page size a catalog listing may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// Content type served when neither the catalog nor the platform knows better.
pub const FALLBACK_CONTENT_TYPE: &str = "audio/mpeg";

/// Top-level configuration for the streaming engine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Credential of the primary session.
    pub primary_credential: String,
    /// Credentials of the worker sessions.
    pub worker_credentials: Vec<String>,
    /// Base URL of the platform file gateway.
    pub gateway_url: String,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Path of the SQLite catalog.
    pub catalog_path: String,
    /// Size of each chunk fetch in bytes.
    pub chunk_size: u64,
    /// Per-session workload ceiling.
    pub session_capacity: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_credential: String::new(),
            worker_credentials: Vec::new(),
            gateway_url: "http://127.0.0.1:8081".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            catalog_path: "catalog.db".to_string(),
            chunk_size: CHUNK_SIZE,
            session_capacity: DEFAULT_SESSION_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Load a JSON configuration file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|e| {
            Error::Configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load the configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Recognised keys: `PRIMARY_TOKEN`, `WORKER_TOKENS` (JSON array),
    /// `GATEWAY_URL`, `PORT`, `CATALOG_PATH`, `SESSION_CAPACITY`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        config.primary_credential = lookup("PRIMARY_TOKEN").unwrap_or_default();

        if let Some(raw) = lookup("WORKER_TOKENS").filter(|v| !v.trim().is_empty()) {
            match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(tokens) => config.worker_credentials = tokens,
                // Unparseable list: run primary-only.
                Err(e) => warn!("ignoring WORKER_TOKENS, not a JSON string array: {}", e),
            }
        }

        if let Some(url) = lookup("GATEWAY_URL") {
            config.gateway_url = url;
        }
        if let Some(port) = lookup("PORT") {
            let port: u16 = port
                .trim()
                .parse()
                .map_err(|_| Error::Configuration(format!("PORT is not a port number: {}", port)))?;
            config.bind_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(path) = lookup("CATALOG_PATH") {
            config.catalog_path = path;
        }
        if let Some(capacity) = lookup("SESSION_CAPACITY") {
            config.session_capacity = capacity.trim().parse().map_err(|_| {
                Error::Configuration(format!("SESSION_CAPACITY is not a number: {}", capacity))
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.primary_credential.trim().is_empty() {
            return Err(Error::Configuration(
                "primary credential is missing".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(Error::Configuration("chunk_size must be positive".to_string()));
        }
        if self.session_capacity == 0 {
            return Err(Error::Configuration(
                "session_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
