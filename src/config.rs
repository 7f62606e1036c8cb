//! # Configuration
//!
//! The proxy reads one JSON file at startup:
//!
//! ```json
//! {
//!   "gopath": "/var/lib/modproxy",
//!   "http": ["corp.example/internal"],
//!   "replace": {"example.com": "upstream.io"}
//! }
//! ```
//!
//! - `gopath` — base directory for the caches. When empty, the `GOPATH`
//!   environment variable is consulted (first `:`-separated element), then
//!   `$HOME/go`.
//! - `http` — module-path prefixes the resolver may contact over plain HTTP.
//! - `replace` — the alias table: client prefix → upstream prefix.
//!
//! The parsed config is turned into runtime state exactly once at startup
//! (see [`crate::server::build_state`]); nothing re-reads it afterwards.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ProxyResult;

/// Startup configuration for the proxy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Base directory for the module caches; empty means "derive from the
    /// environment".
    #[serde(default)]
    pub gopath: String,

    /// Module-path prefixes that may be fetched over plain HTTP.
    #[serde(rename = "http", default)]
    pub http_prefixes: Vec<String>,

    /// Alias table: client-visible prefix → upstream prefix.
    #[serde(default)]
    pub replace: HashMap<String, String>,
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> ProxyResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration from a JSON file, falling back to defaults if the
    /// file does not exist.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> ProxyResult<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the cache base directory.
    pub fn resolve_gopath(&self) -> PathBuf {
        if !self.gopath.is_empty() {
            return PathBuf::from(&self.gopath);
        }
        if let Ok(env_path) = std::env::var("GOPATH") {
            if let Some(first) = env_path.split(':').find(|p| !p.is_empty()) {
                return PathBuf::from(first);
            }
        }
        let home = std::env::var("HOME").unwrap_or_default();
        Path::new(&home).join("go")
    }
}
