//! # Application State
//!
//! Shared state handed to every request handler. Built once at startup from
//! the resolved configuration and wrapped in an `Arc`; nothing in it mutates
//! after construction except the coordination primitives (the in-flight fill
//! map and the two republish mutexes).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::alias::AliasTable;
use crate::proxy::FlightGroup;
use crate::resolver::ModuleResolver;

/// Shared per-process state for the proxy.
pub struct AppState {
    /// Root of the download cache (`<gopath>/pkg/mod/cache/download`).
    pub download_root: PathBuf,
    /// Root of the extracted module trees (`<gopath>/pkg/mod`).
    pub module_root: PathBuf,
    /// Alias table, immutable after startup.
    pub aliases: AliasTable,
    /// Resolver used to fill cache misses.
    pub resolver: Arc<dyn ModuleResolver>,
    /// Per-artifact locks serializing concurrent identical cache fills.
    pub flights: FlightGroup,
    /// Serializes zip republishing; held only for the materialization step.
    pub zip_lock: Mutex<()>,
    /// Serializes manifest republishing, independently of `zip_lock`.
    pub mod_lock: Mutex<()>,
}

impl AppState {
    /// Assemble the state for a cache rooted under `gopath`.
    pub fn new(gopath: &Path, aliases: AliasTable, resolver: Arc<dyn ModuleResolver>) -> Self {
        let module_root = gopath.join("pkg").join("mod");
        Self {
            download_root: module_root.join("cache").join("download"),
            module_root,
            aliases,
            resolver,
            flights: FlightGroup::default(),
            zip_lock: Mutex::new(()),
            mod_lock: Mutex::new(()),
        }
    }
}
