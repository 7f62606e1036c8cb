//! # Module-Download Proxy
//!
//! A caching, rewriting HTTP proxy for the module-download protocol. Clients
//! address modules by import path and version; the proxy answers the
//! protocol's endpoints — version list, version info, manifest, and source
//! zip — out of an on-disk cache, filling misses through a pluggable module
//! resolver.
//!
//! An administrator-supplied alias table can redirect one module namespace to
//! another (for example serving content from a mirror). Aliased artifacts are
//! *republished*: the manifest's `module` declaration and the archive's
//! top-level directory are rewritten so the bytes a client receives identify
//! themselves under the path the client asked for.
//!
//! ## Key modules
//!
//! - [`proxy`]: the request pipeline — URL parsing, cache fill, republishing
//! - [`alias`]: longest-prefix rewrite table
//! - [`storage`]: append-only cache store with atomic writes
//! - [`resolver`]: the facade the pipeline fills cache misses through
//! - [`upstream`]: production resolver speaking the protocol to an upstream
//! - [`server`]: router assembly and startup
//! - [`config`]: the JSON startup configuration
//! - [`error`]: error kinds and their protocol mapping

pub mod alias;
pub mod archive;
pub mod cli;
pub mod config;
pub mod encoding;
pub mod error;
pub mod hash_utils;
pub mod proxy;
pub mod resolver;
pub mod server;
pub mod state;
pub mod storage;
pub mod upstream;

pub use alias::{AliasMatch, AliasTable};
pub use config::Config;
pub use error::{ProxyError, ProxyResult};
pub use resolver::{ModuleResolver, RevInfo};
pub use server::{build_state, router, run_server, run_server_with_shutdown};
pub use state::AppState;
pub use upstream::{ProxyResolver, UpstreamConfig};
