//! Module resolver facade.
//!
//! The proxy never talks to source-control origins itself; it delegates to a
//! resolver behind this trait. The production implementation lives in
//! [`crate::upstream`]; tests drive the pipeline through a fake. Everything
//! the rest of the crate knows about module resolution is on this seam.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ProxyResult;

/// Revision metadata for a resolved module version.
///
/// Serialized as the protocol's `.info` JSON: `{"Version":…,"Time":…}`.
/// `version` is always a concrete version string, never `latest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevInfo {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Time")]
    pub time: DateTime<Utc>,
}

/// Narrow interface to the module-resolution machinery.
///
/// All methods take the module path on the upstream (post-alias) side. Each
/// implementation is responsible for materializing the advertised cache files
/// atomically — the proxy relies on "absent or complete" when it checks the
/// cache after a call returns.
#[async_trait]
pub trait ModuleResolver: Send + Sync {
    /// Download and extract the module source tree.
    ///
    /// Returns the extracted directory. As a side effect the download cache
    /// gains `.zip`, `.ziphash`, `.info` and `.mod` for the version.
    async fn fetch(&self, path: &str, version: &str) -> ProxyResult<PathBuf>;

    /// Resolve `version` (a concrete version or `latest`) to revision info.
    ///
    /// As a side effect the download cache gains `.info` and `.mod` under the
    /// resolved concrete version.
    async fn query(&self, path: &str, version: &str) -> ProxyResult<RevInfo>;

    /// List the versions known for a module, oldest first.
    async fn versions(&self, path: &str) -> ProxyResult<Vec<String>>;
}
