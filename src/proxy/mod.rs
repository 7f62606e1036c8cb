//! The proxy request pipeline.
//!
//! This module ties the download protocol together: URL parsing, the
//! cache-lookup / fill-from-upstream control flow, and the republishing step
//! that re-materializes aliased modules under their client-visible identity.

use std::path::PathBuf;

use crate::encoding;

mod fetch;
mod handlers;
mod parsing;
mod republish;


pub use fetch::{ensure_artifact, FlightGroup};
pub use handlers::handle;
pub use parsing::parse_request_path;

/// The closed set of artifact kinds the protocol serves per module version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// `/@v/list` — newline-separated known versions.
    VersionList,
    /// `/@latest` — revision info for the newest version, served in-memory.
    LatestInfo,
    /// `/@v/<version>.info` — revision info JSON.
    VersionInfo,
    /// `/@v/<version>.mod` — the module manifest.
    Manifest,
    /// `/@v/<version>.zip` — the source archive.
    SourceZip,
    /// `/@v/<version>.ziphash` — content hash of the source archive.
    ZipHash,
}

impl ArtifactKind {
    /// The cache file name for this artifact at `version`.
    pub fn file_name(&self, version: &str) -> String {
        match self {
            ArtifactKind::VersionList => "list".to_string(),
            ArtifactKind::LatestInfo => "latest".to_string(),
            ArtifactKind::VersionInfo => format!("{version}.info"),
            ArtifactKind::Manifest => format!("{version}.mod"),
            ArtifactKind::SourceZip => format!("{version}.zip"),
            ArtifactKind::ZipHash => format!("{version}.ziphash"),
        }
    }
}

/// A parsed protocol request: which artifact of which module version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleRequest {
    /// Decoded (case-restored) module path.
    pub module: String,
    /// Requested version: concrete, `latest`, or empty for the version list.
    pub version: String,
    pub kind: ArtifactKind,
}

/// The path of an artifact relative to the download-cache root.
///
/// `module` is the decoded path; the on-disk layout uses its bang-encoded
/// form, so paths differing only in case stay distinct.
pub fn cache_rel(module: &str, version: &str, kind: ArtifactKind) -> PathBuf {
    let encoded = encoding::encode_path(module);
    match kind {
        ArtifactKind::LatestInfo => PathBuf::from(format!("{encoded}/@latest")),
        _ => PathBuf::from(format!("{encoded}/@v/{}", kind.file_name(version))),
    }
}

/// Directory name of an extracted module tree: `<encoded path>@<version>`.
///
/// The same string names the top-level directory inside source archives.
pub fn module_dir_name(module: &str, version: &str) -> String {
    format!("{}@{}", encoding::encode_path(module), version)
}
