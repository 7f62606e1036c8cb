//! Request-path parsing for the download protocol.
//!
//! The protocol has four endpoint shapes per module:
//!
//! ```text
//! /<enc-path>/@v/list
//! /<enc-path>/@latest
//! /<enc-path>/@v/<version>.{info,mod,zip,ziphash}
//! ```
//!
//! `<enc-path>` is the bang-encoded module path. Anything that doesn't match
//! one of these shapes is a malformed request.

use crate::encoding;
use crate::error::{ProxyError, ProxyResult};

use super::{ArtifactKind, ModuleRequest};

const LATEST_VERSION: &str = "latest";

/// Parse a request path (leading slash already stripped, percent-decoding
/// already applied) into a [`ModuleRequest`].
pub fn parse_request_path(path: &str) -> ProxyResult<ModuleRequest> {
    let split = path
        .find("/@")
        .ok_or_else(|| ProxyError::MalformedUrl(format!("no module request in {path:?}")))?;
    let (encoded, rest) = path.split_at(split);
    let module = encoding::decode_path(encoded)?;

    if rest == "/@latest" {
        return Ok(ModuleRequest {
            module,
            version: LATEST_VERSION.to_string(),
            kind: ArtifactKind::LatestInfo,
        });
    }

    let file = rest.strip_prefix("/@v/").ok_or_else(|| {
        ProxyError::MalformedUrl(format!("unrecognized module request in {path:?}"))
    })?;

    if file == "list" {
        return Ok(ModuleRequest {
            module,
            version: String::new(),
            kind: ArtifactKind::VersionList,
        });
    }

    let (version, kind) = if let Some(v) = file.strip_suffix(".info") {
        (v, ArtifactKind::VersionInfo)
    } else if let Some(v) = file.strip_suffix(".mod") {
        (v, ArtifactKind::Manifest)
    } else if let Some(v) = file.strip_suffix(".ziphash") {
        (v, ArtifactKind::ZipHash)
    } else if let Some(v) = file.strip_suffix(".zip") {
        (v, ArtifactKind::SourceZip)
    } else {
        return Err(ProxyError::MalformedUrl(format!(
            "unrecognized file name {file:?} in {path:?}"
        )));
    };

    if version.is_empty() || version.contains('/') {
        return Err(ProxyError::MalformedUrl(format!(
            "invalid version {version:?} in {path:?}"
        )));
    }

    Ok(ModuleRequest {
        module,
        version: version.to_string(),
        kind,
    })
}
