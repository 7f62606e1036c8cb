//! Republishing: re-materializing aliased artifacts under the client path.
//!
//! When a request matched an alias, the resolver fills the cache under the
//! *upstream* module path, but the client expects bytes that identify
//! themselves under the *client* path. Manifests get their `module`
//! declaration rewritten; source zips are rebuilt with the client path as the
//! top-level directory; the zip hash is recomputed over the rebuilt archive;
//! everything else is copied verbatim.
//!
//! Zip and manifest republishing are each globally serialized by a mutex on
//! [`AppState`]; the locks are held only for the materialization step.

use tracing::{debug, info};

use crate::alias::AliasMatch;
use crate::error::{ProxyError, ProxyResult};
use crate::state::AppState;
use crate::{archive, hash_utils, storage};

use super::{cache_rel, module_dir_name, ArtifactKind, ModuleRequest};

/// Rewrite the upstream manifest's `module` declaration and cache it under
/// the client path.
pub async fn manifest(state: &AppState, alias: &AliasMatch, req: &ModuleRequest) -> ProxyResult<()> {
    let _guard = state.mod_lock.lock().await;

    let target = state
        .download_root
        .join(cache_rel(&req.module, &req.version, ArtifactKind::Manifest));
    if storage::exists(&target) {
        return Ok(());
    }

    let source = state.download_root.join(cache_rel(
        &alias.upstream_path,
        &req.version,
        ArtifactKind::Manifest,
    ));
    let upstream_bytes = storage::read(&source).await?;

    let from = format!("module {}", alias.upstream_prefix);
    let to = format!("module {}", alias.client_prefix);
    let rewritten = replace_all(&upstream_bytes, from.as_bytes(), to.as_bytes());

    storage::write_atomic(&target, &rewritten).await?;
    info!(module = %req.module, version = %req.version, "manifest republished");
    Ok(())
}

/// Rebuild the source archive with the client path as its top-level
/// directory and cache it under the client path.
///
/// The alias's client prefix must span more than one path segment; a bare
/// single-segment prefix is refused before any file is touched.
pub async fn source_zip(
    state: &AppState,
    alias: &AliasMatch,
    req: &ModuleRequest,
) -> ProxyResult<()> {
    if !alias.client_prefix.contains('/') {
        return Err(ProxyError::InvalidAlias(alias.client_prefix.clone()));
    }

    let _guard = state.zip_lock.lock().await;

    let target = state
        .download_root
        .join(cache_rel(&req.module, &req.version, ArtifactKind::SourceZip));
    if storage::exists(&target) {
        return Ok(());
    }

    let source_dir = state
        .module_root
        .join(module_dir_name(&alias.upstream_path, &req.version));
    if !source_dir.is_dir() {
        // The extracted tree can be pruned independently of the download
        // cache; recover it from the cached upstream zip when possible.
        let upstream_zip = state.download_root.join(cache_rel(
            &alias.upstream_path,
            &req.version,
            ArtifactKind::SourceZip,
        ));
        if !storage::exists(&upstream_zip) {
            return Err(ProxyError::NotFound(format!(
                "module source tree not found: {}",
                source_dir.display()
            )));
        }
        debug!(dir = %source_dir.display(), "re-extracting pruned source tree");
        archive::extract_zip(&upstream_zip, &state.module_root)?;
    }

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let top_prefix = module_dir_name(&req.module, &req.version);
    let tmp = storage::temp_sibling(&target);
    if let Err(e) = archive::write_zip_from_tree(&source_dir, &top_prefix, &tmp) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = std::fs::rename(&tmp, &target) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e.into());
    }

    info!(module = %req.module, version = %req.version, "source zip republished");
    Ok(())
}

/// Recompute the archive hash over the republished client zip and cache it.
///
/// The upstream hash describes the upstream archive; after republishing the
/// bytes differ, so serving it unchanged would break client verification.
pub async fn zip_hash(state: &AppState, alias: &AliasMatch, req: &ModuleRequest) -> ProxyResult<()> {
    let target = state
        .download_root
        .join(cache_rel(&req.module, &req.version, ArtifactKind::ZipHash));
    if storage::exists(&target) {
        return Ok(());
    }

    let client_zip = state
        .download_root
        .join(cache_rel(&req.module, &req.version, ArtifactKind::SourceZip));
    if !storage::exists(&client_zip) {
        source_zip(state, alias, req).await?;
    }

    let hash = hash_utils::zip_hash(&client_zip)?;
    storage::write_atomic(&target, hash.as_bytes()).await?;
    info!(module = %req.module, version = %req.version, hash = %hash, "zip hash republished");
    Ok(())
}

/// Copy an upstream cache file byte-for-byte to the client path.
///
/// Used for version lists and `.info` files, whose contents carry no module
/// path and need no rewriting.
pub async fn copy_verbatim(
    state: &AppState,
    alias: &AliasMatch,
    req: &ModuleRequest,
) -> ProxyResult<()> {
    let target = state
        .download_root
        .join(cache_rel(&req.module, &req.version, req.kind));
    if storage::exists(&target) {
        return Ok(());
    }

    let source = state
        .download_root
        .join(cache_rel(&alias.upstream_path, &req.version, req.kind));
    let bytes = storage::read(&source).await?;
    storage::write_atomic(&target, &bytes).await?;
    debug!(module = %req.module, version = %req.version, artifact = ?req.kind, "artifact copied to client path");
    Ok(())
}

// Literal, non-overlapping replacement of every occurrence of `from`.
fn replace_all(haystack: &[u8], from: &[u8], to: &[u8]) -> Vec<u8> {
    if from.is_empty() {
        return haystack.to_vec();
    }
    let mut out = Vec::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }
    out
}
