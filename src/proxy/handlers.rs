//! The request dispatcher.
//!
//! One handler serves the whole protocol surface. For each GET it parses the
//! endpoint shape, applies the alias table, fills the cache from upstream on
//! a miss, republishes aliased artifacts under the client path, and streams
//! the resulting cache file. `@latest` is the one exception: its JSON is
//! produced in-memory on every request and never cached.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::response::Response;
use tracing::{debug, info};

use crate::error::ProxyResult;
use crate::state::AppState;
use crate::storage;

use super::{cache_rel, fetch, parsing, republish, ArtifactKind};

/// Serve one protocol request.
pub async fn handle(
    State(state): State<Arc<AppState>>,
    UrlPath(path): UrlPath<String>,
) -> ProxyResult<Response> {
    info!(path = %path, "GET");

    let req = parsing::parse_request_path(&path)?;
    let alias = state.aliases.rewrite(&req.module);
    let upstream_module = match &alias {
        Some(m) => {
            debug!(client = %req.module, upstream = %m.upstream_path, "alias rewrite applied");
            m.upstream_path.clone()
        }
        None => req.module.clone(),
    };

    // The latest-version endpoint is answered from the resolver directly.
    if req.kind == ArtifactKind::LatestInfo {
        let rev = state.resolver.query(&upstream_module, &req.version).await?;
        debug!(module = %upstream_module, version = %rev.version, "resolved latest version");
        let body = serde_json::to_vec(&rev)?;
        return Ok(Response::new(Body::from(body)));
    }

    let client_abs = state
        .download_root
        .join(cache_rel(&req.module, &req.version, req.kind));

    if storage::exists(&client_abs) {
        debug!(path = %client_abs.display(), "cache hit");
    } else {
        fetch::ensure_artifact(&state, &upstream_module, &req.version, req.kind).await?;

        if let Some(alias) = &alias {
            match req.kind {
                ArtifactKind::Manifest => republish::manifest(&state, alias, &req).await?,
                ArtifactKind::SourceZip => republish::source_zip(&state, alias, &req).await?,
                ArtifactKind::ZipHash => republish::zip_hash(&state, alias, &req).await?,
                ArtifactKind::VersionList | ArtifactKind::VersionInfo => {
                    republish::copy_verbatim(&state, alias, &req).await?
                }
                ArtifactKind::LatestInfo => unreachable!("handled above"),
            }
        }
    }

    storage::serve_file(&client_abs).await
}
