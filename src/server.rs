//! HTTP server assembly.
//!
//! Builds the router, turns a parsed [`Config`] into runtime [`AppState`],
//! binds the listener, and serves until shutdown. All protocol endpoints are
//! `GET`s over module paths of arbitrary depth, so a single wildcard route
//! feeds the dispatcher.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::alias::AliasTable;
use crate::config::Config;
use crate::error::ProxyResult;
use crate::proxy;
use crate::state::AppState;
use crate::upstream::{ProxyResolver, UpstreamConfig};

/// Build the runtime state for a parsed configuration.
///
/// This is the process's one-shot initialization: it resolves the cache
/// roots, constructs the alias table and the production resolver, and clears
/// `GOPROXY` from the environment. The variable is honored first — when set
/// it overrides the default upstream — and then removed so no embedded
/// tooling can be pointed back at this process and recurse.
pub fn build_state(config: &Config) -> ProxyResult<Arc<AppState>> {
    let gopath = config.resolve_gopath();

    let mut upstream = UpstreamConfig {
        http_prefixes: config.http_prefixes.clone(),
        ..Default::default()
    };
    if let Ok(goproxy) = std::env::var("GOPROXY") {
        if !goproxy.is_empty() {
            upstream.base_url = goproxy;
        }
    }
    std::env::remove_var("GOPROXY");

    let module_root = gopath.join("pkg").join("mod");
    let download_root = module_root.join("cache").join("download");
    let resolver = Arc::new(ProxyResolver::new(
        upstream,
        download_root.clone(),
        module_root,
    )?);

    let aliases = AliasTable::new(&config.replace);
    info!(
        gopath = %gopath.display(),
        aliases = config.replace.len(),
        "proxy state initialized"
    );

    Ok(Arc::new(AppState::new(&gopath, aliases, resolver)))
}

/// Assemble the router serving the four protocol endpoints.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/{*path}", get(proxy::handle))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Run the server until the process is stopped.
pub async fn run_server(ip: &str, port: u16, state: Arc<AppState>) -> Result<()> {
    run_server_with_shutdown(ip, port, state, None).await
}

/// Run the server, optionally stopping when `shutdown_receiver` fires.
pub async fn run_server_with_shutdown(
    ip: &str,
    port: u16,
    state: Arc<AppState>,
    shutdown_receiver: Option<tokio::sync::oneshot::Receiver<()>>,
) -> Result<()> {
    let host = if ip.is_empty() { "0.0.0.0" } else { ip };
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    let app = router(state);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "module proxy listening");

    match shutdown_receiver {
        Some(shutdown_rx) => {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                    info!("shutdown signal received, stopping server");
                })
                .await
                .context("server error")?;
        }
        None => {
            axum::serve(listener, app).await.context("server error")?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn build_state_lays_out_cache_roots() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = Config {
            gopath: tmp.path().display().to_string(),
            http_prefixes: vec![],
            replace: HashMap::from([("a/b".to_string(), "c/d".to_string())]),
        };

        let state = build_state(&config).unwrap();
        assert_eq!(state.module_root, tmp.path().join("pkg/mod"));
        assert_eq!(
            state.download_root,
            tmp.path().join("pkg/mod/cache/download")
        );
        assert!(!state.aliases.is_empty());
    }
}
