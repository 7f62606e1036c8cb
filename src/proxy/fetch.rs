//! Cache-miss fill coordination.
//!
//! Concurrent requests for the same missing artifact must not trigger
//! duplicate upstream work. Fills are serialized per artifact key: the first
//! arrival takes the key's lock and invokes the resolver; later arrivals
//! block on the same lock, then observe the cached result on their re-check
//! and return without calling upstream at all.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};

use crate::error::{ProxyError, ProxyResult};
use crate::state::AppState;
use crate::storage;

use super::{cache_rel, ArtifactKind};

/// A map of per-key async locks for in-flight cache fills.
///
/// Keys accumulate for the lifetime of the process; the cache itself is
/// append-only, so the map is bounded by the set of distinct artifacts ever
/// requested.
#[derive(Default)]
pub struct FlightGroup {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl FlightGroup {
    /// Acquire the lock for `key`, waiting for any in-flight holder.
    pub async fn acquire(&self, key: &str) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().expect("flight lock map poisoned");
            locks.entry(key.to_string()).or_default().clone()
        };
        lock.lock_owned().await
    }
}

// Artifacts produced by the same resolver call share a flight key, so a
// single fill covers every file that call materializes.
fn flight_key(module: &str, version: &str, kind: ArtifactKind) -> String {
    let class = match kind {
        ArtifactKind::SourceZip | ArtifactKind::ZipHash => "fetch",
        ArtifactKind::Manifest | ArtifactKind::VersionInfo => "query",
        ArtifactKind::VersionList => "list",
        ArtifactKind::LatestInfo => "latest",
    };
    format!("{class}:{module}@{version}")
}

/// Make sure the artifact exists in the download cache on the upstream side,
/// invoking the resolver on a miss.
///
/// `module` is the decoded upstream (post-alias) path. On return the cache
/// file for `(module, version, kind)` exists, or an error describes why it
/// could not be produced.
pub async fn ensure_artifact(
    state: &AppState,
    module: &str,
    version: &str,
    kind: ArtifactKind,
) -> ProxyResult<()> {
    if kind == ArtifactKind::LatestInfo {
        // Served in-memory by the dispatcher, never from the cache.
        return Ok(());
    }

    let rel = cache_rel(module, version, kind);
    let target = state.download_root.join(&rel);
    if storage::exists(&target) {
        return Ok(());
    }

    let key = flight_key(module, version, kind);
    let _guard = state.flights.acquire(&key).await;

    // Re-check under the lock: an earlier flight may have filled it while we
    // were waiting.
    if storage::exists(&target) {
        debug!(path = %rel.display(), "cache filled by concurrent request");
        return Ok(());
    }

    info!(module, version, artifact = ?kind, "cache miss, fetching from upstream");
    match kind {
        ArtifactKind::SourceZip | ArtifactKind::ZipHash => {
            state.resolver.fetch(module, version).await?;
        }
        ArtifactKind::Manifest | ArtifactKind::VersionInfo => {
            state.resolver.query(module, version).await?;
        }
        ArtifactKind::VersionList => {
            let versions = state.resolver.versions(module).await?;
            let body = if versions.is_empty() {
                String::new()
            } else {
                format!("{}\n", versions.join("\n"))
            };
            storage::write_atomic(&target, body.as_bytes()).await?;
        }
        ArtifactKind::LatestInfo => unreachable!("handled above"),
    }

    if !storage::exists(&target) {
        return Err(ProxyError::NotFound(format!(
            "{} not available from upstream",
            rel.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::AliasTable;
    use crate::resolver::{ModuleResolver, RevInfo};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    /// Resolver that materializes a manifest after a short delay, counting
    /// how many times it is invoked.
    struct SlowResolver {
        download_root: PathBuf,
        queries: AtomicUsize,
    }

    #[async_trait]
    impl ModuleResolver for SlowResolver {
        async fn fetch(&self, _path: &str, _version: &str) -> ProxyResult<PathBuf> {
            unimplemented!("not used in this test")
        }

        async fn query(&self, path: &str, version: &str) -> ProxyResult<RevInfo> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            let rel = cache_rel(path, version, ArtifactKind::Manifest);
            storage::write_atomic(
                &self.download_root.join(rel),
                format!("module {path}\n").as_bytes(),
            )
            .await?;
            Ok(RevInfo {
                version: version.to_string(),
                time: "2024-01-01T00:00:00Z".parse().unwrap(),
            })
        }

        async fn versions(&self, _path: &str) -> ProxyResult<Vec<String>> {
            Ok(vec![])
        }
    }

    #[tokio::test]
    async fn concurrent_fills_invoke_resolver_once() {
        let tmp = TempDir::new().unwrap();
        let gopath = tmp.path().to_path_buf();
        let download_root = gopath.join("pkg/mod/cache/download");

        let resolver = Arc::new(SlowResolver {
            download_root: download_root.clone(),
            queries: AtomicUsize::new(0),
        });
        let state = Arc::new(AppState::new(
            &gopath,
            AliasTable::default(),
            resolver.clone(),
        ));

        let a = {
            let state = state.clone();
            tokio::spawn(async move {
                ensure_artifact(&state, "m.org/pkg", "v1.0.0", ArtifactKind::Manifest).await
            })
        };
        let b = {
            let state = state.clone();
            tokio::spawn(async move {
                ensure_artifact(&state, "m.org/pkg", "v1.0.0", ArtifactKind::Manifest).await
            })
        };

        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        assert_eq!(resolver.queries.load(Ordering::SeqCst), 1);
        assert!(storage::exists(
            &download_root.join("m.org/pkg/@v/v1.0.0.mod")
        ));
    }

    #[tokio::test]
    async fn version_list_is_serialized_to_cache() {
        struct ListResolver;

        #[async_trait]
        impl ModuleResolver for ListResolver {
            async fn fetch(&self, _: &str, _: &str) -> ProxyResult<PathBuf> {
                unimplemented!()
            }
            async fn query(&self, _: &str, _: &str) -> ProxyResult<RevInfo> {
                unimplemented!()
            }
            async fn versions(&self, _path: &str) -> ProxyResult<Vec<String>> {
                Ok(vec!["v1.0.0".to_string(), "v1.1.0".to_string()])
            }
        }

        let tmp = TempDir::new().unwrap();
        let state = AppState::new(tmp.path(), AliasTable::default(), Arc::new(ListResolver));

        ensure_artifact(&state, "m.org/pkg", "", ArtifactKind::VersionList)
            .await
            .unwrap();

        let list = state.download_root.join("m.org/pkg/@v/list");
        assert_eq!(std::fs::read(&list).unwrap(), b"v1.0.0\nv1.1.0\n");
    }

    #[tokio::test]
    async fn existing_artifact_skips_the_resolver() {
        struct PanicResolver;

        #[async_trait]
        impl ModuleResolver for PanicResolver {
            async fn fetch(&self, _: &str, _: &str) -> ProxyResult<PathBuf> {
                panic!("resolver must not run on a cache hit")
            }
            async fn query(&self, _: &str, _: &str) -> ProxyResult<RevInfo> {
                panic!("resolver must not run on a cache hit")
            }
            async fn versions(&self, _: &str) -> ProxyResult<Vec<String>> {
                panic!("resolver must not run on a cache hit")
            }
        }

        let tmp = TempDir::new().unwrap();
        let state = AppState::new(tmp.path(), AliasTable::default(), Arc::new(PanicResolver));

        let target = state.download_root.join("m.org/pkg/@v/v1.0.0.info");
        storage::write_atomic(&target, b"{}").await.unwrap();

        ensure_artifact(&state, "m.org/pkg", "v1.0.0", ArtifactKind::VersionInfo)
            .await
            .unwrap();
    }
}
