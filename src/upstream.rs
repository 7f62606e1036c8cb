//! Production module resolver.
//!
//! Resolves cache misses by speaking the same download protocol to a
//! configured upstream proxy and materializing the results into the local
//! cache: `.info`/`.mod` for metadata queries, plus the zip, its content
//! hash, and the extracted source tree for full fetches. Every cache write
//! goes through [`storage::write_atomic`], so a crashed or cancelled fetch
//! never leaves a partial file behind.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, info, warn};
use url::Url;

use crate::encoding;
use crate::error::{ProxyError, ProxyResult};
use crate::proxy::{cache_rel, module_dir_name, ArtifactKind};
use crate::resolver::{ModuleResolver, RevInfo};
use crate::{archive, hash_utils, storage};

const LATEST_VERSION: &str = "latest";

/// Connection settings for the upstream proxy.
#[derive(Debug, Clone)]
pub struct UpstreamConfig {
    /// Base URL of the upstream module proxy.
    pub base_url: String,
    /// HTTP request timeout for upstream calls.
    pub timeout: Duration,
    /// Module-path prefixes fetched over plain HTTP instead of HTTPS.
    pub http_prefixes: Vec<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://proxy.golang.org".to_string(),
            timeout: Duration::from_secs(30),
            http_prefixes: Vec::new(),
        }
    }
}

/// Resolver backed by an upstream module proxy.
pub struct ProxyResolver {
    client: Client,
    config: UpstreamConfig,
    download_root: PathBuf,
    module_root: PathBuf,
}

impl ProxyResolver {
    pub fn new(
        config: UpstreamConfig,
        download_root: PathBuf,
        module_root: PathBuf,
    ) -> ProxyResult<Self> {
        Url::parse(&config.base_url).map_err(|e| {
            ProxyError::UpstreamFailure(format!("invalid upstream URL {:?}: {e}", config.base_url))
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("modproxy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProxyError::UpstreamFailure(format!("building HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            download_root,
            module_root,
        })
    }

    // Scheme-downgraded base URL for modules on the plain-HTTP allowlist.
    fn base_for(&self, module: &str) -> String {
        let insecure = self.config.http_prefixes.iter().any(|prefix| {
            module == prefix || module.strip_prefix(prefix).is_some_and(|r| r.starts_with('/'))
        });
        if insecure {
            self.config.base_url.replacen("https://", "http://", 1)
        } else {
            self.config.base_url.clone()
        }
    }

    fn endpoint(&self, module: &str, rest: &str) -> String {
        format!(
            "{}/{}/{rest}",
            self.base_for(module).trim_end_matches('/'),
            encoding::encode_path(module)
        )
    }

    async fn get(&self, url: &str, what: &str) -> ProxyResult<bytes::Bytes> {
        debug!(url = %url, "fetching from upstream");
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "upstream request failed");
            ProxyError::UpstreamFailure(format!("{what}: {e}"))
        })?;

        if !response.status().is_success() {
            return Err(ProxyError::NotFound(format!("{what}: not found upstream")));
        }
        response
            .bytes()
            .await
            .map_err(|e| ProxyError::UpstreamFailure(format!("{what}: reading response: {e}")))
    }

    // Cache `.info` and `.mod` for a concrete version, skipping files that
    // are already present.
    async fn materialize_metadata(&self, module: &str, version: &str) -> ProxyResult<()> {
        let info_abs = self
            .download_root
            .join(cache_rel(module, version, ArtifactKind::VersionInfo));
        if !storage::exists(&info_abs) {
            let bytes = self
                .get(
                    &self.endpoint(module, &format!("@v/{version}.info")),
                    &format!("{module}@{version} revision info"),
                )
                .await?;
            storage::write_atomic(&info_abs, &bytes).await?;
        }

        let mod_abs = self
            .download_root
            .join(cache_rel(module, version, ArtifactKind::Manifest));
        if !storage::exists(&mod_abs) {
            let bytes = self
                .get(
                    &self.endpoint(module, &format!("@v/{version}.mod")),
                    &format!("{module}@{version} manifest"),
                )
                .await?;
            storage::write_atomic(&mod_abs, &bytes).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ModuleResolver for ProxyResolver {
    async fn fetch(&self, path: &str, version: &str) -> ProxyResult<PathBuf> {
        let rev = self.query(path, version).await?;
        let version = rev.version.as_str();

        let zip_abs = self
            .download_root
            .join(cache_rel(path, version, ArtifactKind::SourceZip));
        if !storage::exists(&zip_abs) {
            let bytes = self
                .get(
                    &self.endpoint(path, &format!("@v/{version}.zip")),
                    &format!("{path}@{version} source archive"),
                )
                .await?;
            storage::write_atomic(&zip_abs, &bytes).await?;
            info!(module = path, version, size = bytes.len(), "source archive downloaded");
        }

        let hash_abs = self
            .download_root
            .join(cache_rel(path, version, ArtifactKind::ZipHash));
        if !storage::exists(&hash_abs) {
            let hash = hash_utils::zip_hash(&zip_abs)?;
            storage::write_atomic(&hash_abs, hash.as_bytes()).await?;
        }

        let dir = self.module_root.join(module_dir_name(path, version));
        if !dir.is_dir() {
            archive::extract_zip(&zip_abs, &self.module_root)?;
        }
        Ok(dir)
    }

    async fn query(&self, path: &str, version: &str) -> ProxyResult<RevInfo> {
        let rev: RevInfo = if version == LATEST_VERSION {
            let bytes = self
                .get(
                    &self.endpoint(path, "@latest"),
                    &format!("{path} latest version"),
                )
                .await?;
            serde_json::from_slice(&bytes)?
        } else {
            let bytes = self
                .get(
                    &self.endpoint(path, &format!("@v/{version}.info")),
                    &format!("{path}@{version} revision info"),
                )
                .await?;
            let rev: RevInfo = serde_json::from_slice(&bytes)?;
            // The bytes in hand are the `.info` file; cache them as-is.
            let info_abs = self
                .download_root
                .join(cache_rel(path, &rev.version, ArtifactKind::VersionInfo));
            if !storage::exists(&info_abs) {
                storage::write_atomic(&info_abs, &bytes).await?;
            }
            rev
        };

        self.materialize_metadata(path, &rev.version).await?;
        Ok(rev)
    }

    async fn versions(&self, path: &str) -> ProxyResult<Vec<String>> {
        let bytes = self
            .get(
                &self.endpoint(path, "@v/list"),
                &format!("{path} version list"),
            )
            .await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(prefixes: &[&str]) -> ProxyResolver {
        let config = UpstreamConfig {
            http_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        };
        ProxyResolver::new(config, PathBuf::from("/dl"), PathBuf::from("/mod")).unwrap()
    }

    #[test]
    fn endpoint_uses_encoded_module_path() {
        let r = resolver(&[]);
        assert_eq!(
            r.endpoint("github.com/BurntSushi/toml", "@v/list"),
            "https://proxy.golang.org/github.com/!burnt!sushi/toml/@v/list"
        );
    }

    #[test]
    fn http_allowlist_downgrades_scheme_on_segment_boundaries() {
        let r = resolver(&["corp.example/internal"]);
        assert!(r.base_for("corp.example/internal").starts_with("http://"));
        assert!(r.base_for("corp.example/internal/tool").starts_with("http://"));
        assert!(r.base_for("corp.example/internals").starts_with("https://"));
        assert!(r.base_for("other.org/lib").starts_with("https://"));
    }

    #[test]
    fn rejects_unparseable_base_url() {
        let config = UpstreamConfig {
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(ProxyResolver::new(config, PathBuf::from("/dl"), PathBuf::from("/mod")).is_err());
    }
}
