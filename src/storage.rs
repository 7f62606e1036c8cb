//! Cache store primitives.
//!
//! The download cache is append-only: a file under it is either absent or
//! complete, never partially written. [`write_atomic`] guarantees that by
//! writing to a uniquely named `.tmp.` sibling first and renaming it into
//! place; the rename is the linearization point observed by [`exists`].
//! Readers never need coordination beyond that.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use axum::body::Body;
use axum::http::header;
use axum::response::Response;
use tokio::fs;
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::error::{ProxyError, ProxyResult};

/// Check whether a cache file is present (and therefore complete).
pub fn exists(path: &Path) -> bool {
    path.exists()
}

/// Read a cache file in full.
pub async fn read(path: &Path) -> ProxyResult<Vec<u8>> {
    match fs::read(path).await {
        Ok(data) => Ok(data),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "cache file not found");
            Err(ProxyError::NotFound(format!(
                "file not found: {}",
                path.display()
            )))
        }
        Err(e) => Err(e.into()),
    }
}

/// Atomically write a cache file, creating parent directories as needed.
pub async fn write_atomic(path: &Path, content: &[u8]) -> ProxyResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let tmp = temp_sibling(path);
    fs::write(&tmp, content).await?;
    if let Err(e) = fs::rename(&tmp, path).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(e.into());
    }

    debug!(path = %path.display(), size = content.len(), "cache file written");
    Ok(())
}

/// Stream a cache file as an HTTP response with the correct content length.
///
/// Used for zips and other large artifacts so the whole file never has to sit
/// in memory. No content type is set; protocol clients treat the stream
/// opaquely.
pub async fn serve_file(path: &Path) -> ProxyResult<Response> {
    let file = match fs::File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ProxyError::NotFound(format!(
                "file not found: {}",
                path.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    let len = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    Response::builder()
        .header(header::CONTENT_LENGTH, len)
        .body(body)
        .map_err(|e| ProxyError::CacheIo(std::io::Error::other(e)))
}

/// Produce a unique temp-file path next to `path`.
///
/// The nonce combines the process id with a process-wide counter so two
/// writers racing on the same artifact never collide on the temp name.
pub(crate) fn temp_sibling(path: &Path) -> std::path::PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let nonce = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(format!(".tmp.{}.{}", std::process::id(), nonce));
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn write_then_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a/b/@v/v1.0.0.mod");

        write_atomic(&path, b"module example.com/foo\n").await.unwrap();
        assert!(exists(&path));
        assert_eq!(read(&path).await.unwrap(), b"module example.com/foo\n");
    }

    #[tokio::test]
    async fn read_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = read(&tmp.path().join("nope")).await.unwrap_err();
        assert!(matches!(err, ProxyError::NotFound(_)));
    }

    #[tokio::test]
    async fn no_temp_files_remain_after_write() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("m/@v/list");
        write_atomic(&path, b"v1.0.0\n").await.unwrap();

        let names: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["list".to_string()]);
    }

    #[tokio::test]
    async fn serve_file_sets_content_length() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("v1.0.0.info");
        let body = br#"{"Version":"v1.0.0"}"#;
        write_atomic(&path, body).await.unwrap();

        let response = serve_file(&path).await.unwrap();
        let length = response.headers()[header::CONTENT_LENGTH].to_str().unwrap();
        assert_eq!(length, body.len().to_string());
    }

    #[tokio::test]
    async fn temp_siblings_are_unique() {
        let path = Path::new("/x/y.zip");
        assert_ne!(temp_sibling(path), temp_sibling(path));
    }
}
