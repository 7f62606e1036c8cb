//! In-process zip creation and extraction for module source trees.
//!
//! The proxy rebuilds source archives when an alias changes the module
//! identity, and clients hash those archives, so the writer must be
//! deterministic: entries are added in lexicographic order of their archive
//! names, with Deflate compression, a fixed modification time, and fixed
//! permission bits. Two runs over the same tree produce identical bytes.
//!
//! Module archives contain file entries only — directories exist implicitly
//! through entry names.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{ProxyError, ProxyResult};

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644)
}

/// Create a zip archive at `dest` from the file tree rooted at `source_dir`.
///
/// Every entry is named `<top_prefix>/<relative path>` with forward slashes.
/// `dest` is written in place; callers that need atomicity pass a temp path
/// and rename afterwards.
pub fn write_zip_from_tree(source_dir: &Path, top_prefix: &str, dest: &Path) -> ProxyResult<()> {
    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(source_dir) {
        let entry = entry.map_err(|e| {
            ProxyError::CacheIo(io::Error::other(format!(
                "walking {}: {e}",
                source_dir.display()
            )))
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .map_err(|e| ProxyError::CacheIo(io::Error::other(e)))?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push((rel, entry.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut writer = ZipWriter::new(File::create(dest)?);
    let options = entry_options();
    for (rel, path) in &files {
        let name = format!("{top_prefix}/{rel}");
        writer
            .start_file(&name, options)
            .map_err(|e| ProxyError::CacheIo(io::Error::other(e)))?;
        let mut file = File::open(path)?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        writer.write_all(&buf)?;
    }
    writer
        .finish()
        .map_err(|e| ProxyError::CacheIo(io::Error::other(e)))?;

    debug!(dest = %dest.display(), entries = files.len(), "zip archive written");
    Ok(())
}

/// Extract a module zip into `dest_root`.
///
/// Entries land at `dest_root/<entry name>`, so an archive whose entries all
/// live under `m@v1.0.0/` materializes the tree `dest_root/m@v1.0.0/…`.
/// Entry names that escape `dest_root` are rejected.
pub fn extract_zip(zip_path: &Path, dest_root: &Path) -> ProxyResult<()> {
    let mut archive =
        ZipArchive::new(File::open(zip_path)?).map_err(|e| ProxyError::CacheIo(io::Error::other(e)))?;

    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ProxyError::CacheIo(io::Error::other(e)))?;
        if entry.is_dir() {
            continue;
        }
        let rel = entry.enclosed_name().ok_or_else(|| {
            ProxyError::CacheIo(io::Error::other(format!(
                "archive entry {:?} escapes the extraction root",
                entry.name()
            )))
        })?;
        let dest = dest_root.join(rel);
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&dest)?;
        io::copy(&mut entry, &mut out)?;
    }

    debug!(zip = %zip_path.display(), dest = %dest_root.display(), "zip archive extracted");
    Ok(())
}
