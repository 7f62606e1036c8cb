//! Archive hashing for `.ziphash` files.
//!
//! The hash covers the archive's *contents* rather than its raw bytes: each
//! file entry contributes a line `"<sha256-hex>  <entry-name>\n"`, the lines
//! are sorted by entry name, and the digest of the concatenation is emitted as
//! `h1:<base64>`. Rebuilding an archive with identical entries therefore
//! yields the identical hash even if the container bytes differ.

use std::io::{Cursor, Read, Seek};
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::error::{ProxyError, ProxyResult};

/// Calculate the SHA-256 hash of data as a lowercase hex string.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a zip archive on disk into the `h1:` content-hash format.
pub fn zip_hash(path: &Path) -> ProxyResult<String> {
    let file = std::fs::File::open(path)?;
    hash_archive(file)
}

/// Hash an in-memory zip archive into the `h1:` content-hash format.
pub fn zip_hash_bytes(data: &[u8]) -> ProxyResult<String> {
    hash_archive(Cursor::new(data))
}

fn hash_archive<R: Read + Seek>(reader: R) -> ProxyResult<String> {
    let mut archive = ZipArchive::new(reader)
        .map_err(|e| ProxyError::CacheIo(std::io::Error::other(e)))?;

    let mut lines = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| ProxyError::CacheIo(std::io::Error::other(e)))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        lines.push((name.clone(), format!("{}  {}\n", sha256_hex(&content), name)));
    }
    lines.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (_, line) in &lines {
        hasher.update(line.as_bytes());
    }
    Ok(format!("h1:{}", BASE64.encode(hasher.finalize())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = ZipWriter::new(&mut cursor);
            for (name, content) in entries {
                writer
                    .start_file(*name, SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content).unwrap();
            }
            writer.finish().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn hash_has_h1_prefix() {
        let data = build_zip(&[("m@v1/go.mod", b"module m\n")]);
        let hash = zip_hash_bytes(&data).unwrap();
        assert!(hash.starts_with("h1:"));
    }

    #[test]
    fn hash_ignores_entry_insertion_order() {
        let a = build_zip(&[("m@v1/a.go", b"a"), ("m@v1/b.go", b"b")]);
        let b = build_zip(&[("m@v1/b.go", b"b"), ("m@v1/a.go", b"a")]);
        assert_eq!(zip_hash_bytes(&a).unwrap(), zip_hash_bytes(&b).unwrap());
    }

    #[test]
    fn hash_changes_with_content_and_name() {
        let base = build_zip(&[("m@v1/a.go", b"a")]);
        let content = build_zip(&[("m@v1/a.go", b"b")]);
        let renamed = build_zip(&[("n@v1/a.go", b"a")]);

        let base = zip_hash_bytes(&base).unwrap();
        assert_ne!(base, zip_hash_bytes(&content).unwrap());
        assert_ne!(base, zip_hash_bytes(&renamed).unwrap());
    }
}
