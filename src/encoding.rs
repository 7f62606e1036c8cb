//! Case-preserving path encoding for the on-disk cache layout.
//!
//! Module paths are case-sensitive, but several popular filesystems are not.
//! The cache therefore stores each path in a reversible "bang" encoding: every
//! uppercase ASCII letter `X` is written as `!x`. `decode_path` is the strict
//! inverse — a `!` followed by anything but a lowercase ASCII letter is an
//! error, which also makes the encoding injective.

use crate::error::{ProxyError, ProxyResult};

/// Encode a module path for use as a cache directory name.
///
/// `Example.com/Foo` becomes `!example.com/!foo`. The input is assumed to be
/// a valid module path (see [`check_path`]), which never contains `!`.
pub fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for ch in path.chars() {
        if ch.is_ascii_uppercase() {
            out.push('!');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// Decode a bang-encoded path from a request URL back to the module path.
pub fn decode_path(encoded: &str) -> ProxyResult<String> {
    let mut out = String::with_capacity(encoded.len());
    let mut chars = encoded.chars();
    while let Some(ch) = chars.next() {
        if ch == '!' {
            match chars.next() {
                Some(next) if next.is_ascii_lowercase() => {
                    out.push(next.to_ascii_uppercase());
                }
                _ => {
                    return Err(ProxyError::MalformedUrl(format!(
                        "invalid escaped module path {encoded:?}"
                    )));
                }
            }
        } else if ch.is_ascii_uppercase() {
            return Err(ProxyError::MalformedUrl(format!(
                "invalid escaped module path {encoded:?}: uppercase letter"
            )));
        } else {
            out.push(ch);
        }
    }
    check_path(&out)?;
    Ok(out)
}

/// Validate the shape of a decoded module path.
///
/// Rejects empty paths, empty segments, relative-path segments (`.`/`..`) and
/// the escape character itself. Anything that passes here round-trips through
/// [`encode_path`]/[`decode_path`] unchanged.
pub fn check_path(path: &str) -> ProxyResult<()> {
    if path.is_empty() {
        return Err(ProxyError::MalformedUrl("empty module path".to_string()));
    }
    for segment in path.split('/') {
        if segment.is_empty() {
            return Err(ProxyError::MalformedUrl(format!(
                "module path {path:?} has an empty segment"
            )));
        }
        if segment == "." || segment == ".." {
            return Err(ProxyError::MalformedUrl(format!(
                "module path {path:?} has a relative segment"
            )));
        }
    }
    if path.contains('!') {
        return Err(ProxyError::MalformedUrl(format!(
            "module path {path:?} contains '!'"
        )));
    }
    Ok(())
}
