//! Path-alias table.
//!
//! Administrators can redirect one module namespace to another (for example
//! serving `example.com/...` from a mirror at `upstream.io/...`) with the
//! `replace` config key. Lookup is by the longest client-visible prefix that
//! matches the query on a path-segment boundary; modules that match no entry
//! pass through untouched. The table is built once at startup and immutable
//! afterwards, so handlers can share it without synchronization.

use std::collections::HashMap;

/// One rewrite rule: requests under `client` are served from `upstream`.
#[derive(Debug, Clone)]
struct AliasEntry {
    client: String,
    upstream: String,
}

/// The result of a successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasMatch {
    /// The client-visible prefix that matched.
    pub client_prefix: String,
    /// The upstream prefix it maps to.
    pub upstream_prefix: String,
    /// The full rewritten module path (upstream side).
    pub upstream_path: String,
}

/// Longest-prefix rewrite table between client and upstream module namespaces.
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    // Sorted by descending client-prefix length so the first match wins.
    entries: Vec<AliasEntry>,
}

impl AliasTable {
    /// Build a table from the raw `replace` mapping.
    ///
    /// Trailing slashes on either side are stripped; empty keys are dropped.
    pub fn new(replace: &HashMap<String, String>) -> Self {
        let mut entries: Vec<AliasEntry> = replace
            .iter()
            .filter_map(|(client, upstream)| {
                let client = client.trim_end_matches('/').to_string();
                let upstream = upstream.trim_end_matches('/').to_string();
                if client.is_empty() || upstream.is_empty() {
                    return None;
                }
                Some(AliasEntry { client, upstream })
            })
            .collect();

        // Length-descending, with a lexicographic tie-break so iteration
        // order is deterministic regardless of map ordering.
        entries.sort_by(|a, b| {
            b.client
                .len()
                .cmp(&a.client.len())
                .then_with(|| a.client.cmp(&b.client))
        });

        Self { entries }
    }

    /// Rewrite a client-visible module path to its upstream path.
    ///
    /// Returns `None` when no entry matches; callers then use the path as-is.
    /// Matching is on whole path segments: the entry `a/b` matches `a/b` and
    /// `a/b/c`, never `a/bc`.
    pub fn rewrite(&self, path: &str) -> Option<AliasMatch> {
        for entry in &self.entries {
            let suffix = match path.strip_prefix(&entry.client) {
                Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
                _ => continue,
            };
            return Some(AliasMatch {
                client_prefix: entry.client.clone(),
                upstream_prefix: entry.upstream.clone(),
                upstream_path: format!("{}{}", entry.upstream, suffix),
            });
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(pairs: &[(&str, &str)]) -> AliasTable {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AliasTable::new(&map)
    }

    #[test]
    fn empty_table_is_identity() {
        let table = AliasTable::default();
        assert!(table.rewrite("example.com/foo").is_none());
    }

    #[test]
    fn rewrites_matching_prefix() {
        let table = table(&[("example.com", "upstream.io")]);
        let m = table.rewrite("example.com/lib/x").unwrap();
        assert_eq!(m.client_prefix, "example.com");
        assert_eq!(m.upstream_prefix, "upstream.io");
        assert_eq!(m.upstream_path, "upstream.io/lib/x");
    }

    #[test]
    fn exact_prefix_match_rewrites_to_bare_upstream() {
        let table = table(&[("example.com/lib", "upstream.io/lib")]);
        let m = table.rewrite("example.com/lib").unwrap();
        assert_eq!(m.upstream_path, "upstream.io/lib");
    }

    #[test]
    fn non_matching_path_passes_through() {
        let table = table(&[("a", "x")]);
        assert!(table.rewrite("c/x").is_none());
    }

    #[test]
    fn matches_segment_boundaries_only() {
        let table = table(&[("a/b", "y")]);
        assert!(table.rewrite("a/bc").is_none());
        assert!(table.rewrite("a/b/c").is_some());
    }

    #[test]
    fn longest_prefix_wins() {
        let table = table(&[("a", "x"), ("a/b", "y")]);
        assert_eq!(table.rewrite("a/b/c").unwrap().upstream_path, "y/c");
        assert_eq!(table.rewrite("a/z").unwrap().upstream_path, "x/z");
    }

    #[test]
    fn trailing_slashes_are_stripped() {
        let table = table(&[("example.com/", "upstream.io/")]);
        let m = table.rewrite("example.com/lib").unwrap();
        assert_eq!(m.client_prefix, "example.com");
        assert_eq!(m.upstream_path, "upstream.io/lib");
    }
}
