//! Bundler chunk-map resolution.
//!
//! Module bundlers emit tables such as
//! `{9:"26454eb9ee6ea13543d9",93:"45fc526fb568708f9e75"}` mapping chunk ids to
//! content hashes, and in split runtime chunks a second table mapping the same
//! ids to readable names (`{93:"vendor"}`). Joining the two on the id gives
//! fetchable file names (`93.45fc....js`, `vendor.45fc....js`) without
//! executing the bundle. Content that contains no such table simply yields
//! nothing.

use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use regex::Regex;
use url::Url;

use crate::types::ChunkEntry;

/// Chunk URLs and path strings found in one script.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkResolution {
    /// Sorted, deduplicated candidate chunk file URLs.
    pub chunk_urls: Vec<String>,
    /// Path-like string literals in source order, duplicates kept.
    pub paths: Vec<String>,
}

fn chunk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""?(\d+)"?\s*:\s*"([a-f0-9]{20}|[a-z][a-zA-Z0-9]+)""#)
            .expect("chunk map regex is valid")
    })
}

fn path_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#""(/[:_/a-zA-Z0-9.?=&-]+)"|'(/[:_/a-zA-Z0-9.?=&-]+)'"#)
            .expect("path regex is valid")
    })
}

/// Collect every `<id>: "<value>"` pair in source order. Duplicates are kept.
pub fn scan_chunk_map(script: &str) -> Vec<ChunkEntry> {
    chunk_regex()
        .captures_iter(script)
        .filter_map(|caps| {
            let id = caps.get(1)?.as_str();
            let value = caps.get(2)?.as_str();
            Some(ChunkEntry::new(id, value))
        })
        .collect()
}

/// Extend the entries with one `(alias, hash)` pair for every alias whose id
/// also carries a hash in the same table.
///
/// Only a single hop is followed: an alias pointing at another alias stays
/// unresolved.
pub fn resolve_aliases(entries: &[ChunkEntry]) -> Vec<ChunkEntry> {
    let lookup: HashMap<&str, &str> = entries
        .iter()
        .filter(|e| e.is_hash())
        .map(|e| (e.id.as_str(), e.value.as_str()))
        .collect();

    let resolved: Vec<ChunkEntry> = entries
        .iter()
        .filter(|e| !e.is_hash())
        .filter_map(|e| {
            lookup
                .get(e.id.as_str())
                .map(|hash| ChunkEntry::new(e.value.as_str(), *hash))
        })
        .collect();

    let mut extended = entries.to_vec();
    extended.extend(resolved);
    extended
}

/// Build `<dir of script_url>/<token>.<hash>.js` for every hash-valued entry.
pub fn chunk_urls(entries: &[ChunkEntry], script_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(script_url) else {
        tracing::debug!("cannot derive chunk URLs from unparseable URL {script_url}");
        return Vec::new();
    };

    let urls: BTreeSet<String> = entries
        .iter()
        .filter(|e| e.is_hash())
        .filter_map(|e| base.join(&format!("{}.{}.js", e.id, e.value)).ok())
        .map(|u| u.to_string())
        .collect();

    urls.into_iter().collect()
}

/// Quoted string literals that look like absolute server paths.
pub fn scan_paths(script: &str) -> Vec<String> {
    path_regex()
        .captures_iter(script)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Chunk URLs reachable from a script plus the path strings it mentions.
pub fn resolve_chunks(script: &str, script_url: &str) -> ChunkResolution {
    let entries = scan_chunk_map(script);
    let extended = resolve_aliases(&entries);
    let chunk_urls = chunk_urls(&extended, script_url);
    let paths = scan_paths(script);

    tracing::debug!(
        "{script_url}: {} chunk entries, {} chunk URLs, {} paths",
        entries.len(),
        chunk_urls.len(),
        paths.len()
    );

    ChunkResolution { chunk_urls, paths }
}
