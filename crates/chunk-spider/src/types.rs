//! Core data types for fetched resources, traversal results and probe verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Lowercase hex SHA-256 digest of a resource's raw, undecoded bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a resource was interpreted after fetching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Markup,
    Script,
    /// Never classified because the fetch failed.
    Unknown,
}

/// Decoded resource body, tagged by how it should be parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Markup(String),
    Script(String),
}

impl Content {
    pub fn kind(&self) -> ContentKind {
        match self {
            Content::Markup(_) => ContentKind::Markup,
            Content::Script(_) => ContentKind::Script,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            Content::Markup(text) | Content::Script(text) => text,
        }
    }
}

/// A fetched and classified resource.
///
/// Only lives for the duration of one traversal step; the extracted URLs and
/// paths are what the engine keeps.
#[derive(Debug, Clone)]
pub struct Resource {
    pub url: String,
    pub raw: Vec<u8>,
    pub content: Content,
    pub hash: ContentHash,
}

impl Resource {
    pub fn kind(&self) -> ContentKind {
        self.content.kind()
    }
}

/// One `<id>: "<value>"` pair found in a bundler chunk map.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChunkEntry {
    /// Numeric chunk id, or an alias token after alias resolution.
    pub id: String,
    /// Either a 20-hex-digit content hash or an alias token.
    pub value: String,
}

impl ChunkEntry {
    pub fn new(id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            value: value.into(),
        }
    }

    /// Whether the value has the shape of a bundler content hash.
    pub fn is_hash(&self) -> bool {
        is_chunk_hash(&self.value)
    }
}

/// Exactly 20 lowercase hex digits.
pub fn is_chunk_hash(value: &str) -> bool {
    value.len() == 20
        && value
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// A fetch that terminated its branch of the traversal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchFailure {
    pub url: String,
    /// Always `Unknown`: the body never arrived to be classified.
    pub kind: ContentKind,
    pub reason: String,
}

impl FetchFailure {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind: ContentKind::Unknown,
            reason: reason.into(),
        }
    }
}

/// Result of one or more spider runs, with every set sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpiderReport {
    /// URLs that were fetched successfully.
    pub urls: Vec<String>,
    /// Path-like string literals found in script content.
    pub paths: Vec<String>,
    pub failures: Vec<FetchFailure>,
    /// Number of distinct contents that were parsed.
    pub parsed: usize,
    /// Number of fetches whose content had already been parsed under another URL.
    pub duplicates: usize,
}

/// Fingerprint of the response a host gives for paths that do not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Baseline {
    pub code: u16,
    pub length: usize,
}

/// Classification of a probed path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum PathVerdict {
    Success { code: u16 },
    Redirect { code: u16 },
    MethodNotAllowed,
    ClientError { code: u16 },
    ServerError { code: u16 },
    /// Response matched the host's not-found baseline exactly.
    NotFoundLike,
    Other { code: u16 },
    Unreachable { reason: String },
}

impl PathVerdict {
    /// Classify a raw status code by its leading digit.
    pub fn from_status(code: u16) -> Self {
        match code / 100 {
            2 => PathVerdict::Success { code },
            3 => PathVerdict::Redirect { code },
            4 if code == 405 => PathVerdict::MethodNotAllowed,
            4 => PathVerdict::ClientError { code },
            5 => PathVerdict::ServerError { code },
            _ => PathVerdict::Other { code },
        }
    }

    /// Whether the path appears to exist on the server.
    pub fn is_live(&self) -> bool {
        matches!(
            self,
            PathVerdict::Success { .. }
                | PathVerdict::Redirect { .. }
                | PathVerdict::MethodNotAllowed
                | PathVerdict::ServerError { .. }
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            PathVerdict::Success { .. } => "FOUND",
            PathVerdict::Redirect { .. } => "REDIRECT",
            PathVerdict::MethodNotAllowed => "METHOD NOT ALLOWED",
            PathVerdict::ClientError { .. } => "CLIENT ERROR",
            PathVerdict::ServerError { .. } => "SERVER ERROR",
            PathVerdict::NotFoundLike => "NOT FOUND",
            PathVerdict::Other { .. } => "OTHER",
            PathVerdict::Unreachable { .. } => "UNREACHABLE",
        }
    }
}

/// Verdict for one discovered path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub path: String,
    pub url: String,
    pub verdict: PathVerdict,
    pub code: Option<u16>,
    pub length: Option<usize>,
}

/// Failure of a single fetch. Aborts only the branch that issued it.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("no file content found")]
    EmptyBody,

    #[error("{0} returned")]
    Status(u16),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Errors surfaced to callers of the library.
#[derive(thiserror::Error, Debug)]
pub enum SpiderError {
    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Baseline error: {0}")]
    Baseline(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type SpiderResult<T> = Result<T, SpiderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_chunk_hash() {
        assert!(is_chunk_hash("26454eb9ee6ea13543d9"));
        assert!(!is_chunk_hash("26454eb9ee6ea13543d"));
        assert!(!is_chunk_hash("26454eb9ee6ea13543d9a"));
        assert!(!is_chunk_hash("26454EB9EE6EA13543D9"));
        assert!(!is_chunk_hash("vendor"));
    }

    #[test]
    fn test_verdict_from_status() {
        assert_eq!(PathVerdict::from_status(200), PathVerdict::Success { code: 200 });
        assert_eq!(PathVerdict::from_status(302), PathVerdict::Redirect { code: 302 });
        assert_eq!(PathVerdict::from_status(405), PathVerdict::MethodNotAllowed);
        assert_eq!(PathVerdict::from_status(403), PathVerdict::ClientError { code: 403 });
        assert_eq!(PathVerdict::from_status(503), PathVerdict::ServerError { code: 503 });
        assert_eq!(PathVerdict::from_status(101), PathVerdict::Other { code: 101 });
    }

    #[test]
    fn test_verdict_liveness() {
        assert!(PathVerdict::Success { code: 204 }.is_live());
        assert!(PathVerdict::MethodNotAllowed.is_live());
        assert!(!PathVerdict::NotFoundLike.is_live());
        assert!(!PathVerdict::ClientError { code: 404 }.is_live());
    }

    #[test]
    fn test_fetch_error_display() {
        assert_eq!(FetchError::Status(404).to_string(), "404 returned");
        assert_eq!(FetchError::EmptyBody.to_string(), "no file content found");
    }
}
