//! Content classification and content hashing.

use sha2::{Digest, Sha256};

use crate::types::{Content, ContentHash, Resource};

/// How the content-type header is matched.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyOptions {
    /// Match "javascript" case-sensitively in the content-type header.
    pub case_sensitive: bool,
}

/// SHA-256 of the raw bytes, before any text decoding.
pub fn content_hash(bytes: &[u8]) -> ContentHash {
    ContentHash(hex::encode(Sha256::digest(bytes)))
}

/// Whether the content-type header marks the body as script.
pub fn is_script_type(content_type: &str, options: ClassifyOptions) -> bool {
    if options.case_sensitive {
        content_type.contains("javascript")
    } else {
        content_type.to_ascii_lowercase().contains("javascript")
    }
}

/// Decide how a fetched body is parsed and compute its dedup hash.
///
/// Anything that is not declared as JavaScript is treated as markup.
pub fn classify(url: &str, raw: Vec<u8>, content_type: &str, options: ClassifyOptions) -> Resource {
    let hash = content_hash(&raw);
    let text = String::from_utf8_lossy(&raw).into_owned();
    let content = if is_script_type(content_type, options) {
        Content::Script(text)
    } else {
        Content::Markup(text)
    };

    Resource {
        url: url.to_string(),
        raw,
        content,
        hash,
    }
}
