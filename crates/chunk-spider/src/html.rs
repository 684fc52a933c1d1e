//! Script reference extraction from markup.
//!
//! External `<script src>` references are resolved against the document URL.
//! Inline script bodies are joined into one synthetic script attributed to
//! the document itself and run through chunk resolution, so chunk maps that
//! a page embeds inline are followed as well.

use std::collections::BTreeSet;

use scraper::{Html, Selector};
use url::{Position, Url};

use crate::chunks;

/// References found in one markup document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HtmlReferences {
    /// Sorted, deduplicated absolute script URLs.
    pub urls: Vec<String>,
    /// Path strings found in inline script bodies.
    pub paths: Vec<String>,
}

/// Resolve a `src` attribute value against the document URL.
///
/// Rules, in order: absolute `http(s)://` is kept verbatim, protocol-relative
/// `//host/...` takes the document's scheme, root-relative `/...` takes the
/// document's scheme and host, anything else is relative to the document's
/// directory. Returns `None` for empty input, an unparseable document URL, or
/// a result that is not `http`/`https`.
pub fn resolve_reference(src: &str, document_url: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }

    if src.starts_with("http://") || src.starts_with("https://") {
        return Some(src.to_string());
    }

    let doc = Url::parse(document_url).ok()?;

    let resolved = if src.starts_with("//") {
        format!("{}:{src}", doc.scheme())
    } else if src.starts_with('/') {
        format!("{}{src}", &doc[..Position::BeforePath])
    } else {
        doc.join(src).ok()?.to_string()
    };

    let parsed = Url::parse(&resolved).ok()?;
    matches!(parsed.scheme(), "http" | "https").then_some(resolved)
}

/// Collect every script reference in a markup document.
pub fn extract_references(markup: &str, document_url: &str) -> HtmlReferences {
    let document = Html::parse_document(markup);
    let Ok(selector) = Selector::parse("script") else {
        return HtmlReferences::default();
    };

    let mut urls = BTreeSet::new();
    let mut inline = Vec::new();

    for script in document.select(&selector) {
        match script.value().attr("src").map(str::trim) {
            Some(src) if !src.is_empty() => {
                if let Some(url) = resolve_reference(src, document_url) {
                    urls.insert(url);
                } else {
                    tracing::debug!("skipping unresolvable script src {src:?} in {document_url}");
                }
            }
            _ => {
                let body = script.text().collect::<String>();
                let body = body.trim();
                if !body.is_empty() {
                    inline.push(body.to_string());
                }
            }
        }
    }

    let mut paths = Vec::new();
    if !inline.is_empty() {
        let blob = inline.join("\n");
        let resolution = chunks::resolve_chunks(&blob, document_url);
        urls.extend(resolution.chunk_urls);
        paths = resolution.paths;
    }

    HtmlReferences {
        urls: urls.into_iter().collect(),
        paths,
    }
}
