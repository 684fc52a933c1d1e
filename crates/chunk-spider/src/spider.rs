//! Recursive discovery of bundled script files.
//!
//! The engine owns three sets that only grow for its lifetime: discovered
//! URLs, parsed content hashes and discovered path strings. URL admission is
//! a single `DashSet::insert`, so a URL is scheduled at most once even when
//! several fetches are in flight; the same holds for content hashes, so each
//! distinct body is parsed at most once however many URLs serve it.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::{DashMap, DashSet};
use futures::stream::{self, StreamExt};
use url::Url;

use crate::chunks;
use crate::classify::{self, ClassifyOptions};
use crate::fetcher::{fetch_resource, Fetcher, HttpReply};
use crate::html;
use crate::storage;
use crate::types::{
    Content, ContentHash, FetchError, FetchFailure, SpiderError, SpiderReport, SpiderResult,
};

/// Traversal policy.
#[derive(Debug, Clone)]
pub struct SpiderOptions {
    /// Only follow URLs whose host equals the seed's host.
    pub same_host_only: bool,
    /// Write each parsed body here, named after the URL basename.
    pub save_directory: Option<PathBuf>,
    /// Fetches in flight at once. `1` is strict depth-first order.
    pub concurrency: usize,
    /// Stop admitting new URLs once this many have been discovered.
    pub max_urls: Option<usize>,
    pub classify: ClassifyOptions,
}

impl Default for SpiderOptions {
    fn default() -> Self {
        Self {
            same_host_only: false,
            save_directory: None,
            concurrency: 1,
            max_urls: None,
            classify: ClassifyOptions::default(),
        }
    }
}

/// Drives discovery from one or more seed URLs over shared state.
pub struct SpiderEngine {
    fetcher: Arc<dyn Fetcher>,
    options: SpiderOptions,
    urls: DashSet<String>,
    hashes: DashSet<ContentHash>,
    paths: DashSet<String>,
    failures: DashMap<String, String>,
    parsed: AtomicUsize,
    duplicates: AtomicUsize,
    /// Slots taken in `urls`; reserved before insert so `max_urls` holds
    /// under concurrent spider calls.
    admitted: AtomicUsize,
    truncated: AtomicBool,
}

impl SpiderEngine {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: SpiderOptions) -> Self {
        Self {
            fetcher,
            options,
            urls: DashSet::new(),
            hashes: DashSet::new(),
            paths: DashSet::new(),
            failures: DashMap::new(),
            parsed: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            admitted: AtomicUsize::new(0),
            truncated: AtomicBool::new(false),
        }
    }

    /// Spider everything reachable from `seed`.
    ///
    /// The seed's host is the origin for the same-host policy of this call.
    /// Fetch failures only end their own branch; the only error is a seed
    /// that is not an absolute `http(s)` URL.
    pub async fn spider(&self, seed: &str) -> SpiderResult<()> {
        let origin = origin_host(seed)?;
        tracing::info!("spidering {seed}");

        if !self.admit(seed, &origin) {
            tracing::debug!("seed {seed} already discovered, nothing to do");
            return Ok(());
        }

        let width = self.options.concurrency.max(1);
        let mut stack = vec![seed.to_string()];

        while !stack.is_empty() {
            let take = width.min(stack.len());
            let batch: Vec<String> = stack.split_off(stack.len() - take).into_iter().rev().collect();

            let fetched: Vec<(String, Result<HttpReply, FetchError>)> = stream::iter(batch)
                .map(|url| async move {
                    let result = fetch_resource(self.fetcher.as_ref(), &url).await;
                    (url, result)
                })
                .buffered(width)
                .collect()
                .await;

            for (url, result) in fetched {
                let candidates = self.visit(&url, result);
                for candidate in candidates.into_iter().rev() {
                    if self.admit(&candidate, &origin) {
                        stack.push(candidate);
                    }
                }
            }
        }

        tracing::info!(
            "finished {seed}: {} URLs, {} paths so far",
            self.urls.len(),
            self.paths.len()
        );
        Ok(())
    }

    /// Sorted snapshot of everything discovered so far.
    pub fn report(&self) -> SpiderReport {
        let mut failures: Vec<FetchFailure> = self
            .failures
            .iter()
            .map(|entry| FetchFailure::new(entry.key().clone(), entry.value().clone()))
            .collect();
        failures.sort_by(|a, b| a.url.cmp(&b.url));

        SpiderReport {
            urls: self.urls(),
            paths: self.paths(),
            failures,
            parsed: self.parsed.load(Ordering::Relaxed),
            duplicates: self.duplicates.load(Ordering::Relaxed),
        }
    }

    pub fn urls(&self) -> Vec<String> {
        sorted(&self.urls)
    }

    pub fn paths(&self) -> Vec<String> {
        sorted(&self.paths)
    }

    /// Test-and-set a candidate into the discovered set.
    fn admit(&self, candidate: &str, origin: &str) -> bool {
        if self.failures.contains_key(candidate) {
            tracing::debug!("skipping {candidate}: fetch already failed");
            return false;
        }

        if self.options.same_host_only {
            let host = Url::parse(candidate)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string));
            if host.as_deref() != Some(origin) {
                tracing::debug!("skipping {candidate}: not on {origin}");
                return false;
            }
        }

        if self.urls.contains(candidate) {
            tracing::debug!("skipping {candidate}: already known");
            return false;
        }

        let max = self.options.max_urls.unwrap_or(usize::MAX);
        let reserved = self
            .admitted
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < max).then_some(n + 1))
            .is_ok();
        if !reserved {
            if !self.truncated.swap(true, Ordering::Relaxed) {
                tracing::warn!("URL limit of {max} reached, not following further references");
            }
            return false;
        }

        if !self.urls.insert(candidate.to_string()) {
            // Lost the race to another in-flight admission of the same URL.
            self.admitted.fetch_sub(1, Ordering::AcqRel);
            tracing::debug!("skipping {candidate}: already known");
            return false;
        }
        tracing::debug!("testing new URL {candidate}");
        true
    }

    /// Classify and parse one fetched resource, returning its candidate URLs.
    fn visit(&self, url: &str, result: Result<HttpReply, FetchError>) -> Vec<String> {
        let reply = match result {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("{url}: {e}");
                self.failures.insert(url.to_string(), e.to_string());
                if self.urls.remove(url).is_some() {
                    self.admitted.fetch_sub(1, Ordering::AcqRel);
                }
                return Vec::new();
            }
        };

        let resource = classify::classify(url, reply.body, &reply.content_type, self.options.classify);

        if !self.hashes.insert(resource.hash.clone()) {
            self.duplicates.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("{url}: content {} already parsed", resource.hash);
            return Vec::new();
        }
        self.parsed.fetch_add(1, Ordering::Relaxed);

        if let Some(dir) = &self.options.save_directory {
            match storage::save_raw(dir, url, &resource.raw) {
                Ok(path) => tracing::debug!("saved {url} to {}", path.display()),
                Err(e) => tracing::warn!("could not save {url}: {e}"),
            }
        }

        let (candidates, paths) = match &resource.content {
            Content::Markup(text) => {
                let refs = html::extract_references(text, url);
                (refs.urls, refs.paths)
            }
            Content::Script(text) => {
                let resolution = chunks::resolve_chunks(text, url);
                (resolution.chunk_urls, resolution.paths)
            }
        };

        tracing::info!(
            "{url}: {:?}, {} references, {} paths",
            resource.kind(),
            candidates.len(),
            paths.len()
        );

        for path in paths {
            self.paths.insert(path);
        }

        candidates
    }
}

fn origin_host(seed: &str) -> SpiderResult<String> {
    let parsed = Url::parse(seed).map_err(|e| SpiderError::InvalidSeed(format!("{seed}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(SpiderError::InvalidSeed(format!(
            "{seed}: unsupported scheme '{}'",
            parsed.scheme()
        )));
    }
    parsed
        .host_str()
        .map(str::to_string)
        .ok_or_else(|| SpiderError::InvalidSeed(format!("{seed}: missing host")))
}

fn sorted(set: &DashSet<String>) -> Vec<String> {
    let mut items: Vec<String> = set.iter().map(|s| s.key().clone()).collect();
    items.sort();
    items
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, (&'static str, String)>,
        calls: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn page(mut self, url: &str, content_type: &'static str, body: &str) -> Self {
            self.pages.insert(url.to_string(), (content_type, body.to_string()));
            self
        }
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn get(&self, url: &str) -> Result<HttpReply, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            Ok(match self.pages.get(url) {
                Some((content_type, body)) => HttpReply {
                    url: url.to_string(),
                    status: 200,
                    content_type: content_type.to_string(),
                    body: body.as_bytes().to_vec(),
                },
                None => HttpReply {
                    url: url.to_string(),
                    status: 404,
                    content_type: "text/html".to_string(),
                    body: b"not found".to_vec(),
                },
            })
        }
    }

    const JS: &str = "application/javascript";

    #[tokio::test]
    async fn test_invalid_seed() {
        let engine = SpiderEngine::new(Arc::new(MapFetcher::default()), SpiderOptions::default());
        assert!(matches!(
            engine.spider("example.com").await,
            Err(SpiderError::InvalidSeed(_))
        ));
        assert!(matches!(
            engine.spider("ftp://example.com/x").await,
            Err(SpiderError::InvalidSeed(_))
        ));
    }

    #[tokio::test]
    async fn test_seed_failure_is_not_fatal() {
        let fetcher = Arc::new(MapFetcher::default());
        let engine = SpiderEngine::new(fetcher, SpiderOptions::default());
        engine.spider("https://example.com/").await.unwrap();
        let report = engine.report();
        assert!(report.urls.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].reason, "404 returned");
    }

    #[tokio::test]
    async fn test_failed_url_removed_and_not_refetched() {
        let fetcher = Arc::new(
            MapFetcher::default()
                .page(
                    "https://example.com/",
                    "text/html",
                    r#"<script src="/a.js"></script><script src="/missing.js"></script>"#,
                )
                .page("https://example.com/a.js", JS, "var a = 1;")
                .page(
                    "https://example.com/other.html",
                    "text/html",
                    r#"<script src="missing.js"></script>"#,
                ),
        );
        let engine = SpiderEngine::new(fetcher.clone(), SpiderOptions::default());
        engine.spider("https://example.com/").await.unwrap();
        engine.spider("https://example.com/other.html").await.unwrap();

        let report = engine.report();
        assert_eq!(
            report.urls,
            vec![
                "https://example.com/",
                "https://example.com/a.js",
                "https://example.com/other.html",
            ]
        );
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].url, "https://example.com/missing.js");

        let calls = fetcher.calls.lock().unwrap();
        let missing = calls.iter().filter(|u| u.ends_with("missing.js")).count();
        assert_eq!(missing, 1);
    }

    #[tokio::test]
    async fn test_max_urls_guard() {
        let hashes = ["11111111111111111111", "22222222222222222222", "33333333333333333333"];
        let runtime = format!(
            r#"{{1:"{}",2:"{}",3:"{}"}}"#,
            hashes[0], hashes[1], hashes[2]
        );
        let mut fetcher = MapFetcher::default().page("https://example.com/runtime.js", JS, &runtime);
        for (i, hash) in hashes.iter().enumerate() {
            let url = format!("https://example.com/{}.{hash}.js", i + 1);
            fetcher = fetcher.page(&url, JS, &format!("var chunk{i};"));
        }

        let options = SpiderOptions {
            max_urls: Some(2),
            ..SpiderOptions::default()
        };
        let engine = SpiderEngine::new(Arc::new(fetcher), options);
        engine.spider("https://example.com/runtime.js").await.unwrap();
        assert_eq!(engine.urls().len(), 2);
    }

    #[tokio::test]
    async fn test_save_directory() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = MapFetcher::default().page("https://example.com/static/app.js", JS, "var a;");
        let options = SpiderOptions {
            save_directory: Some(dir.path().to_path_buf()),
            ..SpiderOptions::default()
        };
        let engine = SpiderEngine::new(Arc::new(fetcher), options);
        engine.spider("https://example.com/static/app.js").await.unwrap();
        let saved = std::fs::read_to_string(dir.path().join("app.js")).unwrap();
        assert_eq!(saved, "var a;");
    }

    #[tokio::test]
    async fn test_unwritable_save_directory_is_only_a_warning() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let fetcher = MapFetcher::default().page(
            "https://example.com/app.js",
            JS,
            r#"fetch("/api/ping")"#,
        );
        let options = SpiderOptions {
            // A regular file cannot be used as a directory.
            save_directory: Some(file.path().to_path_buf()),
            ..SpiderOptions::default()
        };
        let engine = SpiderEngine::new(Arc::new(fetcher), options);
        engine.spider("https://example.com/app.js").await.unwrap();
        assert_eq!(engine.paths(), vec!["/api/ping"]);
    }
}
