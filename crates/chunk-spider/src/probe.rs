//! Live/phantom classification of discovered paths.
//!
//! Many hosts answer unknown paths with a catch-all page and a `200`. Before
//! testing paths, a handful of random paths that cannot exist are requested;
//! the most common status code and the most common body length across those
//! replies form the host's not-found [`Baseline`]. A probed path whose reply
//! matches the baseline exactly is reported as [`PathVerdict::NotFoundLike`]
//! whatever its status code says.
//!
//! The sample is small, so this is a heuristic: pages whose length varies per
//! request defeat it, and a real endpoint that happens to match the baseline
//! pair is hidden.

use std::collections::{BTreeSet, HashMap};
use std::hash::Hash;
use std::sync::Arc;

use dashmap::DashMap;
use futures::stream::{self, StreamExt};
use rand::Rng;

use crate::fetcher::Fetcher;
use crate::types::{Baseline, PathVerdict, ProbeResult, SpiderError, SpiderResult};

/// Length of each random baseline path, excluding the leading slash.
const RANDOM_PATH_LEN: usize = 20;

const RANDOM_PATH_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Settings for [`BaselineProber`].
#[derive(Debug, Clone)]
pub struct ProbeOptions {
    /// Random paths requested to establish a baseline.
    pub samples: usize,
    /// Path probes in flight at once.
    pub concurrency: usize,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            samples: 10,
            concurrency: 4,
        }
    }
}

/// Tests discovered paths against a base URL.
pub struct BaselineProber {
    fetcher: Arc<dyn Fetcher>,
    options: ProbeOptions,
    baselines: DashMap<String, Baseline>,
}

impl BaselineProber {
    pub fn new(fetcher: Arc<dyn Fetcher>, options: ProbeOptions) -> Self {
        Self {
            fetcher,
            options,
            baselines: DashMap::new(),
        }
    }

    /// Baseline previously established for `base_url`, if any.
    pub fn baseline(&self, base_url: &str) -> Option<Baseline> {
        self.baselines.get(base_key(base_url)).map(|b| *b)
    }

    /// Request random root paths and record the majority (code, length).
    pub async fn establish_baseline(&self, base_url: &str) -> SpiderResult<Baseline> {
        let urls: Vec<String> = (0..self.options.samples.max(1))
            .map(|_| join_path(base_url, &random_probe_path()))
            .collect();

        let mut samples = Vec::with_capacity(urls.len());
        for url in &urls {
            match self.fetcher.get(url).await {
                Ok(reply) => samples.push((reply.status, reply.body.len())),
                Err(e) => tracing::warn!("baseline probe {url} failed: {e}"),
            }
        }

        let baseline = majority_baseline(&samples).ok_or_else(|| {
            SpiderError::Baseline(format!("no baseline probe against {base_url} got a response"))
        })?;

        tracing::info!(
            "baseline for {base_url}: {} with {} bytes ({} samples)",
            baseline.code,
            baseline.length,
            samples.len()
        );
        self.baselines.insert(base_key(base_url).to_string(), baseline);
        Ok(baseline)
    }

    /// Fetch `base_url + path` and classify the reply.
    pub async fn classify_path(&self, base_url: &str, path: &str) -> ProbeResult {
        let url = join_path(base_url, path);
        let baseline = self.baseline(base_url);

        match self.fetcher.get(&url).await {
            Ok(reply) => {
                let code = reply.status;
                let length = reply.body.len();
                let verdict = if baseline == Some(Baseline { code, length }) {
                    PathVerdict::NotFoundLike
                } else {
                    PathVerdict::from_status(code)
                };
                tracing::debug!("{url}: {code} {length} bytes -> {}", verdict.label());
                ProbeResult {
                    path: path.to_string(),
                    url,
                    verdict,
                    code: Some(code),
                    length: Some(length),
                }
            }
            Err(e) => {
                tracing::warn!("{url}: {e}");
                ProbeResult {
                    path: path.to_string(),
                    url,
                    verdict: PathVerdict::Unreachable {
                        reason: e.to_string(),
                    },
                    code: None,
                    length: None,
                }
            }
        }
    }

    /// Establish a baseline for `base_url`, then classify every distinct path.
    ///
    /// Results are sorted by path.
    pub async fn probe_paths(&self, base_url: &str, paths: &[String]) -> SpiderResult<Vec<ProbeResult>> {
        self.establish_baseline(base_url).await?;

        let distinct: BTreeSet<&str> = paths.iter().map(String::as_str).collect();
        let mut results: Vec<ProbeResult> = stream::iter(distinct)
            .map(|path| self.classify_path(base_url, path))
            .buffer_unordered(self.options.concurrency.max(1))
            .collect()
            .await;

        results.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(results)
    }
}

/// Majority status code and majority body length across baseline samples.
///
/// Each is voted independently; ties go to the smaller value.
pub fn majority_baseline(samples: &[(u16, usize)]) -> Option<Baseline> {
    let code = majority(samples.iter().map(|(code, _)| *code))?;
    let length = majority(samples.iter().map(|(_, length)| *length))?;
    Some(Baseline { code, length })
}

fn majority<T: Copy + Eq + Hash + Ord>(values: impl Iterator<Item = T>) -> Option<T> {
    let mut counts: HashMap<T, usize> = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
        .into_iter()
        .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
        .map(|(value, _)| value)
}

/// `/` followed by 20 random lowercase alphanumerics.
pub fn random_probe_path() -> String {
    let mut rng = rand::thread_rng();
    let name: String = (0..RANDOM_PATH_LEN)
        .map(|_| RANDOM_PATH_CHARSET[rng.gen_range(0..RANDOM_PATH_CHARSET.len())] as char)
        .collect();
    format!("/{name}")
}

/// Append a root-relative path to a base URL without doubling the slash.
pub fn join_path(base_url: &str, path: &str) -> String {
    let base = base_key(base_url);
    if path.starts_with('/') {
        format!("{base}{path}")
    } else {
        format!("{base}/{path}")
    }
}

fn base_key(base_url: &str) -> &str {
    base_url.trim_end_matches('/')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_majority_baseline() {
        let mut samples = vec![(404, 120); 8];
        samples.push((200, 5000));
        samples.push((500, 12));
        assert_eq!(
            majority_baseline(&samples),
            Some(Baseline {
                code: 404,
                length: 120
            })
        );
    }

    #[test]
    fn test_majority_votes_independently() {
        let samples = vec![(200, 10), (200, 11), (404, 11)];
        assert_eq!(
            majority_baseline(&samples),
            Some(Baseline {
                code: 200,
                length: 11
            })
        );
    }

    #[test]
    fn test_majority_tie_prefers_smaller() {
        let samples = vec![(404, 20), (200, 10)];
        assert_eq!(
            majority_baseline(&samples),
            Some(Baseline {
                code: 200,
                length: 10
            })
        );
        assert_eq!(majority_baseline(&[]), None);
    }

    #[test]
    fn test_random_probe_path() {
        let path = random_probe_path();
        assert_eq!(path.len(), 21);
        assert!(path.starts_with('/'));
        assert!(path[1..]
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
        assert_ne!(random_probe_path(), random_probe_path());
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path("https://example.com/", "/api"), "https://example.com/api");
        assert_eq!(join_path("https://example.com", "/api"), "https://example.com/api");
        assert_eq!(join_path("https://example.com", "api"), "https://example.com/api");
    }
}
