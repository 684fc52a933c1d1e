//! Configuration loading and resolution.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chunk_spider::fetcher::DEFAULT_USER_AGENT;

/// Proxy used when `--proxy` is not given.
pub const PROXY_ENV: &str = "CHUNK_SPIDER_PROXY";

/// User agent used when `--user-agent` is not given.
pub const USER_AGENT_ENV: &str = "CHUNK_SPIDER_USER_AGENT";

/// Resolve the proxy endpoint: flag, then environment.
pub fn resolve_proxy(explicit: Option<&str>) -> Option<String> {
    if let Some(proxy) = explicit {
        return Some(proxy.to_string());
    }

    std::env::var(PROXY_ENV).ok().filter(|p| !p.trim().is_empty())
}

/// Resolve the user agent: flag, then environment, then the built-in browser UA.
pub fn resolve_user_agent(explicit: Option<&str>) -> String {
    if let Some(ua) = explicit {
        return ua.to_string();
    }

    if let Ok(env_ua) = std::env::var(USER_AGENT_ENV) {
        if !env_ua.trim().is_empty() {
            return env_ua;
        }
    }

    DEFAULT_USER_AGENT.to_string()
}

/// Parse a `Name: value` header argument.
pub fn parse_header(raw: &str) -> Result<(String, String)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header '{raw}' is not in 'Name: value' form");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header '{raw}' has an empty name");
    }
    Ok((name.to_string(), value.trim().to_string()))
}

/// Expand the target argument into seed URLs.
///
/// A target with an `http`/`https` scheme is a single seed; anything else is
/// read as a file with one URL per line, skipping blank lines and `#` comments.
pub fn read_targets(target: &str) -> Result<Vec<String>> {
    if is_http_url(target) {
        return Ok(vec![target.to_string()]);
    }

    let path = Path::new(target);
    if !path.is_file() {
        bail!("'{target}' is neither an http(s) URL nor a readable file");
    }

    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read targets from {}", path.display()))?;

    Ok(contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// `scheme://authority` of a URL, used as the base for path probing.
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed.host_str()?;
    Some(parsed[..url::Position::BeforePath].to_string())
}

fn is_http_url(value: &str) -> bool {
    url::Url::parse(value)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}
