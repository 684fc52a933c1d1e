//! Raw body persistence for fetched resources.

use std::path::{Path, PathBuf};

use crate::types::SpiderResult;

/// File name used when the URL path has no basename.
const INDEX_FILE_NAME: &str = "index.html";

/// Basename of the URL's path, or `index.html` for directory URLs.
pub fn file_name_for(url: &str) -> String {
    let path = match url::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };

    let base = path.rsplit('/').next().unwrap_or("");
    let base = sanitize_file_name(base);
    if base.is_empty() || base == "." || base == ".." {
        INDEX_FILE_NAME.to_string()
    } else {
        base
    }
}

// Keep names portable: anything outside a conservative set becomes '_'.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | '~' | '%') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write a raw body into `dir`, named after the URL's basename.
pub fn save_raw(dir: &Path, url: &str, bytes: &[u8]) -> SpiderResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(file_name_for(url));
    std::fs::write(&path, bytes)?;
    Ok(path)
}
