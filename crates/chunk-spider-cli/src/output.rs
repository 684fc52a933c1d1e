//! Result rendering and result-file writing.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use chunk_spider::{ProbeResult, SpiderReport};

/// Everything a run produced, for `--json`.
#[derive(Debug, Serialize)]
pub struct RunOutput<'a> {
    #[serde(flatten)]
    pub report: &'a SpiderReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probes: Option<&'a [ProbeResult]>,
}

/// Write one entry per line, each newline-terminated.
pub fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    let mut contents = String::new();
    for line in lines {
        contents.push_str(line);
        contents.push('\n');
    }

    std::fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}

/// Human-readable summary of the discovered URLs and paths.
pub fn render_report(report: &SpiderReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "\nSearched these URLs:\n");
    for url in &report.urls {
        let _ = writeln!(out, "{url}");
    }

    let _ = writeln!(out, "\nThe following look like paths:\n");
    for path in &report.paths {
        let _ = writeln!(out, "{path}");
    }

    if !report.failures.is_empty() {
        let _ = writeln!(out, "\nCould not fetch:\n");
        for failure in &report.failures {
            let _ = writeln!(out, "{}  ({})", failure.url, failure.reason);
        }
    }

    let _ = writeln!(
        out,
        "\n{} URLs, {} paths, {} distinct contents parsed, {} duplicates skipped",
        report.urls.len(),
        report.paths.len(),
        report.parsed,
        report.duplicates
    );
    out
}

/// One line per probed path: verdict, status, length, URL.
pub fn render_probes(results: &[ProbeResult]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\nPath test results:\n");
    for result in results {
        let code = result
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "-".to_string());
        let length = result
            .length
            .map(|l| l.to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "{:<18} {:>3} {:>8}  {}",
            result.verdict.label(),
            code,
            length,
            result.url
        );
    }

    let live = results.iter().filter(|r| r.verdict.is_live()).count();
    let _ = writeln!(out, "\n{live} of {} paths look live", results.len());
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunk_spider::{FetchFailure, PathVerdict};

    fn report() -> SpiderReport {
        SpiderReport {
            urls: vec!["https://example.com/".to_string(), "https://example.com/a.js".to_string()],
            paths: vec!["/api/users".to_string()],
            failures: vec![FetchFailure::new("https://example.com/b.js", "404 returned")],
            parsed: 2,
            duplicates: 0,
        }
    }

    #[test]
    fn test_write_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("urls.txt");
        write_lines(&path, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");

        write_lines(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_render_report() {
        let text = render_report(&report());
        assert!(text.contains("Searched these URLs:"));
        assert!(text.contains("https://example.com/a.js\n"));
        assert!(text.contains("/api/users\n"));
        assert!(text.contains("https://example.com/b.js  (404 returned)"));
    }

    #[test]
    fn test_render_probes() {
        let results = vec![
            ProbeResult {
                path: "/api/users".to_string(),
                url: "https://example.com/api/users".to_string(),
                verdict: PathVerdict::Success { code: 200 },
                code: Some(200),
                length: Some(12),
            },
            ProbeResult {
                path: "/nope".to_string(),
                url: "https://example.com/nope".to_string(),
                verdict: PathVerdict::NotFoundLike,
                code: Some(200),
                length: Some(900),
            },
        ];
        let text = render_probes(&results);
        assert!(text.contains("FOUND"));
        assert!(text.contains("NOT FOUND"));
        assert!(text.contains("1 of 2 paths look live"));
    }

    #[test]
    fn test_json_output_shape() {
        let report = report();
        let value = serde_json::to_value(RunOutput {
            report: &report,
            probes: None,
        })
        .unwrap();
        assert_eq!(value["urls"][1], "https://example.com/a.js");
        assert_eq!(value["failures"][0]["reason"], "404 returned");
        assert_eq!(value["failures"][0]["kind"], "unknown");
        assert!(value.get("probes").is_none());
    }
}
