//! Chunk Spider: entry point.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use chunk_spider::{
    BaselineProber, ClassifyOptions, FetcherConfig, HttpFetcher, ProbeOptions, ProbeResult,
    SpiderEngine, SpiderOptions,
};
use chunk_spider_cli::config::{self, origin_of, parse_header};
use chunk_spider_cli::output::{self, RunOutput};

#[derive(Parser)]
#[command(
    name = "chunk-spider",
    about = "Recursively download chunked JS files and find the paths they mention",
    version
)]
struct Cli {
    /// URL, or file containing one URL per line.
    #[arg(value_name = "TARGET")]
    target: Option<String>,

    /// URL of HTTP proxy to send requests through, e.g. http://localhost:8080.
    /// Also reads from CHUNK_SPIDER_PROXY.
    #[arg(long)]
    proxy: Option<String>,

    /// Only follow URLs on the same host as the seed URL.
    #[arg(long)]
    same_host: bool,

    /// Test discovered paths against the origin of each seed.
    #[arg(long)]
    test_paths: bool,

    /// Write discovered URLs to this file, one per line.
    #[arg(long, value_name = "FILE")]
    urls_out: Option<PathBuf>,

    /// Write discovered paths to this file, one per line.
    #[arg(long, value_name = "FILE")]
    paths_out: Option<PathBuf>,

    /// Save every fetched body into this directory, named after the URL basename.
    #[arg(long, value_name = "DIR")]
    save_dir: Option<PathBuf>,

    /// Extra request header in 'Name: value' form. Can be repeated.
    #[arg(long = "header", short = 'H', value_name = "HEADER")]
    headers: Vec<String>,

    /// User agent to send. Also reads from CHUNK_SPIDER_USER_AGENT.
    #[arg(long)]
    user_agent: Option<String>,

    /// Number of fetches in flight at once (1 = sequential depth-first).
    #[arg(long, default_value = "1")]
    concurrency: usize,

    /// Stop following new references after this many URLs.
    #[arg(long)]
    max_urls: Option<usize>,

    /// Per-request timeout in milliseconds (default: wait indefinitely).
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Match "javascript" in Content-Type case-sensitively.
    #[arg(long)]
    case_sensitive_content_type: bool,

    /// Output results as JSON.
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completion scripts.
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Completions { shell }) = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "chunk-spider", &mut std::io::stdout());
        return Ok(());
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let Some(target) = cli.target.as_deref() else {
        bail!("missing TARGET: pass a URL or a file of URLs");
    };
    let seeds = config::read_targets(target)?;
    if seeds.is_empty() {
        bail!("no URLs found in {target}");
    }

    let headers = cli
        .headers
        .iter()
        .map(|h| parse_header(h))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let fetcher_config = FetcherConfig {
        proxy: config::resolve_proxy(cli.proxy.as_deref()),
        user_agent: config::resolve_user_agent(cli.user_agent.as_deref()),
        headers,
        timeout_ms: cli.timeout_ms,
        ..FetcherConfig::default()
    };
    if let Some(proxy) = &fetcher_config.proxy {
        tracing::info!("Proxy: {proxy}");
    }
    let fetcher = Arc::new(HttpFetcher::new(&fetcher_config).context("failed to build HTTP client")?);

    let engine = SpiderEngine::new(
        fetcher.clone(),
        SpiderOptions {
            same_host_only: cli.same_host,
            save_directory: cli.save_dir.clone(),
            concurrency: cli.concurrency,
            max_urls: cli.max_urls,
            classify: ClassifyOptions {
                case_sensitive: cli.case_sensitive_content_type,
            },
        },
    );

    for seed in &seeds {
        if let Err(e) = engine.spider(seed).await {
            tracing::error!("{e}");
        }
    }
    let report = engine.report();

    let probes = if cli.test_paths {
        Some(test_paths(fetcher, &seeds, &report.paths).await)
    } else {
        None
    };

    if let Some(path) = &cli.urls_out {
        output::write_lines(path, &report.urls)?;
        tracing::info!("Wrote {} URLs to {}", report.urls.len(), path.display());
    }
    if let Some(path) = &cli.paths_out {
        output::write_lines(path, &report.paths)?;
        tracing::info!("Wrote {} paths to {}", report.paths.len(), path.display());
    }

    if cli.json {
        let run = RunOutput {
            report: &report,
            probes: probes.as_deref(),
        };
        println!("{}", serde_json::to_string_pretty(&run)?);
    } else {
        print!("{}", output::render_report(&report));
        if let Some(results) = &probes {
            print!("{}", output::render_probes(results));
        }
    }

    Ok(())
}

/// Probe every discovered path against each distinct seed origin.
async fn test_paths(fetcher: Arc<HttpFetcher>, seeds: &[String], paths: &[String]) -> Vec<ProbeResult> {
    let origins: BTreeSet<String> = seeds.iter().filter_map(|s| origin_of(s)).collect();
    let prober = BaselineProber::new(fetcher, ProbeOptions::default());

    let mut results = Vec::new();
    for origin in origins {
        match prober.probe_paths(&origin, paths).await {
            Ok(found) => results.extend(found),
            Err(e) => tracing::warn!("skipping path tests against {origin}: {e}"),
        }
    }
    results
}
