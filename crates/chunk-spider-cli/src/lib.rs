//! Chunk Spider command-line front end: argument resolution and result output.

pub mod config;
pub mod output;

pub use config::{read_targets, resolve_proxy, resolve_user_agent};
pub use output::{render_probes, render_report, write_lines, RunOutput};
