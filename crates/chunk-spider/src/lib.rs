//! Chunk Spider: recursive discovery of a web application's bundled script
//! files through bundler chunk maps, plus live/phantom testing of the
//! path strings those scripts mention.

pub mod chunks;
pub mod classify;
pub mod fetcher;
pub mod html;
pub mod probe;
pub mod spider;
pub mod storage;
pub mod types;

pub use chunks::{resolve_chunks, ChunkResolution};
pub use classify::{classify, content_hash, ClassifyOptions};
pub use fetcher::{fetch_resource, Fetcher, FetcherConfig, HttpFetcher, HttpReply};
pub use html::{extract_references, resolve_reference, HtmlReferences};
pub use probe::{majority_baseline, BaselineProber, ProbeOptions};
pub use spider::{SpiderEngine, SpiderOptions};
pub use types::*;
