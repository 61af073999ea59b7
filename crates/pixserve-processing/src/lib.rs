//! Pixserve Processing Library
//!
//! The resize-and-cache pipeline: streaming download with size/time limits,
//! transparency-aware transcoding, per-item retry with backoff, bounded
//! concurrent batch scheduling, and the orchestration layer that ties them
//! to the cache store.

pub mod batch;
pub mod download;
pub mod format;
pub mod perf;
pub mod pipeline;
pub mod retry;
pub mod transcode;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export commonly used types
pub use batch::BatchScheduler;
pub use download::{DownloadError, HttpDownloader, ImageFetcher};
pub use perf::PerformanceStats;
pub use pipeline::{ResizeOptions, ResizePipeline};
pub use retry::ItemProcessor;
pub use transcode::{TranscodeError, TranscodeOutput, Transcoder};
