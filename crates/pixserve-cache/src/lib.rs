//! Pixserve Cache Library
//!
//! In-memory TTL cache for resized-image artifacts, with a background
//! sweeper for proactive expiry and monotonic hit/miss accounting.

pub mod store;

pub use store::{CacheStats, CacheStore, SweeperHandle};
