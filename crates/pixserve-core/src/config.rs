//! Configuration module
//!
//! Explicit configuration for the resize-and-cache service. Construction is
//! centralized here: either take the documented defaults or read overrides
//! from the environment in one place, then validate before wiring services.

use std::env;

// Defaults
const CACHE_TTL_SECS: u64 = 3600;
const CACHE_SWEEP_INTERVAL_SECS: u64 = 1800;
const DOWNLOAD_TIMEOUT_SECS: u64 = 15;
const MAX_DOWNLOAD_BYTES: u64 = 50 * 1024 * 1024;
const MAX_RETRIES: u32 = 2;
const BATCH_SIZE: usize = 10;
const MAX_CONCURRENT_CEILING: usize = 16;
const MAX_CONCURRENT_ENCODES: usize = 4;
const INTER_BATCH_DELAY_MS: u64 = 10;
const BACKGROUND_COLOR: &str = "ffffff";

/// Resize service configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Per-entry cache lifetime in seconds.
    pub cache_ttl_secs: u64,
    /// Interval between background sweeps of expired cache entries.
    pub cache_sweep_interval_secs: u64,
    /// Wall-clock ceiling for a single download request.
    pub download_timeout_secs: u64,
    /// Hard ceiling on accumulated response bytes per download.
    pub max_download_bytes: u64,
    /// Retries after the first failed attempt of a per-item pipeline.
    pub max_retries: u32,
    /// Number of items launched together in one batch chunk.
    pub batch_size: usize,
    /// Global in-flight item ceiling, shared with the connection pool size.
    pub max_concurrent: usize,
    /// Ceiling on simultaneous CPU-bound encode operations.
    pub max_concurrent_encodes: usize,
    /// Pause inserted between batch chunks.
    pub inter_batch_delay_ms: u64,
    /// Hex RGB background used when flattening transparency.
    pub background_color: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_ttl_secs: CACHE_TTL_SECS,
            cache_sweep_interval_secs: CACHE_SWEEP_INTERVAL_SECS,
            download_timeout_secs: DOWNLOAD_TIMEOUT_SECS,
            max_download_bytes: MAX_DOWNLOAD_BYTES,
            max_retries: MAX_RETRIES,
            batch_size: BATCH_SIZE,
            max_concurrent: default_max_concurrent(),
            max_concurrent_encodes: MAX_CONCURRENT_ENCODES,
            inter_batch_delay_ms: INTER_BATCH_DELAY_MS,
            background_color: BACKGROUND_COLOR.to_string(),
        }
    }
}

/// `min(2 * core count, 16)`, enough to keep the pool busy without
/// exhausting memory on wide hosts.
fn default_max_concurrent() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cores * 2).min(MAX_CONCURRENT_CEILING)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Build a configuration from environment overrides, falling back to the
    /// documented defaults for anything unset or unparseable.
    pub fn from_env() -> Result<Self, anyhow::Error> {
        let defaults = Config::default();
        let config = Config {
            cache_ttl_secs: env_parse("PIXSERVE_CACHE_TTL_SECS", defaults.cache_ttl_secs),
            cache_sweep_interval_secs: env_parse(
                "PIXSERVE_CACHE_SWEEP_INTERVAL_SECS",
                defaults.cache_sweep_interval_secs,
            ),
            download_timeout_secs: env_parse(
                "PIXSERVE_DOWNLOAD_TIMEOUT_SECS",
                defaults.download_timeout_secs,
            ),
            max_download_bytes: env_parse("PIXSERVE_MAX_DOWNLOAD_BYTES", defaults.max_download_bytes),
            max_retries: env_parse("PIXSERVE_MAX_RETRIES", defaults.max_retries),
            batch_size: env_parse("PIXSERVE_BATCH_SIZE", defaults.batch_size),
            max_concurrent: env_parse("PIXSERVE_MAX_CONCURRENT", defaults.max_concurrent),
            max_concurrent_encodes: env_parse(
                "PIXSERVE_MAX_CONCURRENT_ENCODES",
                defaults.max_concurrent_encodes,
            ),
            inter_batch_delay_ms: env_parse(
                "PIXSERVE_INTER_BATCH_DELAY_MS",
                defaults.inter_batch_delay_ms,
            ),
            background_color: env::var("PIXSERVE_BACKGROUND_COLOR")
                .unwrap_or(defaults.background_color),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be positive");
        }
        if self.max_concurrent == 0 {
            anyhow::bail!("max_concurrent must be positive");
        }
        if self.max_concurrent_encodes == 0 {
            anyhow::bail!("max_concurrent_encodes must be positive");
        }
        if self.cache_ttl_secs == 0 {
            anyhow::bail!("cache_ttl_secs must be positive");
        }
        if self.max_download_bytes == 0 {
            anyhow::bail!("max_download_bytes must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.cache_ttl_secs, 3600);
        assert_eq!(config.cache_sweep_interval_secs, 1800);
        assert_eq!(config.download_timeout_secs, 15);
        assert_eq!(config.max_download_bytes, 50 * 1024 * 1024);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.max_concurrent_encodes, 4);
        assert_eq!(config.inter_batch_delay_ms, 10);
        assert_eq!(config.background_color, "ffffff");
        assert!(config.max_concurrent >= 1);
        assert!(config.max_concurrent <= 16);
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_knobs() {
        let mut config = Config::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.max_concurrent = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.cache_ttl_secs = 0;
        assert!(config.validate().is_err());
    }
}
