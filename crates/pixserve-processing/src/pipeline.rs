//! Orchestration
//!
//! Ties cache lookups to miss processing: single images go through the
//! per-item pipeline directly, whole folders split into cache hits (served
//! immediately) and misses (dispatched as one batch). Successful miss
//! results are written back into the cache before being merged into the
//! output. Hits and processed misses are concatenated; input order is not
//! guaranteed across the two groups.

use std::sync::Arc;
use std::time::Duration;

use pixserve_cache::{CacheStats, CacheStore};
use pixserve_core::{derive_cache_key, folder_key_prefix, AppError, Config, ProcessedResult,
    SourceFile};

use crate::batch::BatchScheduler;
use crate::download::ImageFetcher;
use crate::perf::PerformanceStats;
use crate::retry::ItemProcessor;

/// Per-request knobs for the two entry points.
#[derive(Debug, Clone, Default)]
pub struct ResizeOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Bypass cache reads for this call. Existing entries are not deleted;
    /// they are overwritten if reprocessing succeeds.
    pub purge_cache: bool,
    /// Hex RGB flattening background; falls back to the configured default.
    pub background_color: Option<String>,
}

pub struct ResizePipeline {
    config: Config,
    cache: Arc<CacheStore>,
    processor: Arc<ItemProcessor>,
    scheduler: BatchScheduler,
}

impl ResizePipeline {
    pub fn new(config: Config, cache: Arc<CacheStore>, fetcher: Arc<dyn ImageFetcher>) -> Self {
        let processor = Arc::new(ItemProcessor::new(
            fetcher,
            config.max_concurrent_encodes,
            config.max_retries,
        ));
        let scheduler = BatchScheduler::new(
            config.batch_size,
            config.max_concurrent,
            Duration::from_millis(config.inter_batch_delay_ms),
        );
        Self {
            config,
            cache,
            processor,
            scheduler,
        }
    }

    fn validate_dimensions(options: &ResizeOptions) -> Result<(), AppError> {
        if options.width.is_none() && options.height.is_none() {
            return Err(AppError::InvalidInput(
                "at least one of width or height is required".to_string(),
            ));
        }
        for dimension in [options.width, options.height].into_iter().flatten() {
            if dimension == 0 {
                return Err(AppError::InvalidInput(
                    "dimensions must be positive".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn background<'a>(&'a self, options: &'a ResizeOptions) -> &'a str {
        options
            .background_color
            .as_deref()
            .unwrap_or(&self.config.background_color)
    }

    /// Resize one named image from a folder listing. Raises `NotFound` when
    /// the name is absent; processing failures come back as result data.
    pub async fn resize_single(
        &self,
        folder: &str,
        name: &str,
        files: &[SourceFile],
        options: &ResizeOptions,
    ) -> Result<ProcessedResult, AppError> {
        Self::validate_dimensions(options)?;

        let file = files
            .iter()
            .find(|file| file.name == name)
            .ok_or_else(|| AppError::NotFound(format!("image {name} in folder {folder}")))?;

        let key = derive_cache_key(folder, options.width, options.height, &file.url);
        if !options.purge_cache {
            if let Some(entry) = self.cache.get(&key) {
                return Ok(ProcessedResult::cached(file.clone(), entry));
            }
        }

        // A single item skips the batch scheduler.
        let result = self
            .processor
            .process_with_retry(file, options.width, options.height, self.background(options))
            .await;

        if let Some(entry) = result.entry() {
            self.cache.insert(key, entry.clone());
        }
        Ok(result)
    }

    /// Resize every file in a folder listing. Output length always equals
    /// input length; hits come first, then freshly processed misses.
    pub async fn resize_folder(
        &self,
        files: &[SourceFile],
        folder: &str,
        options: &ResizeOptions,
    ) -> Result<Vec<ProcessedResult>, AppError> {
        Self::validate_dimensions(options)?;

        let mut hits = Vec::new();
        let mut miss_keys = Vec::new();
        let mut miss_files = Vec::new();

        for file in files {
            let key = derive_cache_key(folder, options.width, options.height, &file.url);
            let cached = if options.purge_cache {
                None
            } else {
                self.cache.get(&key)
            };
            match cached {
                Some(entry) => hits.push(ProcessedResult::cached(file.clone(), entry)),
                None => {
                    miss_keys.push(key);
                    miss_files.push(file.clone());
                }
            }
        }

        tracing::info!(
            folder = %folder,
            total = files.len(),
            cache_hits = hits.len(),
            cache_misses = miss_files.len(),
            purge = options.purge_cache,
            "Resizing folder"
        );

        let processed = self
            .scheduler
            .process_batch(
                &self.processor,
                &miss_files,
                options.width,
                options.height,
                self.background(options),
            )
            .await;

        // The scheduler preserves input order, so keys line up with results.
        for (key, result) in miss_keys.into_iter().zip(&processed) {
            if let Some(entry) = result.entry() {
                self.cache.insert(key, entry.clone());
            }
        }

        hits.extend(processed);
        Ok(hits)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop every cached entry; returns the number removed.
    pub fn clear_cache(&self) -> usize {
        let removed = self.cache.clear();
        tracing::info!(removed = removed, "Cleared image cache");
        removed
    }

    /// Drop all cached entries derived for one folder; returns the number
    /// removed.
    pub fn clear_folder_cache(&self, folder: &str) -> usize {
        let prefix = folder_key_prefix(folder);
        let removed = self.cache.remove_where(|key| key.starts_with(&prefix));
        tracing::info!(folder = %folder, removed = removed, "Cleared folder cache");
        removed
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        PerformanceStats::snapshot(&self.config)
    }
}
