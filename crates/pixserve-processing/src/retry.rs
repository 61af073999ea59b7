//! Per-item processing with bounded retries
//!
//! `ItemProcessor` runs the full download, analyze, transcode pipeline for
//! one source file. `process_with_retry` never returns an error: failure is
//! encoded in the returned result after up to `max_retries + 1` attempts
//! with exponential backoff between them. Terminal failures are reported to
//! the log sink here, outside the control flow that callers observe.

use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use tokio::sync::Semaphore;

use pixserve_core::{CacheEntry, ProcessedResult, SourceFile};

use crate::download::ImageFetcher;
use crate::format;
use crate::transcode::Transcoder;

struct AttemptError {
    message: String,
    retryable: bool,
}

impl AttemptError {
    fn fatal(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
            retryable: false,
        }
    }

    fn transient(message: impl ToString) -> Self {
        Self {
            message: message.to_string(),
            retryable: true,
        }
    }
}

/// Backoff before the attempt after attempt `k` (0-indexed): `2^k` seconds,
/// saturating so absurdly large retry counts cannot overflow.
fn backoff_delay(attempt: u64) -> Duration {
    let exponent = u32::try_from(attempt).unwrap_or(u32::MAX);
    Duration::from_secs(2u64.saturating_pow(exponent))
}

pub struct ItemProcessor {
    fetcher: Arc<dyn ImageFetcher>,
    // Caps simultaneous CPU-bound encodes independently of I/O concurrency.
    encode_permits: Arc<Semaphore>,
    max_retries: u32,
}

impl ItemProcessor {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        max_concurrent_encodes: usize,
        max_retries: u32,
    ) -> Self {
        Self {
            fetcher,
            encode_permits: Arc::new(Semaphore::new(max_concurrent_encodes)),
            max_retries,
        }
    }

    /// One attempt of the full pipeline. The allow-list check runs before
    /// any download; disallowed sources fail without retrying.
    async fn process_once(
        &self,
        file: &SourceFile,
        width: Option<u32>,
        height: Option<u32>,
        background: &str,
    ) -> Result<CacheEntry, AttemptError> {
        format::validate_source(&file.url).map_err(AttemptError::fatal)?;

        let data = self
            .fetcher
            .fetch(&file.url)
            .await
            .map_err(AttemptError::transient)?;

        let has_alpha = format::has_transparency(&data);
        let output_format =
            format::determine_output_format(&file.url, has_alpha).map_err(AttemptError::fatal)?;

        let permit = self
            .encode_permits
            .acquire()
            .await
            .expect("encode semaphore closed");
        let background = background.to_string();
        let output = tokio::task::spawn_blocking(move || {
            Transcoder::transcode(&data, width, height, output_format, &background)
        })
        .await
        .map_err(|error| AttemptError::transient(format!("encode task failed: {error}")))?
        .map_err(AttemptError::transient)?;
        drop(permit);

        let payload = base64::engine::general_purpose::STANDARD.encode(&output.data);
        let data_uri = format!("data:{};base64,{}", output.format.mime_type(), payload);

        Ok(CacheEntry::new(
            data_uri,
            output.dimensions,
            has_alpha && output.format.supports_alpha(),
            output.format,
        ))
    }

    /// Run the pipeline with retries; always settles to a result. Attempt
    /// `k` (0-indexed) waits `2^k` seconds before the next attempt; the last
    /// failed attempt returns immediately.
    pub async fn process_with_retry(
        &self,
        file: &SourceFile,
        width: Option<u32>,
        height: Option<u32>,
        background: &str,
    ) -> ProcessedResult {
        let max_attempts = u64::from(self.max_retries) + 1;

        for attempt in 0..max_attempts {
            match self.process_once(file, width, height, background).await {
                Ok(entry) => {
                    if attempt > 0 {
                        tracing::debug!(
                            name = %file.name,
                            attempt = attempt + 1,
                            "Item succeeded after retry"
                        );
                    }
                    return ProcessedResult::fresh(file.clone(), entry);
                }
                Err(error) => {
                    let exhausted = attempt + 1 == max_attempts;
                    if exhausted || !error.retryable {
                        tracing::warn!(
                            name = %file.name,
                            url = %file.url,
                            attempts = attempt + 1,
                            error = %error.message,
                            "Item processing failed"
                        );
                        return ProcessedResult::failed(file.clone(), error.message);
                    }
                    let backoff = backoff_delay(attempt);
                    tracing::debug!(
                        name = %file.name,
                        attempt = attempt + 1,
                        backoff_secs = backoff.as_secs(),
                        error = %error.message,
                        "Item attempt failed, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }

        unreachable!("retry loop always settles to a result")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{png_payload, StubFetcher};

    fn file(url: &str) -> SourceFile {
        SourceFile {
            name: "a.png".to_string(),
            url: url.to_string(),
        }
    }

    fn processor(fetcher: StubFetcher, max_retries: u32) -> (ItemProcessor, Arc<StubFetcher>) {
        let fetcher = Arc::new(fetcher);
        (
            ItemProcessor::new(fetcher.clone(), 4, max_retries),
            fetcher,
        )
    }

    #[test]
    fn test_backoff_delay_doubles_and_saturates() {
        assert_eq!(backoff_delay(0), Duration::from_secs(1));
        assert_eq!(backoff_delay(1), Duration::from_secs(2));
        assert_eq!(backoff_delay(2), Duration::from_secs(4));
        // Retry counts past the width of u64 must not overflow.
        assert_eq!(backoff_delay(64), Duration::from_secs(u64::MAX));
        assert_eq!(backoff_delay(u64::MAX), Duration::from_secs(u64::MAX));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let (processor, fetcher) =
            processor(StubFetcher::ok(png_payload(20, 10, [0, 0, 0, 255])), 2);

        let result = processor
            .process_with_retry(&file("https://x/a.png"), Some(10), None, "ffffff")
            .await;

        assert!(result.is_resized());
        assert!(!result.is_cached());
        assert_eq!(fetcher.calls(), 1);
        let entry = result.entry().unwrap();
        assert_eq!(entry.dimensions.width, 10);
        assert_eq!(entry.dimensions.height, 5);
        assert!(entry.data_uri.starts_with("data:image/"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let (processor, fetcher) = processor(
            StubFetcher::failing_first(2, png_payload(8, 8, [0, 0, 0, 255])),
            2,
        );

        let started = tokio::time::Instant::now();
        let result = processor
            .process_with_retry(&file("https://x/a.png"), Some(4), None, "ffffff")
            .await;

        assert!(result.is_resized());
        assert_eq!(fetcher.calls(), 3);
        // Backoff of 1 s then 2 s before the third attempt.
        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_is_data_not_error() {
        let url = "https://x/a.png";
        let (processor, fetcher) = processor(
            StubFetcher::with_poison_urls(png_payload(8, 8, [0, 0, 0, 255]), vec![url.into()]),
            2,
        );

        let result = processor
            .process_with_retry(&file(url), Some(4), None, "ffffff")
            .await;

        assert!(!result.is_resized());
        assert!(result.error().unwrap().contains("poisoned url"));
        // max_retries + 1 attempts.
        assert_eq!(fetcher.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsupported_extension_short_circuits_download() {
        let (processor, fetcher) =
            processor(StubFetcher::ok(png_payload(8, 8, [0, 0, 0, 255])), 2);

        let result = processor
            .process_with_retry(&file("https://x/a.bmp"), Some(4), None, "ffffff")
            .await;

        assert!(!result.is_resized());
        assert!(result.error().unwrap().contains("Unsupported format"));
        assert_eq!(fetcher.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transparent_source_keeps_alpha_capable_format() {
        let (processor, _) =
            processor(StubFetcher::ok(png_payload(8, 8, [255, 0, 0, 120])), 0);

        let result = processor
            .process_with_retry(&file("https://x/a.png"), Some(8), None, "ffffff")
            .await;

        let entry = result.entry().unwrap();
        assert!(entry.has_transparency);
        assert!(entry.format.supports_alpha());
    }
}
