//! Batch scheduling
//!
//! Partitions a file list into fixed-size chunks and drives each chunk's
//! items concurrently through the retrying processor. Admission is bounded
//! by a shared semaphore sized to the global concurrency ceiling, and a
//! small pause between chunks keeps the connection pool from saturating.
//! One item's failure never aborts its siblings; the output always has the
//! same length as the input.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use pixserve_core::{ProcessedResult, SourceFile};

use crate::retry::ItemProcessor;

pub struct BatchScheduler {
    batch_size: usize,
    inter_batch_delay: Duration,
    permits: Arc<Semaphore>,
}

impl BatchScheduler {
    pub fn new(batch_size: usize, max_concurrent: usize, inter_batch_delay: Duration) -> Self {
        Self {
            batch_size,
            inter_batch_delay,
            permits: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    /// Process every file; results come back in input order, one per file.
    pub async fn process_batch(
        &self,
        processor: &Arc<ItemProcessor>,
        files: &[SourceFile],
        width: Option<u32>,
        height: Option<u32>,
        background: &str,
    ) -> Vec<ProcessedResult> {
        let mut results = Vec::with_capacity(files.len());
        let chunk_count = files.len().div_ceil(self.batch_size.max(1));

        for (index, chunk) in files.chunks(self.batch_size.max(1)).enumerate() {
            let mut handles = Vec::with_capacity(chunk.len());

            for file in chunk {
                let permit = self
                    .permits
                    .clone()
                    .acquire_owned()
                    .await
                    .expect("admission semaphore closed");
                let processor = Arc::clone(processor);
                let task_file = file.clone();
                let background = background.to_string();

                let handle = tokio::spawn(async move {
                    let result = processor
                        .process_with_retry(&task_file, width, height, &background)
                        .await;
                    drop(permit);
                    result
                });
                handles.push((file.clone(), handle));
            }

            // The chunk completes only when every item has settled.
            for (file, handle) in handles {
                match handle.await {
                    Ok(result) => results.push(result),
                    Err(error) => {
                        tracing::error!(
                            name = %file.name,
                            error = %error,
                            "Item task aborted"
                        );
                        results.push(ProcessedResult::failed(
                            file,
                            format!("task aborted: {error}"),
                        ));
                    }
                }
            }

            if index + 1 < chunk_count && !self.inter_batch_delay.is_zero() {
                tokio::time::sleep(self.inter_batch_delay).await;
            }
        }

        results
    }
}
