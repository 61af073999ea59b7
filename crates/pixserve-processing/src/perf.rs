//! Performance snapshot
//!
//! Point-in-time view of the service's concurrency knobs and the host's
//! CPU/memory state, for the administrative stats surface.

use serde::Serialize;
use sysinfo::System;

use pixserve_core::Config;

#[derive(Debug, Clone, Serialize)]
pub struct PerformanceStats {
    pub max_concurrent: usize,
    pub batch_size: usize,
    pub max_concurrent_encodes: usize,
    pub cpu_count: usize,
    pub cpu_usage_percent: f32,
    pub total_memory_bytes: u64,
    pub used_memory_bytes: u64,
}

impl PerformanceStats {
    pub fn snapshot(config: &Config) -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();

        Self {
            max_concurrent: config.max_concurrent,
            batch_size: config.batch_size,
            max_concurrent_encodes: config.max_concurrent_encodes,
            cpu_count: system.cpus().len(),
            cpu_usage_percent: system.global_cpu_info().cpu_usage(),
            total_memory_bytes: system.total_memory(),
            used_memory_bytes: system.used_memory(),
        }
    }
}
