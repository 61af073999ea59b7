//! Domain models
//!
//! Core types shared across the cache and processing crates: source files as
//! supplied by the external directory service, cached artifacts, and the
//! tagged per-item processing outcome.

use std::time::Instant;

use serde::{Deserialize, Serialize};

/// One remote image to be processed, as listed by the directory collaborator.
/// Immutable input; `name` is unique within its folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub name: String,
    pub url: String,
}

/// Final pixel dimensions after resize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Fixed output format set. Png and Webp carry alpha, Jpeg does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn supports_alpha(self) -> bool {
        match self {
            OutputFormat::Jpeg => false,
            OutputFormat::Png | OutputFormat::Webp => true,
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// Output candidate for a source file extension. Extensions outside the
    /// allow-list have no candidate; gif sources are re-encoded (animation is
    /// not preserved) and map to the alpha-capable default.
    pub fn candidate_for_extension(extension: &str) -> Option<Self> {
        match extension.to_lowercase().as_str() {
            "jpg" | "jpeg" => Some(OutputFormat::Jpeg),
            "png" => Some(OutputFormat::Png),
            "webp" => Some(OutputFormat::Webp),
            "gif" => Some(OutputFormat::Png),
            _ => None,
        }
    }
}

/// Cached artifact for one `(folder, dimensions, source)` resize request.
///
/// Entries are written whole or not at all; readers never observe a partial
/// entry. `created_at` is monotonic and only used for TTL math.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// `data:<mime>;base64,<payload>`, self-describing encoded bytes.
    pub data_uri: String,
    pub dimensions: Dimensions,
    pub has_transparency: bool,
    pub format: OutputFormat,
    pub created_at: Instant,
}

impl CacheEntry {
    pub fn new(
        data_uri: String,
        dimensions: Dimensions,
        has_transparency: bool,
        format: OutputFormat,
    ) -> Self {
        Self {
            data_uri,
            dimensions,
            has_transparency,
            format,
            created_at: Instant::now(),
        }
    }
}

/// Tagged outcome of processing one item: exactly one of cache hit, fresh
/// resize, or failure holds.
#[derive(Debug, Clone)]
pub enum ResizeOutcome {
    Cached(CacheEntry),
    Fresh(CacheEntry),
    Failed(String),
}

/// Transient per-request record pairing a source file with its outcome.
#[derive(Debug, Clone)]
pub struct ProcessedResult {
    pub file: SourceFile,
    pub outcome: ResizeOutcome,
}

impl ProcessedResult {
    pub fn cached(file: SourceFile, entry: CacheEntry) -> Self {
        Self {
            file,
            outcome: ResizeOutcome::Cached(entry),
        }
    }

    pub fn fresh(file: SourceFile, entry: CacheEntry) -> Self {
        Self {
            file,
            outcome: ResizeOutcome::Fresh(entry),
        }
    }

    pub fn failed(file: SourceFile, error: impl Into<String>) -> Self {
        Self {
            file,
            outcome: ResizeOutcome::Failed(error.into()),
        }
    }

    pub fn is_resized(&self) -> bool {
        matches!(
            self.outcome,
            ResizeOutcome::Cached(_) | ResizeOutcome::Fresh(_)
        )
    }

    pub fn is_cached(&self) -> bool {
        matches!(self.outcome, ResizeOutcome::Cached(_))
    }

    pub fn entry(&self) -> Option<&CacheEntry> {
        match &self.outcome {
            ResizeOutcome::Cached(entry) | ResizeOutcome::Fresh(entry) => Some(entry),
            ResizeOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.outcome {
            ResizeOutcome::Failed(message) => Some(message),
            _ => None,
        }
    }

    /// Convert to the boundary wire shape.
    pub fn to_record(&self) -> ResultRecord {
        let entry = self.entry();
        ResultRecord {
            name: self.file.name.clone(),
            url: self.file.url.clone(),
            is_resized: self.is_resized(),
            is_cached: self.is_cached(),
            payload: entry.map(|e| e.data_uri.clone()),
            dimensions: entry.map(|e| e.dimensions),
            has_transparency: entry.map(|e| e.has_transparency),
            format: entry.map(|e| e.format),
            error: self.error().map(|e| e.to_string()),
        }
    }
}

/// Wire shape for one processed item, built from [`ProcessedResult`] at the
/// request-handling boundary.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRecord {
    pub name: String,
    pub url: String,
    pub is_resized: bool,
    pub is_cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_transparency: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<OutputFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Per-folder partial-success counts. A folder response always carries these
/// alongside the results, so one bad source degrades one entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FolderSummary {
    pub resized: usize,
    pub cached: usize,
    pub failed: usize,
}

impl FolderSummary {
    pub fn from_results(results: &[ProcessedResult]) -> Self {
        let mut summary = FolderSummary::default();
        for result in results {
            match result.outcome {
                ResizeOutcome::Fresh(_) => summary.resized += 1,
                ResizeOutcome::Cached(_) => summary.cached += 1,
                ResizeOutcome::Failed(_) => summary.failed += 1,
            }
        }
        summary
    }
}
