//! Shared test fixtures: in-memory image payloads and stub fetchers.

use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::download::{DownloadError, ImageFetcher};

pub fn png_payload(width: u32, height: u32, pixel: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba(pixel));
    let mut buffer = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

/// Fetcher stub with a call counter. Fails the first `fail_first` calls with
/// a 500, always fails for URLs listed in `poison_urls`, and otherwise
/// returns `payload`.
pub struct StubFetcher {
    payload: Bytes,
    fail_first: usize,
    poison_urls: Vec<String>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn ok(payload: Bytes) -> Self {
        Self {
            payload,
            fail_first: 0,
            poison_urls: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_first(fail_first: usize, payload: Bytes) -> Self {
        Self {
            fail_first,
            ..Self::ok(payload)
        }
    }

    pub fn with_poison_urls(payload: Bytes, poison_urls: Vec<String>) -> Self {
        Self {
            poison_urls,
            ..Self::ok(payload)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, DownloadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.poison_urls.iter().any(|poison| poison == url) {
            return Err(DownloadError::Network("stub: poisoned url".to_string()));
        }
        if call < self.fail_first {
            return Err(DownloadError::Status(500));
        }
        Ok(self.payload.clone())
    }
}
