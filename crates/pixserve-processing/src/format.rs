//! Format analysis
//!
//! Source-extension validation against the fixed allow-list, header-only
//! transparency detection, and transparency-aware output-format selection.

use std::io::Cursor;

use image::{ImageDecoder, ImageFormat, ImageReader};

use pixserve_core::{AppError, OutputFormat};

/// File extension of a URL's path component, ignoring query and fragment.
pub fn source_extension(url: &str) -> Option<&str> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next()?;
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension)
}

/// Validate a source URL against the allow-list before any download happens.
/// Returns the output-format candidate derived from the extension.
pub fn validate_source(url: &str) -> Result<OutputFormat, AppError> {
    let extension = source_extension(url)
        .ok_or_else(|| AppError::UnsupportedFormat(format!("no file extension in {url}")))?;
    OutputFormat::candidate_for_extension(extension)
        .ok_or_else(|| AppError::UnsupportedFormat(format!("extension {extension} in {url}")))
}

/// Whether the image carries an alpha channel, judged from decoder metadata
/// only; pixel data is not decoded. GIF sources are treated as
/// transparency-bearing (frame disposal makes per-frame alpha common).
///
/// Fail-open: any decode or metadata error reads as opaque, so one corrupt
/// image degrades to a flattened output instead of blocking its batch.
pub fn has_transparency(data: &[u8]) -> bool {
    let reader = match ImageReader::new(Cursor::new(data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(_) => return false,
    };

    if reader.format() == Some(ImageFormat::Gif) {
        return true;
    }

    match reader.into_decoder() {
        Ok(decoder) => decoder.color_type().has_alpha(),
        Err(error) => {
            tracing::debug!(error = %error, "Treating undecodable image as opaque");
            false
        }
    }
}

/// Final output format for a source: the extension's candidate, forced to an
/// alpha-capable format when transparency must survive, and to the default
/// opaque format when an opaque image arrived under a non-alpha-capable
/// extension.
pub fn determine_output_format(url: &str, has_alpha: bool) -> Result<OutputFormat, AppError> {
    let candidate = validate_source(url)?;
    let extension_keeps_alpha = source_extension(url)
        .map(|extension| {
            matches!(extension.to_lowercase().as_str(), "png" | "webp")
        })
        .unwrap_or(false);

    let format = if has_alpha {
        if candidate.supports_alpha() {
            candidate
        } else {
            OutputFormat::Png
        }
    } else if extension_keeps_alpha {
        candidate
    } else {
        OutputFormat::Jpeg
    };
    Ok(format)
}
