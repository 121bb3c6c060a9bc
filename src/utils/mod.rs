//! Utility functions shared by the library and the server binary.

use crate::core::OCRError;
use image::RgbImage;
use tracing_subscriber::EnvFilter;

/// Installs the global `tracing` subscriber.
///
/// The filter is read from `RUST_LOG` and defaults to `info`. Calling this
/// more than once is harmless; later calls leave the first subscriber in place.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Decodes JPEG, PNG or WebP bytes into a 3-channel RGB image.
///
/// Alpha is dropped; grayscale and palette images are expanded.
pub fn load_image_from_bytes(bytes: &[u8]) -> Result<RgbImage, OCRError> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.to_rgb8())
}
