//! Vision encoder input preparation.

use crate::processors::NormalizeImage;
use image::RgbImage;
use image::imageops::{self, FilterType};
use ndarray::Array4;

/// Resizes to a square and normalizes with ImageNet statistics.
#[derive(Debug, Clone)]
pub struct Florence2Preprocessor {
    image_size: u32,
    normalize: NormalizeImage,
}

impl Florence2Preprocessor {
    pub fn new(image_size: u32) -> Self {
        Self {
            image_size,
            normalize: NormalizeImage::imagenet(),
        }
    }

    pub fn image_size(&self) -> u32 {
        self.image_size
    }

    /// Produces `pixel_values` of shape `[1, 3, size, size]`.
    ///
    /// The aspect ratio is not preserved; location tokens are relative to
    /// the resized square and map back onto the original width and height.
    pub fn apply(&self, image: &RgbImage) -> Array4<f32> {
        let resized = if image.dimensions() == (self.image_size, self.image_size) {
            image.clone()
        } else {
            imageops::resize(
                image,
                self.image_size,
                self.image_size,
                FilterType::CatmullRom,
            )
        };
        self.normalize.apply_to_tensor(&resized)
    }
}
