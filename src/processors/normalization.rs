//! Image normalization for vision encoders.
//!
//! [`NormalizeImage`] folds rescaling and per-channel standardization into a
//! single multiply-add per channel and writes the result in CHW layout with a
//! leading batch axis of one.

use image::RgbImage;
use ndarray::Array4;

/// Default ImageNet channel means in RGB order.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Default ImageNet channel standard deviations in RGB order.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Normalizes RGB images into model input tensors.
#[derive(Debug, Clone)]
pub struct NormalizeImage {
    /// Scaling factors for each channel (alpha = scale / std)
    pub alpha: [f32; 3],
    /// Offset values for each channel (beta = -mean / std)
    pub beta: [f32; 3],
}

impl NormalizeImage {
    /// Folds `scale`, `mean` and `std` into one multiply-add per channel.
    fn from_stats(scale: f32, mean: [f32; 3], std: [f32; 3]) -> Self {
        Self {
            alpha: std.map(|s| scale / s),
            beta: [-mean[0] / std[0], -mean[1] / std[1], -mean[2] / std[2]],
        }
    }

    /// ImageNet statistics with 1/255 rescaling.
    pub fn imagenet() -> Self {
        Self::from_stats(1.0 / 255.0, IMAGENET_MEAN, IMAGENET_STD)
    }

    /// Normalizes one image into a `[1, 3, H, W]` tensor.
    pub fn apply_to_tensor(&self, img: &RgbImage) -> Array4<f32> {
        let (width, height) = img.dimensions();
        let (w, h) = (width as usize, height as usize);
        let mut tensor = Array4::<f32>::zeros((1, 3, h, w));

        for (x, y, pixel) in img.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                tensor[[0, c, y, x]] = pixel[c] as f32 * self.alpha[c] + self.beta[c];
            }
        }

        tensor
    }
}
