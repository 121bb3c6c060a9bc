//! Image preprocessing and generation post-processing.

pub mod florence2_postprocess;
pub mod geometry;
pub mod normalization;

pub use florence2_postprocess::{
    OcrWithRegionParser, ParsedRegions, TaskPostProcessor, build_ocr_result,
};
pub use geometry::{Point, quad_extent};
pub use normalization::NormalizeImage;
