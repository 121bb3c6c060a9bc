//! OCR engines.

pub mod florence2;
pub mod region;

pub use florence2::{Florence2Config, Florence2OnnxEngine};
pub use region::RegionOcrEngine;
