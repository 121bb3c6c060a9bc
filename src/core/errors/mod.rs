//! Error types shared by the OCR engines and inference stages.

mod types;

pub use types::{OCRError, ProcessingStage};
