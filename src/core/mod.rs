//! The core module of the cover recognition crate.
//!
//! This module contains the fundamental building blocks shared by every engine:
//! - Error handling
//! - ONNX Runtime configuration
//! - Inference engine integration
//! - Capability traits for OCR, NLP and catalog search

pub mod config;
pub mod errors;
pub mod inference;
pub mod traits;

pub use config::{OrtExecutionProvider, OrtGraphOptimizationLevel, OrtSessionConfig};
pub use errors::{OCRError, ProcessingStage};
pub use inference::{OrtInfer, OrtOutputs, load_session};
pub use traits::{BookSearchClient, NlpEngine, OcrEngine};
