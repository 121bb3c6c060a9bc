//! Configuration types for the inference runtime.

pub mod onnx;

pub use onnx::*;
