//! Florence-2 region OCR over the four-graph ONNX export.

pub mod config;
pub mod decoder;
pub mod engine;
pub mod graphs;
pub mod kv_cache;
pub mod preprocess;

#[cfg(test)]
mod test_support;

pub use config::{Florence2Config, ModelArtifacts};
pub use decoder::{GreedyDecoder, argmax_last};
pub use engine::Florence2OnnxEngine;
pub use graphs::{DecoderOutput, DecoderStep, Florence2Graphs, OrtFlorence2Graphs};
pub use kv_cache::{KvCache, KvField, KvKey, KvLayout, KvSide, PinnedEncoderKv};
pub use preprocess::Florence2Preprocessor;
