//! Core error types for the cover recognition pipeline.
//!
//! `OCRError` covers everything that can go wrong between receiving image bytes
//! and producing an [`OcrResult`](crate::domain::OcrResult): image decoding,
//! ONNX Runtime failures, tensor shape mismatches, missing model artifacts and
//! engines that are deliberately left unbuilt.

use thiserror::Error;

/// Enum representing the stages of the OCR engine an error can originate from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Image decoding and normalization.
    Preprocessing,
    /// Vision encoder graph.
    VisionEncoding,
    /// Token embedding graph.
    TokenEmbedding,
    /// Cross-encoder graph.
    Encoding,
    /// Autoregressive decoder loop.
    Decoding,
    /// Token decoding and region parsing.
    PostProcessing,
    /// Dispatch of blocking work onto a worker thread.
    TaskDispatch,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Preprocessing => write!(f, "preprocessing"),
            ProcessingStage::VisionEncoding => write!(f, "vision encoding"),
            ProcessingStage::TokenEmbedding => write!(f, "token embedding"),
            ProcessingStage::Encoding => write!(f, "encoding"),
            ProcessingStage::Decoding => write!(f, "decoding"),
            ProcessingStage::PostProcessing => write!(f, "post-processing"),
            ProcessingStage::TaskDispatch => write!(f, "task dispatch"),
        }
    }
}

/// Errors produced by OCR engines and the inference stages behind them.
#[derive(Error, Debug)]
pub enum OCRError {
    /// The input bytes are not a decodable image.
    #[error("image decode failed: {0}")]
    ImageLoad(#[source] image::ImageError),

    /// Error occurred during processing.
    #[error("{kind} failed: {context}: {source}")]
    Processing {
        /// The stage of processing where the error occurred.
        kind: ProcessingStage,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Error occurred while running a graph, with the shapes that were fed.
    #[error("model '{model_name}' inference failed: {operation} with input shape {input_shape:?}")]
    ModelInference {
        /// The name of the model where inference failed.
        model_name: String,
        /// The operation that failed (e.g. "forward_pass", "output_extraction").
        operation: String,
        /// Shape of the primary input tensor.
        input_shape: Vec<usize>,
        /// Additional context about the error.
        context: String,
        /// The underlying error that caused this error.
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A tensor did not have the shape the next stage requires.
    #[error(
        "tensor operation '{operation}' failed: expected shape {expected_shape:?}, got {actual_shape:?} in {context}"
    )]
    TensorOperation {
        /// The tensor operation that failed.
        operation: String,
        /// The expected tensor shape (0 marks a free dimension).
        expected_shape: Vec<usize>,
        /// The actual tensor shape.
        actual_shape: Vec<usize>,
        /// Additional context about where the error occurred.
        context: String,
    },

    /// A key/value cache entry the decoder graph needs is absent.
    #[error("missing kv cache entry '{name}'")]
    MissingCacheEntry {
        /// Graph-level name of the missing entry.
        name: String,
    },

    /// Error indicating invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Error indicating a configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// The requested engine exists only as an interface.
    #[error("{feature} not yet implemented")]
    NotImplemented {
        /// Name of the missing feature.
        feature: String,
    },

    /// Error from the ONNX Runtime session.
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// Error from basic tensor operations (fallback for ndarray errors).
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// Error loading a model file, with context and suggestions.
    #[error("model load failed for '{model_path}': {reason}{suggestion}")]
    ModelLoad {
        /// Path to the model that failed to load
        model_path: String,
        /// Short reason string
        reason: String,
        /// Optional suggestion (prefixed with '; ' when present)
        suggestion: String,
        /// Underlying source error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl From<image::ImageError> for OCRError {
    fn from(error: image::ImageError) -> Self {
        Self::ImageLoad(error)
    }
}

impl OCRError {
    /// Wraps a graph execution failure, recording the primary input shape.
    pub fn model_inference(
        model_name: &str,
        operation: &str,
        input_shape: &[usize],
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ModelInference {
            model_name: model_name.to_string(),
            operation: operation.to_string(),
            input_shape: input_shape.to_vec(),
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Reports a tensor whose shape does not match what the next stage expects.
    pub fn shape_mismatch(
        operation: impl Into<String>,
        expected_shape: &[usize],
        actual_shape: &[usize],
        context: impl Into<String>,
    ) -> Self {
        Self::TensorOperation {
            operation: operation.into(),
            expected_shape: expected_shape.to_vec(),
            actual_shape: actual_shape.to_vec(),
            context: context.into(),
        }
    }

    /// Wraps an error raised while executing one pipeline stage.
    pub fn processing(
        kind: ProcessingStage,
        context: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            kind,
            context: context.into(),
            source: Box::new(source),
        }
    }

    /// Creates a configuration error with a suggestion for recovery.
    ///
    /// # Example
    ///
    /// ```rust
    /// # use coverscan::core::errors::OCRError;
    /// let err = OCRError::config_error_with_suggestion(
    ///     "model loading",
    ///     "tokenizer not found at 'models/tokenizer.json'",
    ///     "pass --tokenizer or place tokenizer.json in the model directory"
    /// );
    /// assert!(matches!(err, OCRError::ConfigError { .. }));
    /// ```
    pub fn config_error_with_suggestion(
        context: impl Into<String>,
        details: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self::ConfigError {
            message: format!(
                "{}: {}; suggestion: {}",
                context.into(),
                details.into(),
                suggestion.into()
            ),
        }
    }

    /// Creates a model-load error for an artifact that is not on disk.
    pub fn missing_model(path: &std::path::Path) -> Self {
        Self::ModelLoad {
            model_path: path.display().to_string(),
            reason: "file not found".to_string(),
            suggestion: "; download the exported ONNX graphs into the model directory".to_string(),
            source: None,
        }
    }

    /// Marks an engine or feature that is intentionally left unbuilt.
    pub fn not_implemented(feature: impl Into<String>) -> Self {
        Self::NotImplemented {
            feature: feature.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_implemented_message() {
        let err = OCRError::not_implemented("Region OCR engine");
        assert_eq!(err.to_string(), "Region OCR engine not yet implemented");
    }

    #[test]
    fn test_missing_model_mentions_path() {
        let err = OCRError::missing_model(std::path::Path::new("/m/onnx/encoder_model_q4.onnx"));
        let message = err.to_string();
        assert!(message.contains("/m/onnx/encoder_model_q4.onnx"));
        assert!(message.contains("file not found"));
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = OCRError::shape_mismatch("concat", &[1, 0, 768], &[1, 4, 512], "cross encoder input");
        assert_eq!(
            err.to_string(),
            "tensor operation 'concat' failed: expected shape [1, 0, 768], got [1, 4, 512] in cross encoder input"
        );
    }
}
