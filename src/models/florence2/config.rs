//! Configuration and artifact layout for the Florence-2 ONNX export.

use crate::core::OCRError;
use crate::core::config::OrtSessionConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Decoder layers in Florence-2 base.
pub const DEFAULT_NUM_LAYERS: usize = 6;
/// Attention heads per decoder layer.
pub const DEFAULT_NUM_HEADS: usize = 12;
/// Width of one attention head.
pub const DEFAULT_HEAD_DIM: usize = 64;
/// Generation cap, excluding the seed token.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 1024;
/// Side length the vision encoder expects.
pub const DEFAULT_IMAGE_SIZE: u32 = 768;
/// Fallback end-of-sequence id when the tokenizer does not define `</s>`.
pub const DEFAULT_EOS_TOKEN_ID: i64 = 2;

/// Settings for [`Florence2OnnxEngine`](super::Florence2OnnxEngine).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Florence2Config {
    /// Directory holding `onnx/` and `tokenizer.json`.
    pub model_dir: PathBuf,
    /// Graph file suffix such as `q4`; empty selects the unquantized graphs.
    pub quantization: String,
    /// Tokenizer override; defaults to `<model_dir>/tokenizer.json`.
    pub tokenizer_path: Option<PathBuf>,
    pub max_new_tokens: usize,
    pub num_layers: usize,
    pub num_heads: usize,
    pub head_dim: usize,
    pub image_size: u32,
    /// ONNX Runtime options shared by all four sessions.
    pub ort_session: OrtSessionConfig,
    /// Sessions per graph.
    pub session_pool_size: usize,
}

impl Florence2Config {
    /// Creates a configuration with Florence-2 base defaults.
    ///
    /// Sessions run with one inter-op thread, four intra-op threads and
    /// error-level runtime logging.
    pub fn new(model_dir: impl Into<PathBuf>) -> Self {
        Self {
            model_dir: model_dir.into(),
            quantization: "q4".to_string(),
            tokenizer_path: None,
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            num_layers: DEFAULT_NUM_LAYERS,
            num_heads: DEFAULT_NUM_HEADS,
            head_dim: DEFAULT_HEAD_DIM,
            image_size: DEFAULT_IMAGE_SIZE,
            ort_session: OrtSessionConfig::new()
                .with_intra_threads(4)
                .with_inter_threads(1)
                .with_log_severity_level(3),
            session_pool_size: 1,
        }
    }

    pub fn with_quantization(mut self, quantization: impl Into<String>) -> Self {
        self.quantization = quantization.into();
        self
    }

    pub fn with_tokenizer_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tokenizer_path = Some(path.into());
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: usize) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }

    pub fn with_ort_session(mut self, config: OrtSessionConfig) -> Self {
        self.ort_session = config;
        self
    }

    pub fn with_session_pool_size(mut self, size: usize) -> Self {
        self.session_pool_size = size;
        self
    }

    /// Resolved tokenizer location.
    pub fn tokenizer_file(&self) -> PathBuf {
        self.tokenizer_path
            .clone()
            .unwrap_or_else(|| self.model_dir.join("tokenizer.json"))
    }

    /// Checks the decoder geometry.
    ///
    /// `max_new_tokens` may be zero; generation then yields only the start token.
    pub fn validate(&self) -> Result<(), OCRError> {
        if self.num_layers == 0 || self.num_heads == 0 || self.head_dim == 0 {
            return Err(OCRError::ConfigError {
                message: format!(
                    "decoder geometry must be non-zero (layers={}, heads={}, head_dim={})",
                    self.num_layers, self.num_heads, self.head_dim
                ),
            });
        }
        if self.image_size == 0 {
            return Err(OCRError::ConfigError {
                message: "image_size must be greater than 0".to_string(),
            });
        }
        Ok(())
    }
}

/// Paths of the four exported graphs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub vision_encoder: PathBuf,
    pub embed_tokens: PathBuf,
    pub encoder_model: PathBuf,
    pub decoder_model_merged: PathBuf,
}

impl ModelArtifacts {
    /// Computes graph paths under `<model_dir>/onnx/` without touching the disk.
    pub fn resolve(model_dir: &Path, quantization: &str) -> Self {
        let onnx_dir = model_dir.join("onnx");
        let suffix = if quantization.is_empty() {
            String::new()
        } else {
            format!("_{quantization}")
        };
        let file = |stem: &str| onnx_dir.join(format!("{stem}{suffix}.onnx"));

        Self {
            vision_encoder: file("vision_encoder"),
            embed_tokens: file("embed_tokens"),
            encoder_model: file("encoder_model"),
            decoder_model_merged: file("decoder_model_merged"),
        }
    }

    /// All paths in load order.
    pub fn paths(&self) -> [&Path; 4] {
        [
            &self.vision_encoder,
            &self.embed_tokens,
            &self.encoder_model,
            &self.decoder_model_merged,
        ]
    }

    /// Fails on the first graph that is not on disk.
    pub fn verify(&self) -> Result<(), OCRError> {
        for path in self.paths() {
            if !path.is_file() {
                return Err(OCRError::missing_model(path));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_with_quantization_suffix() {
        let artifacts = ModelArtifacts::resolve(Path::new("/fake/path"), "q4");
        assert_eq!(
            artifacts.vision_encoder,
            PathBuf::from("/fake/path/onnx/vision_encoder_q4.onnx")
        );
        assert_eq!(
            artifacts.decoder_model_merged,
            PathBuf::from("/fake/path/onnx/decoder_model_merged_q4.onnx")
        );
    }

    #[test]
    fn test_resolve_without_quantization() {
        let artifacts = ModelArtifacts::resolve(Path::new("/fake/path"), "");
        assert_eq!(
            artifacts.embed_tokens,
            PathBuf::from("/fake/path/onnx/embed_tokens.onnx")
        );
        assert_eq!(
            artifacts.encoder_model,
            PathBuf::from("/fake/path/onnx/encoder_model.onnx")
        );
    }

    #[test]
    fn test_verify_reports_missing_graph() {
        let dir = tempfile::tempdir().unwrap();
        let onnx_dir = dir.path().join("onnx");
        std::fs::create_dir_all(&onnx_dir).unwrap();
        for stem in ["vision_encoder", "embed_tokens", "encoder_model"] {
            std::fs::write(onnx_dir.join(format!("{stem}_q4.onnx")), b"").unwrap();
        }

        let artifacts = ModelArtifacts::resolve(dir.path(), "q4");
        let err = artifacts.verify().unwrap_err();
        assert!(err.to_string().contains("decoder_model_merged_q4.onnx"));

        std::fs::write(onnx_dir.join("decoder_model_merged_q4.onnx"), b"").unwrap();
        assert!(artifacts.verify().is_ok());
    }

    #[test]
    fn test_defaults_and_tokenizer_location() {
        let config = Florence2Config::new("/models/florence2");
        assert_eq!(config.quantization, "q4");
        assert_eq!(config.max_new_tokens, 1024);
        assert_eq!(config.ort_session.intra_threads, Some(4));
        assert_eq!(
            config.tokenizer_file(),
            PathBuf::from("/models/florence2/tokenizer.json")
        );
        assert!(config.validate().is_ok());

        let custom = config
            .with_tokenizer_path("/tok/tokenizer.json")
            .with_max_new_tokens(0);
        assert_eq!(custom.tokenizer_file(), PathBuf::from("/tok/tokenizer.json"));
        assert!(custom.validate().is_ok());

        let mut broken = custom.clone();
        broken.num_heads = 0;
        assert!(broken.validate().is_err());
    }
}
