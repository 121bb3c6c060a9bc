//! Configuration types for the cover analysis server and CLI.

use clap::{Args, ValueEnum};
use std::path::PathBuf;

/// Which OCR engine backs the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OcrEngineKind {
    /// Florence-2 region OCR on ONNX Runtime
    #[value(name = "florence2-onnx")]
    Florence2Onnx,
    /// Detector plus recognizer (not built yet)
    Region,
}

/// Which title/author detector backs the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NlpEngineKind {
    /// Named-entity detector (not built yet)
    Ner,
    /// No detection; the OCR text becomes the catalog query
    None,
}

/// Engine settings shared by `serve` and `analyze`.
#[derive(Debug, Clone, Args)]
pub struct EngineConfig {
    /// Directory with onnx/ and tokenizer.json
    #[arg(long = "model-dir", env = "COVERSCAN_MODEL_DIR", default_value = "models/florence-2-base-ft")]
    pub model_dir: PathBuf,

    /// Graph file suffix (q4, fp16, ...); empty for unquantized graphs
    #[arg(long, env = "COVERSCAN_QUANTIZATION", default_value = "q4")]
    pub quantization: String,

    /// Tokenizer file (defaults to <model-dir>/tokenizer.json)
    #[arg(long, env = "COVERSCAN_TOKENIZER")]
    pub tokenizer: Option<PathBuf>,

    /// ONNX Runtime intra-op threads per session
    #[arg(long = "onnx-num-threads", env = "ONNX_NUM_THREADS", default_value_t = 4)]
    pub onnx_num_threads: usize,

    /// Device to use (cpu, cuda, cuda:0, etc.)
    #[arg(long, default_value = "cpu", env = "COVERSCAN_DEVICE")]
    pub device: String,

    /// Generation cap per image
    #[arg(long = "max-new-tokens", env = "COVERSCAN_MAX_NEW_TOKENS", default_value_t = 1024)]
    pub max_new_tokens: usize,

    /// Sessions per graph
    #[arg(long = "session-pool-size", env = "COVERSCAN_SESSION_POOL_SIZE", default_value_t = 1)]
    pub session_pool_size: usize,

    #[arg(long = "ocr-engine", value_enum, env = "COVERSCAN_OCR_ENGINE", default_value = "florence2-onnx")]
    pub ocr_engine: OcrEngineKind,

    #[arg(long = "nlp-engine", value_enum, env = "COVERSCAN_NLP_ENGINE", default_value = "none")]
    pub nlp_engine: NlpEngineKind,
}

/// Configuration for the HTTP server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub engine: EngineConfig,
    pub host: String,
    pub port: u16,
}
