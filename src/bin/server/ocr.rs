//! Engine wiring shared between CLI and server modes.

use crate::config::{EngineConfig, NlpEngineKind, OcrEngineKind};
use coverscan::core::config::OrtSessionConfig;
use coverscan::core::traits::{NlpEngine, OcrEngine};
use coverscan::models::{Florence2Config, Florence2OnnxEngine, RegionOcrEngine};
use coverscan::nlp::{EmptyNlpEngine, NerNlpEngine};
use coverscan::pipeline::CoverAnalyzer;
use coverscan::search::OpenLibraryClient;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum SetupError {
    #[error("Failed to download image: {0}")]
    Download(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to load OCR engine: {0}")]
    Engine(#[from] coverscan::core::OCRError),
}

/// Florence-2 settings derived from the command line.
pub fn florence2_config(config: &EngineConfig) -> Result<Florence2Config, SetupError> {
    let ort_session = OrtSessionConfig::new()
        .with_intra_threads(config.onnx_num_threads.max(1))
        .with_inter_threads(1)
        .with_log_severity_level(3)
        .for_device(&config.device)?;

    let mut florence = Florence2Config::new(&config.model_dir)
        .with_quantization(config.quantization.clone())
        .with_max_new_tokens(config.max_new_tokens)
        .with_session_pool_size(config.session_pool_size)
        .with_ort_session(ort_session);
    if let Some(tokenizer) = &config.tokenizer {
        florence = florence.with_tokenizer_path(tokenizer);
    }
    florence
        .validate()
        .map_err(|e| SetupError::Config(e.to_string()))?;
    Ok(florence)
}

fn build_ocr_engine(config: &EngineConfig) -> Result<Arc<dyn OcrEngine>, SetupError> {
    match config.ocr_engine {
        OcrEngineKind::Florence2Onnx => {
            let florence = florence2_config(config)?;
            info!(
                model_dir = %florence.model_dir.display(),
                quantization = %florence.quantization,
                device = %config.device,
                threads = config.onnx_num_threads,
                "Loading Florence-2 OCR engine"
            );
            Ok(Arc::new(Florence2OnnxEngine::new(&florence)?))
        }
        OcrEngineKind::Region => Ok(Arc::new(RegionOcrEngine::new())),
    }
}

fn build_nlp_engine(kind: NlpEngineKind) -> Arc<dyn NlpEngine> {
    match kind {
        NlpEngineKind::Ner => Arc::new(NerNlpEngine::new()),
        NlpEngineKind::None => Arc::new(EmptyNlpEngine),
    }
}

/// Builds the analyzer with the engines selected in `config`.
pub fn build_analyzer(config: &EngineConfig) -> Result<CoverAnalyzer, SetupError> {
    let ocr = build_ocr_engine(config)?;
    let nlp = build_nlp_engine(config.nlp_engine);
    info!(ocr = ocr.name(), nlp = nlp.name(), "Analyzer ready");
    Ok(CoverAnalyzer::new(ocr, nlp, Arc::new(OpenLibraryClient::new())))
}

/// Download bytes from a URL
pub async fn download_bytes(url: &str) -> Result<Vec<u8>, SetupError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| SetupError::Download(format!("Failed to fetch URL: {}", e)))?;

    if !response.status().is_success() {
        return Err(SetupError::Download(format!(
            "HTTP error: {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SetupError::Download(format!("Failed to read response body: {}", e)))?;

    Ok(bytes.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        engine: EngineConfig,
    }

    fn parse(args: &[&str]) -> EngineConfig {
        let mut argv = vec!["coverscan-server"];
        argv.extend_from_slice(args);
        TestCli::parse_from(argv).engine
    }

    #[test]
    fn test_florence2_config_from_flags() {
        let config = parse(&[
            "--model-dir",
            "/models/f2",
            "--quantization",
            "",
            "--onnx-num-threads",
            "2",
            "--max-new-tokens",
            "256",
        ]);
        let florence = florence2_config(&config).unwrap();
        assert_eq!(florence.quantization, "");
        assert_eq!(florence.max_new_tokens, 256);
        assert_eq!(florence.ort_session.intra_threads, Some(2));
        assert_eq!(florence.ort_session.inter_threads, Some(1));
        assert_eq!(
            florence.tokenizer_file(),
            std::path::PathBuf::from("/models/f2/tokenizer.json")
        );
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let config = parse(&["--device", "tpu"]);
        assert!(florence2_config(&config).is_err());
    }

    #[test]
    fn test_missing_model_dir_fails_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let config = parse(&["--model-dir", dir.path().to_str().unwrap()]);
        let err = build_analyzer(&config).unwrap_err();
        assert!(err.to_string().contains("tokenizer"));
    }

    #[test]
    fn test_region_engine_needs_no_models() {
        let config = parse(&["--ocr-engine", "region", "--nlp-engine", "ner"]);
        let analyzer = build_analyzer(&config).unwrap();
        assert_eq!(analyzer.ocr_engine_name(), "region");
    }
}
