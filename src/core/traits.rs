//! Capability seams of the analysis pipeline.
//!
//! Each stage is a single-method async trait. The server picks concrete
//! implementations when it wires up [`CoverAnalyzer`](crate::pipeline::CoverAnalyzer);
//! tests substitute scripted ones.

use async_trait::async_trait;

use crate::core::errors::OCRError;
use crate::domain::{BookMatch, NlpAnalysis, OcrResult};
use crate::nlp::NlpError;
use crate::search::SearchError;

/// Extracts text regions from an encoded image.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Short engine identifier used in logs.
    fn name(&self) -> &str;

    /// Runs OCR over raw image bytes (JPEG, PNG or WebP).
    async fn extract_text(&self, image_data: &[u8]) -> Result<OcrResult, OCRError>;
}

/// Guesses title and author from recognized text.
#[async_trait]
pub trait NlpEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn analyze(&self, ocr: &OcrResult) -> Result<NlpAnalysis, NlpError>;
}

/// Looks up candidate books in an external catalog.
#[async_trait]
pub trait BookSearchClient: Send + Sync {
    fn name(&self) -> &str;

    /// Returns at most `limit` candidates for a free-text query.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<BookMatch>, SearchError>;
}
