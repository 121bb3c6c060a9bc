//! Title and author extraction engines.

use crate::core::traits::NlpEngine;
use crate::domain::{NlpAnalysis, OcrResult};
use async_trait::async_trait;
use thiserror::Error;

/// Errors raised by NLP engines.
#[derive(Error, Debug)]
pub enum NlpError {
    /// The engine exists only as an interface.
    #[error("{feature} not yet implemented")]
    NotImplemented { feature: String },

    /// The engine ran and failed.
    #[error("{message}")]
    Analysis { message: String },
}

/// Named-entity based title/author extraction. Not built yet.
#[derive(Debug, Default, Clone, Copy)]
pub struct NerNlpEngine;

impl NerNlpEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NlpEngine for NerNlpEngine {
    fn name(&self) -> &str {
        "ner"
    }

    async fn analyze(&self, _ocr: &OcrResult) -> Result<NlpAnalysis, NlpError> {
        Err(NlpError::NotImplemented {
            feature: "NER NLP engine".to_string(),
        })
    }
}

/// Engine that never detects anything.
///
/// Lets the pipeline run end to end with the raw OCR text as the catalog query.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyNlpEngine;

#[async_trait]
impl NlpEngine for EmptyNlpEngine {
    fn name(&self) -> &str {
        "none"
    }

    async fn analyze(&self, ocr: &OcrResult) -> Result<NlpAnalysis, NlpError> {
        tracing::debug!(chars = ocr.text.len(), "skipping title/author detection");
        Ok(NlpAnalysis::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ner_engine_is_not_implemented() {
        let err = NerNlpEngine::new()
            .analyze(&OcrResult::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "NER NLP engine not yet implemented");
    }

    #[tokio::test]
    async fn test_empty_engine_detects_nothing() {
        let ocr = OcrResult {
            text: "THE HOBBIT".to_string(),
            regions: Vec::new(),
        };
        let analysis = EmptyNlpEngine.analyze(&ocr).await.unwrap();
        assert_eq!(analysis, NlpAnalysis::default());
        assert_eq!(analysis.search_query(), None);
    }
}
