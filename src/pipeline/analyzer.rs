//! Cover analysis pipeline: OCR, title/author detection, catalog search.

use crate::core::traits::{BookSearchClient, NlpEngine, OcrEngine};
use crate::domain::{AnalysisStatus, CoverAnalysisResponse};
use crate::search::{DEFAULT_SEARCH_LIMIT, build_word_set, score_results};
use std::sync::Arc;
use std::time::Instant;

/// Runs the three stages and turns any stage failure into an unsuccessful
/// response instead of an error.
#[derive(Clone)]
pub struct CoverAnalyzer {
    ocr: Arc<dyn OcrEngine>,
    nlp: Arc<dyn NlpEngine>,
    search: Arc<dyn BookSearchClient>,
    search_limit: usize,
}

impl std::fmt::Debug for CoverAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverAnalyzer")
            .field("ocr", &self.ocr.name())
            .field("nlp", &self.nlp.name())
            .field("search", &self.search.name())
            .field("search_limit", &self.search_limit)
            .finish()
    }
}

impl CoverAnalyzer {
    pub fn new(
        ocr: Arc<dyn OcrEngine>,
        nlp: Arc<dyn NlpEngine>,
        search: Arc<dyn BookSearchClient>,
    ) -> Self {
        Self {
            ocr,
            nlp,
            search,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }

    pub fn with_search_limit(mut self, limit: usize) -> Self {
        self.search_limit = limit;
        self
    }

    /// Name of the configured OCR engine.
    pub fn ocr_engine_name(&self) -> &str {
        self.ocr.name()
    }

    /// Analyzes one encoded cover image.
    pub async fn analyze(&self, image_data: &[u8]) -> CoverAnalysisResponse {
        let started = Instant::now();

        let ocr_result = match self.ocr.extract_text(image_data).await {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!(engine = self.ocr.name(), error = %e, "OCR stage failed");
                return CoverAnalysisResponse::failure(format!("OCR failed: {e}"));
            }
        };
        tracing::debug!(
            regions = ocr_result.regions.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "OCR stage done"
        );

        let nlp_analysis = match self.nlp.analyze(&ocr_result).await {
            Ok(analysis) => analysis,
            Err(e) => {
                tracing::warn!(engine = self.nlp.name(), error = %e, "NLP stage failed");
                return CoverAnalysisResponse::failure(format!("NLP analysis failed: {e}"));
            }
        };

        let query = nlp_analysis
            .search_query()
            .unwrap_or_else(|| ocr_result.text.clone());

        let candidates = match self.search.search(&query, self.search_limit).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(client = self.search.name(), error = %e, "catalog search failed");
                return CoverAnalysisResponse::failure(format!("Book search failed: {e}"));
            }
        };

        let ocr_words = build_word_set(&ocr_result.text);
        let scored = score_results(&candidates, &ocr_words);
        let exact_match = scored
            .first()
            .filter(|(_, score)| *score >= 1.0)
            .map(|(book, _)| book.clone());
        let matched_books: Vec<_> = scored.into_iter().map(|(book, _)| book).collect();

        tracing::info!(
            candidates = candidates.len(),
            matched = matched_books.len(),
            exact = exact_match.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "cover analyzed"
        );

        CoverAnalysisResponse {
            analysis: AnalysisStatus {
                is_success: true,
                error_message: None,
                extracted_text: Some(ocr_result.text),
            },
            matched_books,
            exact_match,
            nlp_analysis: Some(nlp_analysis),
        }
    }
}
