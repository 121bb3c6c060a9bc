//! Data types exchanged between the engines, the analyzer and the HTTP layer.
//!
//! Every type serializes with camelCase keys; optional fields are omitted when
//! absent.

use crate::processors::Point;
use serde::{Deserialize, Serialize};

/// A single text region recognized on a cover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrRegion {
    /// Recognized text of the region.
    pub text: String,
    /// Confidence in `[0, 1]`; engines without a native signal report 1.0.
    pub confidence: f32,
    /// Four pixel-space corners in the engine's winding order, as `[x, y]` pairs.
    pub coordinates: [[f32; 2]; 4],
}

impl OcrRegion {
    /// Builds a region from a quadrilateral.
    pub fn from_quad(text: impl Into<String>, confidence: f32, quad: [Point; 4]) -> Self {
        Self {
            text: text.into(),
            confidence,
            coordinates: quad.map(|p| [p.x, p.y]),
        }
    }
}

/// Output of an OCR engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    /// Region texts joined by single spaces, in region order.
    pub text: String,
    /// Regions in engine order.
    pub regions: Vec<OcrRegion>,
}

impl OcrResult {
    /// Builds a result whose text is derived from `regions`.
    pub fn from_regions(regions: Vec<OcrRegion>) -> Self {
        let text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self { text, regions }
    }

    /// Returns true when nothing was recognized.
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty() && self.text.is_empty()
    }
}

/// Title/author guess produced by an NLP engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NlpAnalysis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_title: Option<String>,
    #[serde(default)]
    pub title_confidence: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detected_author: Option<String>,
    #[serde(default)]
    pub author_confidence: f32,
}

impl NlpAnalysis {
    /// Builds the catalog query from the detected title and author.
    ///
    /// Returns `None` when neither was detected.
    pub fn search_query(&self) -> Option<String> {
        let parts: Vec<&str> = [self.detected_title.as_deref(), self.detected_author.as_deref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();

        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

/// A candidate book returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookMatch {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
}

impl BookMatch {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: None,
            thumbnail_url: None,
        }
    }
}

/// Success flag plus diagnostics for one analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisStatus {
    pub is_success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_text: Option<String>,
}

/// Response of `POST /analyze`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverAnalysisResponse {
    pub analysis: AnalysisStatus,
    #[serde(default)]
    pub matched_books: Vec<BookMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exact_match: Option<BookMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nlp_analysis: Option<NlpAnalysis>,
}

impl CoverAnalysisResponse {
    /// A failed analysis carrying only the error message.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            analysis: AnalysisStatus {
                is_success: false,
                error_message: Some(message.into()),
                extracted_text: None,
            },
            matched_books: Vec::new(),
            exact_match: None,
            nlp_analysis: None,
        }
    }
}

/// Response of `GET /health`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ocr_result_joins_region_text() {
        let quad = [
            Point::new(0.0, 0.0),
            Point::new(50.0, 0.0),
            Point::new(50.0, 10.0),
            Point::new(0.0, 10.0),
        ];
        let result = OcrResult::from_regions(vec![
            OcrRegion::from_quad("The Great Gatsby", 1.0, quad),
            OcrRegion::from_quad("F Scott Fitzgerald", 1.0, quad),
        ]);
        assert_eq!(result.text, "The Great Gatsby F Scott Fitzgerald");
        assert_eq!(result.regions[1].coordinates[2], [50.0, 10.0]);
    }

    #[test]
    fn test_empty_regions_give_empty_text() {
        let result = OcrResult::from_regions(Vec::new());
        assert_eq!(result.text, "");
        assert!(result.is_empty());
    }

    #[test]
    fn test_search_query_prefers_title_and_author() {
        let analysis = NlpAnalysis {
            detected_title: Some("The Great Gatsby".to_string()),
            title_confidence: 0.9,
            detected_author: Some("F Scott Fitzgerald".to_string()),
            author_confidence: 0.8,
        };
        assert_eq!(
            analysis.search_query().as_deref(),
            Some("The Great Gatsby F Scott Fitzgerald")
        );

        let author_only = NlpAnalysis {
            detected_author: Some("Harper Lee".to_string()),
            ..Default::default()
        };
        assert_eq!(author_only.search_query().as_deref(), Some("Harper Lee"));

        assert_eq!(NlpAnalysis::default().search_query(), None);
    }

    #[test]
    fn test_response_serializes_camel_case() {
        let mut book = BookMatch::new("Mistborn", "Brandon Sanderson");
        book.thumbnail_url = Some("https://covers.example/1.jpg".to_string());
        let response = CoverAnalysisResponse {
            analysis: AnalysisStatus {
                is_success: true,
                error_message: None,
                extracted_text: Some("MISTBORN Brandon Sanderson".to_string()),
            },
            matched_books: vec![book],
            exact_match: None,
            nlp_analysis: Some(NlpAnalysis {
                detected_title: Some("Mistborn".to_string()),
                title_confidence: 0.5,
                ..Default::default()
            }),
        };

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["analysis"]["isSuccess"], true);
        assert_eq!(json["analysis"]["extractedText"], "MISTBORN Brandon Sanderson");
        assert!(json["analysis"].get("errorMessage").is_none());
        assert_eq!(
            json["matchedBooks"][0]["thumbnailUrl"],
            "https://covers.example/1.jpg"
        );
        assert!(json.get("exactMatch").is_none());
        assert_eq!(json["nlpAnalysis"]["detectedTitle"], "Mistborn");
        assert_eq!(json["nlpAnalysis"]["authorConfidence"], 0.0);
    }

    #[test]
    fn test_failure_response() {
        let response = CoverAnalysisResponse::failure("OCR failed: boom");
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["analysis"]["isSuccess"], false);
        assert_eq!(json["analysis"]["errorMessage"], "OCR failed: boom");
        assert_eq!(json["matchedBooks"], serde_json::json!([]));
    }
}
