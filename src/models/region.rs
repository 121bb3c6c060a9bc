//! Detector-plus-recognizer OCR engine.
//!
//! Selectable from configuration but not built yet; every call reports
//! [`OCRError::NotImplemented`].

use crate::core::OCRError;
use crate::core::traits::OcrEngine;
use crate::domain::OcrResult;
use async_trait::async_trait;

#[derive(Debug, Default, Clone, Copy)]
pub struct RegionOcrEngine;

impl RegionOcrEngine {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl OcrEngine for RegionOcrEngine {
    fn name(&self) -> &str {
        "region"
    }

    async fn extract_text(&self, _image_data: &[u8]) -> Result<OcrResult, OCRError> {
        Err(OCRError::not_implemented("Region OCR engine"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_extract_text_is_not_implemented() {
        let err = RegionOcrEngine::new().extract_text(b"\x89PNG").await.unwrap_err();
        assert_eq!(err.to_string(), "Region OCR engine not yet implemented");
    }
}
