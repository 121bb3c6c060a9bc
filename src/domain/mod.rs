//! Domain types for cover analysis.

pub mod models;

pub use models::{
    AnalysisStatus, BookMatch, CoverAnalysisResponse, HealthResponse, NlpAnalysis, OcrRegion,
    OcrResult,
};
