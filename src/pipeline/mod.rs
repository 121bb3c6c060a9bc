//! Request-level orchestration.

pub mod analyzer;

pub use analyzer::CoverAnalyzer;
