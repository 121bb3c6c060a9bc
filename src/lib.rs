//! # coverscan
//!
//! Book cover recognition. A cover image goes through region OCR (Florence-2
//! running on ONNX Runtime), an optional title/author detector and a book
//! catalog lookup; candidates are ranked by how many of their title and
//! author words appear in the recognized text.
//!
//! ## Modules
//!
//! * [`core`] - errors, ONNX Runtime session handling and the stage traits
//! * [`domain`] - request and response types
//! * [`models`] - OCR engines, including the Florence-2 decode loop
//! * [`processors`] - image normalization and generation parsing
//! * [`nlp`] - title/author detection engines
//! * [`search`] - catalog clients and match scoring
//! * [`pipeline`] - the [`CoverAnalyzer`](pipeline::CoverAnalyzer)
//! * [`utils`] - tracing setup and image decoding
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use coverscan::models::{Florence2Config, Florence2OnnxEngine};
//! use coverscan::nlp::EmptyNlpEngine;
//! use coverscan::pipeline::CoverAnalyzer;
//! use coverscan::search::OpenLibraryClient;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Florence2Config::new("models/florence-2-base-ft");
//! let engine = Florence2OnnxEngine::new(&config)?;
//! let analyzer = CoverAnalyzer::new(
//!     Arc::new(engine),
//!     Arc::new(EmptyNlpEngine),
//!     Arc::new(OpenLibraryClient::new()),
//! );
//!
//! let bytes = std::fs::read("cover.jpg")?;
//! let response = analyzer.analyze(&bytes).await;
//! println!("{}", serde_json::to_string_pretty(&response)?);
//! # Ok(())
//! # }
//! ```

pub mod core;
pub mod domain;
pub mod models;
pub mod nlp;
pub mod pipeline;
pub mod processors;
pub mod search;
pub mod utils;
