//! Book catalog search and candidate scoring.

pub mod openlibrary;
pub mod scoring;

pub use openlibrary::OpenLibraryClient;
pub use scoring::{MATCH_THRESHOLD, build_word_set, score_results};

use thiserror::Error;

/// Default number of candidates requested from the catalog.
pub const DEFAULT_SEARCH_LIMIT: usize = 11;

/// Errors raised by catalog clients.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The client exists only as an interface.
    #[error("{feature} not yet implemented")]
    NotImplemented { feature: String },

    /// The catalog could not be reached or answered with an error.
    #[error("catalog request failed: {message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}
