//! Open Library catalog client.
//!
//! Only the endpoint constants and configuration live here so far; the live
//! search call reports [`SearchError::NotImplemented`].

use super::SearchError;
use crate::core::traits::BookSearchClient;
use crate::domain::BookMatch;
use async_trait::async_trait;

pub const BASE_URL: &str = "https://openlibrary.org";
pub const COVER_URL: &str = "https://covers.openlibrary.org/b/id";
pub const USER_AGENT: &str = concat!("coverscan/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub struct OpenLibraryClient {
    base_url: String,
    user_agent: String,
}

impl OpenLibraryClient {
    pub fn new() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
            user_agent: USER_AGENT.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Cover image URL for an Open Library cover id.
    pub fn cover_url(cover_id: u64) -> String {
        format!("{COVER_URL}/{cover_id}-M.jpg")
    }
}

impl Default for OpenLibraryClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BookSearchClient for OpenLibraryClient {
    fn name(&self) -> &str {
        "openlibrary"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<BookMatch>, SearchError> {
        tracing::debug!(base_url = %self.base_url, query, limit, "catalog search requested");
        Err(SearchError::NotImplemented {
            feature: "OpenLibrary search".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_search_is_not_implemented() {
        let err = OpenLibraryClient::new()
            .search("test query", 11)
            .await
            .unwrap_err();
        assert!(matches!(err, SearchError::NotImplemented { .. }));
        assert_eq!(err.to_string(), "OpenLibrary search not yet implemented");
    }

    #[test]
    fn test_builder_and_cover_url() {
        let client = OpenLibraryClient::default()
            .with_base_url("http://localhost:8080")
            .with_user_agent("tests");
        assert_eq!(client.base_url(), "http://localhost:8080");
        assert_eq!(client.user_agent(), "tests");
        assert_eq!(
            OpenLibraryClient::cover_url(8231856),
            "https://covers.openlibrary.org/b/id/8231856-M.jpg"
        );
    }
}
