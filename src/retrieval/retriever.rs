use tracing::debug;

use super::document::{ContentField, Document, adapt_hit};
use crate::config::ConfigError;
use crate::elastic::query::build_query;
use crate::elastic::types::IndexTarget;
use crate::elastic::{SearchBackend, SearchError};

/// Runs one search per query and maps every hit to a [`Document`], keeping
/// the backend's relevance order. No retry, paging, or caching.
#[derive(Debug)]
pub struct Retriever<B> {
    backend: B,
    index: IndexTarget,
    content_field: ContentField,
    size: Option<usize>,
}

impl<B: SearchBackend> Retriever<B> {
    /// Fails with [`ConfigError::MissingContentField`] when `content_field`
    /// is absent or blank.
    pub fn new(
        backend: B,
        index: IndexTarget,
        content_field: Option<ContentField>,
    ) -> Result<Self, ConfigError> {
        let content_field = content_field
            .and_then(ContentField::validate)
            .ok_or(ConfigError::MissingContentField)?;
        Ok(Self {
            backend,
            index,
            content_field,
            size: None,
        })
    }

    pub fn with_size(mut self, size: Option<usize>) -> Self {
        self.size = size;
        self
    }

    pub async fn retrieve(&self, query: &str) -> Result<Vec<Document>, SearchError> {
        let body = build_query(query, self.size);
        let response = self.backend.search(&self.index, &body).await?;
        debug!(hits = response.hits.hits.len(), "retrieved hits");

        response
            .hits
            .hits
            .into_iter()
            .map(|hit| adapt_hit(hit, &self.content_field))
            .collect()
    }
}
