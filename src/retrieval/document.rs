use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::elastic::SearchError;
use crate::elastic::types::Hit;

/// A retrieved passage: its text plus every other `_source` field.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub content: String,
    pub metadata: Map<String, Value>,
}

/// Which `_source` field holds the document text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentField {
    /// Same field name for every index.
    Single(String),
    /// Field name keyed by the hit's `_index`, for indices with differing schemas.
    PerIndex(HashMap<String, String>),
}

impl ContentField {
    fn is_blank(&self) -> bool {
        match self {
            ContentField::Single(name) => name.trim().is_empty(),
            ContentField::PerIndex(map) => {
                map.is_empty() || map.values().any(|name| name.trim().is_empty())
            }
        }
    }

    pub(super) fn validate(self) -> Option<Self> {
        (!self.is_blank()).then_some(self)
    }

    fn resolve<'a>(&'a self, hit: &Hit) -> Result<&'a str, SearchError> {
        match self {
            ContentField::Single(name) => Ok(name),
            ContentField::PerIndex(map) => {
                let index = hit.index.as_deref().unwrap_or_default();
                map.get(index)
                    .map(String::as_str)
                    .ok_or_else(|| SearchError::UnmappedIndex(index.to_string()))
            }
        }
    }
}

/// Splits a hit's `_source` into content and metadata.
///
/// The content field is removed from the metadata. A non-string content
/// value is rendered as JSON text.
pub fn adapt_hit(hit: Hit, content_field: &ContentField) -> Result<Document, SearchError> {
    let field = content_field.resolve(&hit)?.to_string();
    let mut metadata = hit.source;
    let content = match metadata.remove(&field) {
        Some(Value::String(s)) => s,
        Some(other) => other.to_string(),
        None => return Err(SearchError::MissingField { field }),
    };
    Ok(Document { content, metadata })
}
