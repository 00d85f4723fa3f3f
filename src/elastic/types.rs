use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Request body for `POST /{index}/_search`.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SearchRequest {
    pub query: QueryClause,
    pub highlight: Highlight,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryClause {
    pub multi_match: MultiMatch,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct MultiMatch {
    pub query: String,
    pub fuzziness: u8,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Highlight {
    pub phrase_limit: u32,
    pub fields: BTreeMap<String, HighlightField>,
}

/// Per-field highlight options. Serialized as `{}` to take the index defaults.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct HighlightField {}

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    pub hits: HitsEnvelope,
}

#[derive(Debug, Deserialize)]
pub struct HitsEnvelope {
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// One raw search hit. `_source` is left semi-structured; the adapter decides
/// which field becomes content.
#[derive(Debug, Clone, Deserialize)]
pub struct Hit {
    #[serde(rename = "_index")]
    pub index: Option<String>,
    #[serde(rename = "_source", default)]
    pub source: Map<String, Value>,
}

/// Error body returned by Elasticsearch on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: Option<ErrorCause>,
    pub status: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct ErrorCause {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub reason: Option<String>,
}

/// Index name, wildcard pattern, or list of indices to query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexTarget {
    Single(String),
    Many(Vec<String>),
}

impl IndexTarget {
    /// Parses a comma-separated list. A single entry stays `Single`.
    pub fn parse(raw: &str) -> Self {
        let parts: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect();
        match parts.len() {
            0 => IndexTarget::Single("*".to_string()),
            1 => IndexTarget::Single(parts.into_iter().next().unwrap_or_default()),
            _ => IndexTarget::Many(parts),
        }
    }
}

impl fmt::Display for IndexTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndexTarget::Single(name) => f.write_str(name),
            IndexTarget::Many(names) => f.write_str(&names.join(",")),
        }
    }
}
