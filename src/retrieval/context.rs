use serde_json::{Map, Value};

use super::document::Document;

/// Where a secondary-language rendering of a document may live in its
/// metadata, and how to label it in the prompt.
#[derive(Debug, Clone)]
pub struct SecondaryText {
    pub label: String,
    /// Key under `_source.extras`.
    pub nested_key: String,
    /// Top-level metadata field consulted when the nested key is absent.
    pub flat_field: String,
}

impl Default for SecondaryText {
    fn default() -> Self {
        Self {
            label: "Arabic".to_string(),
            nested_key: "arabic".to_string(),
            flat_field: "content_arabic".to_string(),
        }
    }
}

impl SecondaryText {
    fn lookup<'a>(&self, metadata: &'a Map<String, Value>) -> Option<&'a str> {
        let non_empty = |v: &'a Value| v.as_str().filter(|s| !s.is_empty());

        metadata
            .get("_source")
            .and_then(|s| s.get("extras"))
            .and_then(|e| e.get(&self.nested_key))
            .and_then(non_empty)
            .or_else(|| metadata.get(&self.flat_field).and_then(non_empty))
    }
}

/// Renders documents as numbered paragraphs separated by a blank line:
///
/// ```text
/// 1. {content}
/// Arabic: {secondary}
///
/// 2. {content}
/// ```
///
/// The secondary line is omitted when neither metadata location holds a
/// non-empty string.
pub fn format_context(docs: &[Document], secondary: &SecondaryText) -> String {
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            let mut paragraph = format!("{}. {}", i + 1, doc.content);
            if let Some(text) = secondary.lookup(&doc.metadata) {
                paragraph.push_str(&format!("\n{}: {text}", secondary.label));
            }
            paragraph
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
