use std::collections::BTreeMap;

use super::types::{Highlight, HighlightField, MultiMatch, QueryClause, SearchRequest};

/// Edit-distance tolerance for the multi-field match.
pub const FUZZINESS: u8 = 1;
/// Maximum number of phrases considered per highlighted fragment.
pub const PHRASE_LIMIT: u32 = 512;
/// Fields highlighted in every search.
pub const HIGHLIGHT_FIELDS: [&str; 3] = ["content", "content_arabic", "title"];

/// Builds the search body for `query`: a fuzzy `multi_match` across all
/// fields plus highlighting on [`HIGHLIGHT_FIELDS`].
///
/// Embedded double quotes are backslash-escaped. An empty query is passed
/// through as-is.
pub fn build_query(query: &str, size: Option<usize>) -> SearchRequest {
    let fields: BTreeMap<String, HighlightField> = HIGHLIGHT_FIELDS
        .iter()
        .map(|f| (f.to_string(), HighlightField::default()))
        .collect();

    SearchRequest {
        query: QueryClause {
            multi_match: MultiMatch {
                query: escape_quotes(query),
                fuzziness: FUZZINESS,
            },
        },
        highlight: Highlight {
            phrase_limit: PHRASE_LIMIT,
            fields,
        },
        size,
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}
