//! Search hits to prompt context: document mapping, retrieval, and formatting.

pub mod context;
pub mod document;
pub mod retriever;

pub use context::{SecondaryText, format_context};
pub use document::ContentField;
pub use retriever::Retriever;
