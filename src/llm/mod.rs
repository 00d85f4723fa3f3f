//! OpenAI-compatible chat completions: blocking and streamed.

pub mod client;
pub mod sse;
pub mod types;

pub use client::{ChatClient, ChatModel, FragmentStream, LlmError, LlmSettings};
pub use types::{ChatMessage, ReasoningEffort};
