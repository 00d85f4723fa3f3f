//! Question in, grounded answer out: reformulate, retrieve, then stream the
//! answer constrained to the retrieved sources.

pub mod prompts;
pub mod stream;

pub use prompts::Prompts;
pub use stream::AnswerStream;

use tracing::{debug, info, warn};

use crate::elastic::{SearchBackend, SearchError};
use crate::llm::{ChatMessage, ChatModel, LlmError};
use crate::retrieval::{Retriever, SecondaryText, format_context};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnRole {
    User,
    Assistant,
}

/// One prior exchange message, supplied by the caller oldest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Assistant,
            content: content.into(),
        }
    }
}

impl From<&ConversationTurn> for ChatMessage {
    fn from(turn: &ConversationTurn) -> Self {
        match turn.role {
            TurnRole::User => ChatMessage::user(&turn.content),
            TurnRole::Assistant => ChatMessage::assistant(&turn.content),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("query reformulation failed: {0}")]
    Reformulation(#[source] LlmError),

    #[error("retrieval failed: {0}")]
    Retrieval(#[from] SearchError),

    #[error("answer generation failed: {0}")]
    Answer(#[source] LlmError),
}

/// Result of reformulation and retrieval, ready for the answer prompt.
#[derive(Debug, Clone)]
pub struct PreparedContext {
    pub search_query: String,
    pub documents: usize,
    pub context: String,
}

pub struct PromptPipeline<M, B> {
    model: M,
    retriever: Retriever<B>,
    prompts: Prompts,
    secondary: SecondaryText,
}

impl<M: ChatModel, B: SearchBackend> PromptPipeline<M, B> {
    pub fn new(model: M, retriever: Retriever<B>) -> Self {
        Self {
            model,
            retriever,
            prompts: Prompts::default(),
            secondary: SecondaryText::default(),
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    /// Stage 1: rewrites the question into a search query. The model output
    /// is used verbatim.
    pub async fn reformulate(&self, question: &str) -> Result<String, PipelineError> {
        let messages = self.prompts.reformulation_messages(question);
        let query = self
            .model
            .complete(&messages)
            .await
            .inspect_err(|e| warn!(error = %e, "reformulation failed"))
            .map_err(PipelineError::Reformulation)?;
        debug!(%query, "reformulated query");
        Ok(query)
    }

    /// Stages 1 and 2: reformulate, retrieve with the reformulated query, and
    /// render the hits as prompt context.
    pub async fn prepare_context(&self, question: &str) -> Result<PreparedContext, PipelineError> {
        let search_query = self.reformulate(question).await?;
        let docs = self
            .retriever
            .retrieve(&search_query)
            .await
            .inspect_err(|e| warn!(error = %e, "retrieval failed"))?;
        let context = format_context(&docs, &self.secondary);
        Ok(PreparedContext {
            search_query,
            documents: docs.len(),
            context,
        })
    }

    /// Answers `question` given the prior turns.
    ///
    /// Reformulation and retrieval complete before this returns; any failure
    /// there is returned here and no answer is started. The final stage sees
    /// the original question, not the reformulated one.
    pub async fn get_response(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> Result<AnswerStream, PipelineError> {
        let prepared = self.prepare_context(question).await?;
        info!(
            search_query = %prepared.search_query,
            documents = prepared.documents,
            history = history.len(),
            "context assembled"
        );

        let history: Vec<ChatMessage> = history.iter().map(ChatMessage::from).collect();
        let messages = self
            .prompts
            .answer_messages(question, &prepared.context, &history);

        let fragments = self
            .model
            .complete_stream(&messages)
            .await
            .map_err(PipelineError::Answer)?;
        Ok(AnswerStream::new(fragments))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::elastic::types::IndexTarget;
    use crate::llm::FragmentStream;
    use crate::retrieval::ContentField;
    use crate::retrieval::retriever::tests::MockBackend;
    use futures::StreamExt;
    use futures::stream;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Model with a scripted completion and scripted answer fragments.
    /// Records every transcript it receives.
    #[derive(Clone, Default)]
    pub(crate) struct MockModel {
        completion: Option<String>,
        fragments: Vec<String>,
        fail_stream: bool,
        break_stream: bool,
        completions: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
        streams: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
        fragments_produced: Arc<AtomicUsize>,
    }

    impl MockModel {
        pub(crate) fn new(completion: &str, fragments: &[&str]) -> Self {
            Self {
                completion: Some(completion.to_string()),
                fragments: fragments.iter().map(|f| f.to_string()).collect(),
                ..Self::default()
            }
        }

        /// Ends the answer stream with an error after the scripted fragments.
        pub(crate) fn breaking_mid_stream(mut self) -> Self {
            self.break_stream = true;
            self
        }

        pub(crate) fn fragments_produced(&self) -> usize {
            self.fragments_produced.load(Ordering::SeqCst)
        }
    }

    impl ChatModel for MockModel {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
            self.completions.lock().unwrap().push(messages.to_vec());
            self.completion.clone().ok_or(LlmError::RateLimited)
        }

        async fn complete_stream(
            &self,
            messages: &[ChatMessage],
        ) -> Result<FragmentStream, LlmError> {
            self.streams.lock().unwrap().push(messages.to_vec());
            if self.fail_stream {
                return Err(LlmError::Api {
                    code: 500,
                    message: "boom".into(),
                });
            }
            let produced = self.fragments_produced.clone();
            let tail = self
                .break_stream
                .then(|| Err::<String, _>(LlmError::Stream("connection reset".into())));
            Ok(stream::iter(self.fragments.clone())
                .map(move |f| {
                    produced.fetch_add(1, Ordering::SeqCst);
                    Ok(f)
                })
                .chain(stream::iter(tail))
                .boxed())
        }
    }

    pub(crate) fn pipeline(model: MockModel, backend: MockBackend) -> PromptPipeline<MockModel, MockBackend> {
        let retriever = Retriever::new(
            backend,
            IndexTarget::Single("*".into()),
            Some(ContentField::Single("content".into())),
        )
        .unwrap();
        PromptPipeline::new(model, retriever)
    }

    async fn collect(answer: AnswerStream) -> String {
        answer.map(Result::unwrap).collect::<Vec<_>>().await.concat()
    }

    #[tokio::test]
    async fn end_to_end_uses_reformulated_query_and_original_question() {
        let model = MockModel::new(
            "definition of Islamic prayer (salah)",
            &["Prayer ", "is worship [Source 1]."],
        );
        let backend = MockBackend::with_sources(vec![json!({
            "content": "Prayer (salah) is...",
            "title": "Salah"
        })]);
        let p = pipeline(model.clone(), backend.clone());

        let answer = p.get_response("What is prayer?", &[]).await.unwrap();
        assert_eq!(collect(answer).await, "Prayer is worship [Source 1].");

        let completions = model.completions.lock().unwrap();
        assert_eq!(completions[0][1].content, "Original query: What is prayer?");

        assert_eq!(backend.queries(), ["definition of Islamic prayer (salah)"]);

        let streams = model.streams.lock().unwrap();
        let final_call = &streams[0];
        let question = &final_call[final_call.len() - 2];
        let sources = &final_call[final_call.len() - 1];
        assert_eq!(question.content, "User question: What is prayer?");
        assert!(!question.content.contains("salah"));
        assert!(sources.content.contains("1. Prayer (salah) is..."));
    }

    #[tokio::test]
    async fn history_is_forwarded_verbatim_in_order() {
        let model = MockModel::new("q", &["ok"]);
        let p = pipeline(model.clone(), MockBackend::with_sources(vec![]));
        let history = [
            ConversationTurn::user("What is zakat?"),
            ConversationTurn::assistant("Obligatory alms."),
        ];

        let answer = p.get_response("Who pays it?", &history).await.unwrap();
        collect(answer).await;

        let streams = model.streams.lock().unwrap();
        let final_call = &streams[0];
        assert_eq!(final_call[1], ChatMessage::user("What is zakat?"));
        assert_eq!(final_call[2], ChatMessage::assistant("Obligatory alms."));
        assert_eq!(final_call.len(), 5);
    }

    #[tokio::test]
    async fn empty_retrieval_yields_empty_context() {
        let model = MockModel::new("q", &["insufficient"]);
        let p = pipeline(model.clone(), MockBackend::with_sources(vec![]));

        let prepared = p.prepare_context("anything").await.unwrap();
        assert_eq!(prepared.documents, 0);
        assert_eq!(prepared.context, "");
    }

    #[test]
    fn turn_role_maps_to_chat_role() {
        let turn = ConversationTurn::assistant("Obligatory alms.");
        assert_eq!(turn.role, TurnRole::Assistant);
        assert_eq!(ChatMessage::from(&turn), ChatMessage::assistant("Obligatory alms."));
        assert_eq!(ConversationTurn::user("q").role, TurnRole::User);
    }

    #[tokio::test]
    async fn blank_reformulation_is_searched_verbatim() {
        let model = MockModel::new("", &["insufficient"]);
        let backend = MockBackend::with_sources(vec![]);
        let p = pipeline(model.clone(), backend.clone());

        let answer = p.get_response("?", &[]).await.unwrap();
        assert_eq!(collect(answer).await, "insufficient");
        assert_eq!(backend.queries(), [""]);
    }

    #[tokio::test]
    async fn reformulation_failure_aborts_before_search() {
        let model = MockModel::default();
        let backend = MockBackend::with_sources(vec![json!({ "content": "x" })]);
        let p = pipeline(model.clone(), backend.clone());

        let err = p.get_response("q", &[]).await.unwrap_err();

        assert!(matches!(err, PipelineError::Reformulation(LlmError::RateLimited)));
        assert!(backend.queries().is_empty());
        assert!(model.streams.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn retrieval_failure_aborts_before_answer() {
        let model = MockModel::new("q", &["never"]);
        let p = pipeline(model.clone(), MockBackend::failing());

        let err = p.get_response("q", &[]).await.unwrap_err();

        assert!(matches!(err, PipelineError::Retrieval(SearchError::Api { .. })));
        assert!(model.streams.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_content_field_in_hit_aborts() {
        let model = MockModel::new("q", &["never"]);
        let backend = MockBackend::with_sources(vec![json!({ "title": "no content" })]);
        let p = pipeline(model, backend);

        let err = p.get_response("q", &[]).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Retrieval(SearchError::MissingField { .. })
        ));
    }

    #[tokio::test]
    async fn answer_start_failure_is_reported() {
        let model = MockModel {
            fail_stream: true,
            ..MockModel::new("q", &[])
        };
        let p = pipeline(model, MockBackend::with_sources(vec![]));

        let err = p.get_response("q", &[]).await.unwrap_err();
        assert!(matches!(err, PipelineError::Answer(LlmError::Api { code: 500, .. })));
    }

    #[tokio::test]
    async fn dropping_after_first_fragment_stops_generation() {
        let model = MockModel::new("q", &["one", "two", "three"]);
        let p = pipeline(model.clone(), MockBackend::with_sources(vec![]));

        let mut answer = p.get_response("q", &[]).await.unwrap();
        assert_eq!(answer.next().await.unwrap().unwrap(), "one");
        drop(answer);

        assert_eq!(model.fragments_produced.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn mid_stream_failure_keeps_earlier_fragments() {
        let model = MockModel::new("q", &["Zakat ", "is "]).breaking_mid_stream();
        let p = pipeline(model, MockBackend::with_sources(vec![]));

        let items: Vec<_> = p.get_response("q", &[]).await.unwrap().collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap(), "Zakat ");
        assert_eq!(items[1].as_ref().unwrap(), "is ");
        assert!(matches!(items[2], Err(LlmError::Stream(_))));
    }

    #[tokio::test]
    async fn custom_prompts_are_used() {
        let model = MockModel::new("q", &["a"]);
        let prompts = Prompts {
            reformulation: "REWRITE".into(),
            answer: "ANSWER".into(),
        };
        let p = pipeline(model.clone(), MockBackend::with_sources(vec![])).with_prompts(prompts);

        collect(p.get_response("q", &[]).await.unwrap()).await;

        assert_eq!(model.completions.lock().unwrap()[0][0].content, "REWRITE");
        assert_eq!(model.streams.lock().unwrap()[0][0].content, "ANSWER");
    }
}
