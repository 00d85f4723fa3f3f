use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::elastic::SearchBackend;
use crate::llm::{ChatModel, LlmError, ReasoningEffort};
use crate::pipeline::{ConversationTurn, PipelineError, PromptPipeline, Prompts};

#[derive(Parser, Debug)]
#[command(version, about = "Ask questions answered only from your Elasticsearch sources")]
pub struct Args {
    /// Question to answer once. Omit to start an interactive chat.
    pub question: Option<String>,

    /// Index, pattern, or comma-separated list of indices to search
    #[arg(long)]
    pub index: Option<String>,

    /// Model identifier (overrides LLM_MODEL)
    #[arg(long)]
    pub model: Option<String>,

    /// Reasoning effort: low, medium, or high (overrides LLM_REASONING_EFFORT)
    #[arg(long)]
    pub reasoning_effort: Option<ReasoningEffort>,

    /// File holding a replacement system prompt for query reformulation
    #[arg(long, value_name = "FILE")]
    pub reformulation_prompt: Option<PathBuf>,

    /// File holding a replacement system prompt for the final answer
    #[arg(long, value_name = "FILE")]
    pub answer_prompt: Option<PathBuf>,
}

impl Args {
    /// Built-in prompts with any file overrides applied.
    pub fn prompts(&self) -> std::io::Result<Prompts> {
        let mut prompts = Prompts::default();
        if let Some(path) = &self.reformulation_prompt {
            prompts.reformulation = std::fs::read_to_string(path)?;
        }
        if let Some(path) = &self.answer_prompt {
            prompts.answer = std::fs::read_to_string(path)?;
        }
        Ok(prompts)
    }
}

/// What was shown to the user for one question.
#[derive(Debug)]
pub struct Reply {
    pub text: String,
    /// Set when the answer stream broke off; `text` holds what arrived before.
    pub interrupted: Option<LlmError>,
}

/// Runs the pipeline for one question, writing fragments to `out` as they
/// arrive. A failed write drops the answer stream, which stops generation.
pub async fn stream_answer<M: ChatModel, B: SearchBackend>(
    pipeline: &PromptPipeline<M, B>,
    question: &str,
    history: &[ConversationTurn],
    out: &mut impl Write,
) -> Result<Reply, PipelineError> {
    let mut answer = pipeline.get_response(question, history).await?;
    let mut text = String::new();
    let mut interrupted = None;

    while let Some(item) = answer.next().await {
        match item {
            Ok(fragment) => {
                if let Err(e) = write!(out, "{fragment}").and_then(|()| out.flush()) {
                    warn!(error = %e, "output closed, abandoning answer");
                    return Ok(Reply { text, interrupted });
                }
                text.push_str(&fragment);
            }
            Err(e) => {
                warn!(error = %e, "answer stream interrupted");
                interrupted = Some(e);
            }
        }
    }
    let _ = writeln!(out);

    Ok(Reply { text, interrupted })
}

/// Answers a single question and exits.
pub async fn run_once<M: ChatModel, B: SearchBackend>(
    pipeline: &PromptPipeline<M, B>,
    question: &str,
) -> Result<(), PipelineError> {
    eprintln!("Generating response...");
    let reply = stream_answer(pipeline, question, &[], &mut std::io::stdout()).await?;
    if let Some(e) = reply.interrupted {
        return Err(PipelineError::Answer(e));
    }
    Ok(())
}

/// Interactive loop. History grows by the user turn and the answer after
/// every exchange; failed exchanges are not recorded.
pub async fn run_chat<M: ChatModel, B: SearchBackend>(
    pipeline: &PromptPipeline<M, B>,
) -> std::io::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ConversationTurn> = Vec::new();
    let mut stdout = std::io::stdout();

    loop {
        print!("Enter your question: ");
        stdout.flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if matches!(question, "exit" | "quit") {
            return Ok(());
        }

        match stream_answer(pipeline, question, &history, &mut stdout).await {
            Ok(reply) => {
                if let Some(e) = &reply.interrupted {
                    eprintln!("error: {e}");
                }
                record_exchange(&mut history, question, reply);
            }
            Err(e) => eprintln!("error: {e}"),
        }
    }
}

fn record_exchange(history: &mut Vec<ConversationTurn>, question: &str, reply: Reply) {
    if reply.text.is_empty() {
        return;
    }
    history.push(ConversationTurn::user(question));
    history.push(ConversationTurn::assistant(reply.text));
}
