mod cli;
mod config;
mod elastic;
mod llm;
mod pipeline;
mod retrieval;

pub const USER_AGENT: &str = concat!("sanad/", env!("CARGO_PKG_VERSION"));

use std::time::Duration;

use clap::Parser;
use reqwest::Client;
use tracing::{info, warn};

use cli::Args;
use config::Config;
use elastic::ElasticClient;
use elastic::types::IndexTarget;
use llm::ChatClient;
use pipeline::PromptPipeline;
use retrieval::Retriever;

/// TCP connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Longest silence tolerated between body reads, including mid-answer.
const READ_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Before the subscriber, so RUST_LOG can come from .env.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sanad=info".parse()?),
        )
        .init();

    if let Err(e) = dotenv
        && !e.not_found()
    {
        warn!("ignoring unreadable .env file: {e}");
    }

    let args = Args::parse();
    let mut config = Config::from_env()?;
    if let Some(index) = &args.index {
        config.index = IndexTarget::parse(index);
    }
    if let Some(model) = &args.model {
        config.llm.model = model.clone();
    }
    if let Some(effort) = args.reasoning_effort {
        config.llm.reasoning_effort = effort;
    }

    let http = Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .read_timeout(READ_TIMEOUT)
        .build()?;

    let search = ElasticClient::new(http.clone(), &config.elastic_url, config.elastic_api_key);
    let retriever =
        Retriever::new(search, config.index.clone(), config.content_field)?.with_size(config.result_size);
    let model = ChatClient::new(http, config.llm.clone())?;
    let pipeline = PromptPipeline::new(model, retriever).with_prompts(args.prompts()?);

    info!(
        index = %config.index,
        model = %config.llm.model,
        effort = %config.llm.reasoning_effort,
        "sanad ready"
    );

    match args.question {
        Some(question) => cli::run_once(&pipeline, &question).await?,
        None => cli::run_chat(&pipeline).await?,
    }
    Ok(())
}
