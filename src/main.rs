use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use rustynews::{
    config, logging,
    jobs::{CancelSignal, HttpJobClient},
    pipeline::{Pipeline, PipelineOutcome, PipelineRequest, PipelineSettings, PipelineState},
};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "rustynews",
    version,
    about = "Extract a news article and analyze it through the news analyzer service"
)]
struct Cli {
    /// Override NEWS_ANALYZER_URL for this invocation.
    #[arg(long, global = true)]
    base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the two-stage extraction + analysis pipeline.
    Analyze {
        /// Article URL.
        url: String,
        /// Print the outcome as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Use the legacy single-request analysis endpoint.
    Legacy {
        /// Article URL.
        url: String,
    },
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    dotenvy::dotenv().ok();
    logging::init_tracing("warn");

    let mut loaded = config::Config::from_env().context("failed to load configuration")?;
    if let Some(base_url) = cli.base_url {
        loaded.service_url = base_url;
    }
    let config = config::install(loaded).context("failed to install configuration")?;
    let client = HttpJobClient::from_config().context("failed to build job service client")?;

    match cli.command {
        Command::Analyze { url, json } => {
            let Some(request) = PipelineRequest::new(url) else {
                bail!("article URL must not be empty");
            };
            let pipeline = Pipeline::new(Arc::new(client), PipelineSettings::from_config(config));
            let outcome = analyze(&pipeline, request).await?;
            tracing::debug!(metrics = ?pipeline.metrics_snapshot(), "Pipeline finished");
            report(&outcome, json)
        }
        Command::Legacy { url } => {
            if url.trim().is_empty() {
                bail!("article URL must not be empty");
            }
            let payload = client
                .analyze_single_shot(url.trim())
                .await
                .map_err(|error| anyhow::anyhow!(rustynews::pipeline::user_message(&error)))?;
            println!("{payload}");
            Ok(())
        }
    }
}

async fn analyze(pipeline: &Pipeline, request: PipelineRequest) -> Result<PipelineOutcome> {
    let cancel = CancelSignal::new();
    let on_interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let progress = |state: &PipelineState| {
        if let PipelineState::Running(stage) = state {
            eprintln!("{stage}...");
        }
    };
    let result = pipeline.run_observed(request, &progress, &cancel).await;
    on_interrupt.abort();

    result.map_err(|_| anyhow::anyhow!("analysis cancelled"))
}

fn report(outcome: &PipelineOutcome, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(outcome).context("failed to encode outcome")?
        );
    }
    match outcome {
        PipelineOutcome::Success(payload) => {
            if !json {
                println!("{payload}");
            }
            Ok(())
        }
        PipelineOutcome::Failure(message) => bail!("{message}"),
    }
}
