use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use council_agents::search::SearchProvider;
use council_agents::telemetry::append_metrics;
use council_agents::{
    AgentFactory, CouncilClients, CouncilConfig, CouncilRun, DeliberationOrchestrator,
    NoSearch, ProgressObserver, RunOptions, SearxSearch,
};
use deliberation::{
    canon, DeliberationPhase, DiscussionResponse, Lens, SpecialistAnalysis, Stage,
    ValidationReport,
};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full council on one character
    Run {
        /// Character name
        #[arg(long)]
        subject: String,

        /// Media the character appears in
        #[arg(long)]
        source: String,

        /// TOML config file (environment variables still take precedence)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Skip the discussion round
        #[arg(long, default_value_t = false)]
        no_discussion: bool,

        /// Skip the validator
        #[arg(long, default_value_t = false)]
        no_validation: bool,

        /// Times a failed research, validation or synthesis phase is re-invoked
        #[arg(long, default_value_t = 2)]
        retries: u32,

        /// Write the run record here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,

        /// Append run metrics as one JSON line to this file
        #[arg(long)]
        metrics_log: Option<PathBuf>,
    },
    /// Print the canonical type table
    Types,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    record: &'a deliberation::RunRecord,
    metrics: &'a council_agents::RunMetrics,
}

/// Logs progress callbacks as they arrive.
struct LogObserver;

impl ProgressObserver for LogObserver {
    fn on_phase(&self, phase: DeliberationPhase) {
        info!(%phase, "phase reached");
    }

    fn on_analysis(&self, lens: Lens, analysis: &SpecialistAnalysis) {
        info!(
            agent = %lens,
            predicted = %analysis.predicted_type,
            confidence = analysis.confidence,
            "specialist reported"
        );
    }

    fn on_discussion(&self, lens: Lens, response: &DiscussionResponse) {
        info!(agent = %lens, failed = response.failed, "discussion response");
    }

    fn on_validation(&self, report: &ValidationReport) {
        info!(errors = report.errors_found.len(), "validator reported");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Args::parse();
    match args.command {
        Command::Types => {
            print_types();
            Ok(())
        }
        Command::Run {
            subject,
            source,
            config,
            no_discussion,
            no_validation,
            retries,
            output,
            metrics_log,
        } => {
            let config = CouncilConfig::load(config.as_deref())?;
            let options = RunOptions {
                discussion: !no_discussion,
                validation: !no_validation,
            };
            run_council(&config, &subject, &source, options, retries, output, metrics_log).await
        }
    }
}

async fn run_council(
    config: &CouncilConfig,
    subject: &str,
    source: &str,
    options: RunOptions,
    retries: u32,
    output: Option<PathBuf>,
    metrics_log: Option<PathBuf>,
) -> Result<()> {
    let clients = CouncilClients::from_config(config).context("Failed to build model clients")?;
    let search: Arc<dyn SearchProvider> = match &config.search.searx_url {
        Some(url) => {
            let http = council_agents::llm::http_client(config)
                .context("Failed to build search client")?;
            Arc::new(SearxSearch::new(http, url))
        }
        None => {
            warn!("no search backend configured, the scout will rely on background knowledge");
            Arc::new(NoSearch)
        }
    };
    info!(
        base_url = %config.endpoint.base_url,
        specialist = %config.models.specialist,
        manager = %config.models.manager,
        "typing council starting"
    );

    let orchestrator =
        DeliberationOrchestrator::new(AgentFactory::new(clients, search, config.search.clone()));
    let mut run = CouncilRun::new(subject, source, options);
    let mut attempts: HashMap<Stage, u32> = HashMap::new();

    while let Err(e) = orchestrator.resume(&mut run, &LogObserver).await {
        let Some(stage) = e.stage() else {
            return Err(e).context("council run failed");
        };
        let used = attempts.entry(stage).or_insert(0);
        if *used >= retries || !e.is_retriable() {
            return Err(e).with_context(|| {
                format!("{stage} phase failed after {} attempt(s)", *used + 1)
            });
        }
        *used += 1;
        let backoff = Duration::from_secs(2u64.pow(*used));
        warn!(%stage, attempt = *used, error = %e, ?backoff, "retrying phase");
        tokio::time::sleep(backoff).await;
    }

    let (record, metrics) = run.into_record()?;
    let json = serde_json::to_string_pretty(&RunOutput {
        record: &record,
        metrics: &metrics,
    })
    .context("Failed to serialize run record")?;

    match output {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), id = %record.id, "run record written");
        }
        None => println!("{json}"),
    }
    if let Some(path) = metrics_log {
        append_metrics(&metrics, &path).context("Failed to write --metrics-log")?;
        info!(path = %path.display(), "run metrics appended");
    }
    info!(
        final_type = %record.final_type,
        confidence = record.final_result.confidence_score,
        model_calls = metrics.model_calls,
        "council verdict"
    );
    Ok(())
}

fn print_types() {
    for t in &canon::TYPES {
        println!(
            "{}  {}  {:<28} {:<12} {:<5}  {}",
            t.code,
            t.jungian,
            t.name,
            t.nickname,
            t.quadra,
            t.stack_string()
        );
    }
    println!();
    print!("{}", canon::quadra_reference());
}
