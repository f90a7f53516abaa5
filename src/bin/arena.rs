#![forbid(unsafe_code)]

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use search_arena::config::load_config;
use search_arena::evaluation::{BatchAggregationEngine, RunControl};
use search_arena::gateway::RetryingGateway;
use search_arena::provider::ProviderRegistry;
use search_arena::report::{build_report, performance_csv, ReportOptions};
use search_arena::scoring::ScoreJudge;
use search_arena::trace::{JsonlTraceSink, TraceSink};

#[derive(Parser)]
#[command(name = "arena", version, about = "Search provider evaluation CLI")]
struct Cli {
    /// Debug-level logging (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch evaluation and write the JSON report
    Run {
        #[arg(long)]
        config: PathBuf,
        /// JSON array of strings, or one query per line
        #[arg(long)]
        queries: PathBuf,
        #[arg(long)]
        out: PathBuf,
        /// JSONL trace of every dimension score
        #[arg(long)]
        trace: Option<PathBuf>,
        /// Per-provider performance table
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Override outer rounds
        #[arg(long)]
        rounds: Option<usize>,
        /// Override inner rounds
        #[arg(long)]
        repeat: Option<usize>,
        /// Stop starting new work after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,
        /// Leave per-cell detail out of the report
        #[arg(long)]
        summary_only: bool,
    },
    /// Validate a configuration file
    ValidateConfig {
        #[arg(long)]
        config: PathBuf,
    },
    /// List enabled providers from a configuration file
    Providers {
        #[arg(long)]
        config: PathBuf,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::ValidateConfig { config } => {
            let cfg = load_config(&config)?;
            let systems: Vec<String> = cfg.scoring_systems.iter().map(|s| s.to_string()).collect();
            println!(
                "ok: {} dimensions, scales [{}], {} providers, {} x {} rounds",
                cfg.dimensions.len(),
                systems.join(", "),
                cfg.providers.iter().filter(|p| p.enabled).count(),
                cfg.test_rounds,
                cfg.repeat_times
            );
        }
        Commands::Providers { config } => {
            let cfg = load_config(&config)?;
            for provider in &cfg.providers {
                let state = if provider.enabled { "enabled" } else { "disabled" };
                println!("{}\t{state}", provider.name);
            }
        }
        Commands::Run {
            config,
            queries,
            out,
            trace,
            csv,
            rounds,
            repeat,
            deadline_secs,
            summary_only,
        } => {
            let mut cfg = load_config(&config)?;
            if let Some(rounds) = rounds {
                cfg.test_rounds = rounds;
            }
            if let Some(repeat) = repeat {
                cfg.repeat_times = repeat;
            }
            cfg.validate()?;

            let queries = read_queries(&queries)?;
            if queries.is_empty() {
                return Err("queries file contains no queries".into());
            }

            let registry = ProviderRegistry::from_settings(&cfg.providers)?;
            if registry.is_empty() {
                return Err("no enabled providers in configuration".into());
            }

            let gateway = RetryingGateway::from_env(
                cfg.judge.base_url.as_deref(),
                cfg.judge.timeout(),
                cfg.judge.gateway_config(),
            )?;
            let run_id = uuid::Uuid::new_v4();
            let judge = ScoreJudge::new(Arc::new(gateway), &cfg.judge.model)
                .temperature(cfg.judge.temperature)
                .max_tokens(cfg.judge.max_tokens)
                .with_run(run_id);

            let (trace_sink, trace_worker) = match trace {
                Some(path) => {
                    let (sink, worker) = JsonlTraceSink::new(path)?;
                    (Some(Arc::new(sink)), Some(worker))
                }
                None => (None, None),
            };

            let mut engine =
                BatchAggregationEngine::from_config(&cfg, registry, judge).with_run_id(run_id);
            if let Some(sink) = &trace_sink {
                engine = engine.with_trace(sink.clone() as Arc<dyn TraceSink>);
            }

            let cancel = Arc::new(AtomicBool::new(false));
            let mut control = RunControl::new().with_cancel_flag(cancel.clone());
            if let Some(secs) = deadline_secs {
                control = control.with_timeout(Duration::from_secs(secs));
            }
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("interrupt received; finishing the current judge call");
                    cancel.store(true, Ordering::Relaxed);
                }
            });

            let result = engine.run(&queries, &control).await;

            let report = build_report(
                &result,
                &ReportOptions {
                    include_cells: !summary_only,
                },
            );
            write_json(&out, &report)?;
            if let Some(path) = csv {
                std::fs::write(path, performance_csv(&result))?;
            }

            drop(engine);
            drop(trace_sink);
            if let Some(worker) = trace_worker {
                let written = worker.join()?;
                info!(rows = written, "trace written");
            }

            for entry in &result.rankings.combined {
                println!(
                    "{:>2}. {:<20} {:.3} (cov {:.3}, success {:.0}%)",
                    entry.rank,
                    entry.engine,
                    entry.score,
                    entry.stability,
                    entry.success_rate * 100.0
                );
            }
            println!("stop reason: {:?}", result.stop_reason);
        }
    }

    Ok(())
}

/// JSON array of strings, or newline-separated text with `#` comments.
fn read_queries(path: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(path)?;
    if raw.trim_start().starts_with('[') {
        let queries: Vec<String> = serde_json::from_str(&raw)?;
        return Ok(queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect());
    }
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

fn write_json<T: serde::Serialize>(path: &PathBuf, value: &T) -> Result<(), io::Error> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    std::fs::write(path, json)
}
