//! DispatchSim CLI: compare global request schedulers without GPUs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dispatchsim_core::config::{ArrivalProcess, SimConfig, WorkloadConfig};
use dispatchsim_core::summary::{RunSummary, SimulationReport};
use dispatchsim_core::{generator_from_config, metrics, trace, Request};
use dispatchsim_schedulers::{SchedulerConfig, SchedulerKind};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "dispatchsim",
    about = "Simulate global request dispatch across LLM replicas",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulation with a single scheduler.
    Run {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Override the configured scheduler.
        #[arg(short, long)]
        scheduler: Option<String>,
        /// Write aggregate metrics to this JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Persist full results under this directory (overrides `simulation.output_dir`).
        #[arg(long)]
        results_dir: Option<PathBuf>,
    },
    /// Compare multiple schedulers on the same workload.
    Compare {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
        /// Comma-separated list of scheduler names. Defaults to all of them.
        #[arg(short = 'S', long, value_delimiter = ',')]
        schedulers: Vec<String>,
        /// Write aggregate metrics to this JSON file.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate a request trace.
    GenTrace {
        #[arg(long, value_enum, default_value_t = GenWorkload::Synthetic)]
        workload: GenWorkload,
        #[arg(long, default_value = "1000")]
        num_requests: u64,
        /// Request rate (requests/sec).
        #[arg(long, default_value = "10")]
        qps: f64,
        /// Evenly spaced arrivals instead of Poisson.
        #[arg(long)]
        static_arrivals: bool,
        #[arg(long, default_value = "64")]
        min_tokens: u32,
        #[arg(long, default_value = "4096")]
        max_tokens: u32,
        /// Zipf skew (zipfian only).
        #[arg(long, default_value = "0.99")]
        theta: f64,
        /// Spread popular sizes across the range (zipfian only).
        #[arg(long)]
        scramble: bool,
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Output file path.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Print the hash that names a configuration's results directory.
    HashConfig {
        /// Path to TOML configuration file.
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List available schedulers.
    ListSchedulers,
}

#[derive(Clone, Copy, ValueEnum)]
enum GenWorkload {
    Synthetic,
    Zipfian,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            scheduler,
            output,
            results_dir,
        } => {
            let mut sim_config = load_config(&config)?;
            if let Some(name) = scheduler {
                sim_config = sim_config.with_scheduler(resolve_scheduler(&sim_config, &name)?);
            }

            let report = dispatchsim_core::run_simulation(&sim_config)?;
            println!("{}", metrics::format_table(&report.metrics));

            if let Some(dir) = results_dir.or_else(|| sim_config.simulation.output_dir.clone()) {
                let run_dir = report.persist(&dir)?;
                println!("Results persisted to {}", run_dir.display());
            }
            if let Some(output_path) = output {
                write_metrics(&output_path, &report.metrics)?;
            }
        }
        Commands::Compare {
            config,
            schedulers,
            output,
        } => {
            let sim_config = load_config(&config)?;
            let names: Vec<String> = if schedulers.is_empty() {
                dispatchsim_schedulers::available_schedulers()
                    .into_iter()
                    .map(String::from)
                    .collect()
            } else {
                schedulers
            };
            let selected = names
                .iter()
                .map(|name| resolve_scheduler(&sim_config, name))
                .collect::<Result<Vec<_>>>()?;

            let reports = dispatchsim_core::compare_schedulers(&sim_config, &selected)?;
            let results: Vec<_> = reports.iter().map(|r| r.metrics.clone()).collect();
            println!("{}", metrics::format_comparison_table(&results));
            for result in &results {
                println!("{}", metrics::format_table(result));
            }

            if let Some(dir) = &sim_config.simulation.output_dir {
                for report in &reports {
                    persist_report(report, dir)?;
                }
            }
            if let Some(output_path) = output {
                write_metrics(&output_path, &results)?;
            }
        }
        Commands::GenTrace {
            workload,
            num_requests,
            qps,
            static_arrivals,
            min_tokens,
            max_tokens,
            theta,
            scramble,
            seed,
            output,
        } => {
            let arrival_process = if static_arrivals {
                ArrivalProcess::Static
            } else {
                ArrivalProcess::Poisson
            };
            let workload = match workload {
                GenWorkload::Synthetic => WorkloadConfig::Synthetic {
                    num_requests,
                    qps,
                    arrival_process,
                    min_tokens,
                    max_tokens,
                },
                GenWorkload::Zipfian => WorkloadConfig::Zipfian {
                    num_requests,
                    qps,
                    arrival_process,
                    min_tokens,
                    max_tokens,
                    theta,
                    scramble,
                    seed: None,
                },
            };
            workload.validate().context("invalid workload parameters")?;

            let requests: Vec<Request> = generator_from_config(&workload, seed)?.collect();
            trace::write_trace(&requests, &output)
                .with_context(|| format!("writing trace to {}", output.display()))?;
            println!("Generated {} requests to {}", requests.len(), output.display());
        }
        Commands::HashConfig { config } => {
            let sim_config = load_config(&config)?;
            println!("{}", RunSummary::from_config(&sim_config).config_hash()?);
        }
        Commands::ListSchedulers => {
            println!("Available schedulers:");
            for name in dispatchsim_schedulers::available_schedulers() {
                println!("  - {}", name);
            }
        }
    }

    Ok(())
}

fn load_config(path: &Path) -> Result<SimConfig> {
    SimConfig::from_file(path).with_context(|| format!("loading config {}", path.display()))
}

/// Scheduler selected by name. Parameters come from the config file when it
/// names the same kind, otherwise the kind's defaults.
fn resolve_scheduler(config: &SimConfig, name: &str) -> Result<SchedulerConfig> {
    let kind: SchedulerKind = name.parse().with_context(|| {
        format!(
            "available schedulers: {:?}",
            dispatchsim_schedulers::available_schedulers()
        )
    })?;
    if config.scheduler.kind() == kind {
        Ok(config.scheduler.clone())
    } else {
        Ok(SchedulerConfig::with_defaults(kind))
    }
}

fn persist_report(report: &SimulationReport, dir: &Path) -> Result<()> {
    let run_dir = report.persist(dir)?;
    println!(
        "{} results persisted to {}",
        report.metrics.scheduler,
        run_dir.display()
    );
    Ok(())
}

fn write_metrics<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("Results written to {}", path.display());
    Ok(())
}
