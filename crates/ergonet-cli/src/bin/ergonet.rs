//! Ergonet CLI - ERGM estimation and simulation on directed networks
//!
//! Usage:
//!   ergonet estimate <config> [--runs N] [--output text|json]
//!   ergonet simulate <config>
//!   ergonet check <config>
//!
//! Each estimation chain is fully independent: its own graph copy, its
//! own theta, and its own RNG stream selected by rank, so multi-run
//! output is reproducible from a single seed. Exit codes: 0 on success,
//! 1 on configuration or input errors, 2 on an engine invariant
//! violation (debug assertions).

use std::path::PathBuf;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::{Parser, Subcommand};
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use ergonet_core::engine::estimator::{estimate, NullObserver};
use ergonet_core::engine::rng::chain_rng;
use ergonet_core::engine::simulate::simulate;
use ergonet_core::Sampler;
use ergonet_frontend::output::{SimulationWriter, TrajectoryWriter};
use ergonet_frontend::{prepare_graph, resolve_model, Config, FrontendError, RunMode};

#[derive(Parser)]
#[command(name = "ergonet")]
#[command(version)]
#[command(about = "ERGM estimation and simulation for large directed networks")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Estimate model parameters from an observed network
    Estimate {
        /// Configuration file
        config: PathBuf,
        /// Number of independent estimation chains
        #[arg(short, long, default_value_t = 1)]
        runs: u32,
        /// Summary format: text or json
        #[arg(short, long, default_value = "text")]
        output: String,
    },
    /// Simulate networks at fixed parameter values
    Simulate {
        /// Configuration file
        config: PathBuf,
    },
    /// Validate a configuration and print the resolved model
    Check {
        /// Configuration file
        config: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct ChainSummary {
    rank: u32,
    theta: Vec<f64>,
    acceptance_rate: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    psi: Option<f64>,
}

fn main() {
    // Invariant violations inside the engine are programming errors and
    // get their own exit code.
    std::panic::set_hook(Box::new(|info| {
        eprintln!("invariant violation: {}", info);
        process::exit(2);
    }));

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Estimate {
            config,
            runs,
            output,
        } => run_estimate(&config, runs, &output),
        Command::Simulate { config } => run_simulate(&config),
        Command::Check { config } => run_check(&config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn base_seed(config: &Config) -> u64 {
    config.seed.unwrap_or_else(|| {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    })
}

fn run_estimate(path: &PathBuf, runs: u32, output: &str) -> Result<(), FrontendError> {
    if runs == 0 {
        return Err(FrontendError::Config("--runs must be at least 1".into()));
    }
    if output != "text" && output != "json" {
        return Err(FrontendError::Config(format!(
            "--output must be text or json, got '{}'",
            output
        )));
    }

    let config = Config::from_file(path)?;
    config.validate(RunMode::Estimation)?;
    let template = prepare_graph(&config)?;
    let resolved = resolve_model(&config, template.attributes(), RunMode::Estimation)?;
    let model = resolved.model;
    let labels: Vec<&str> = model.labels().collect();
    let settings = config.estimate_settings();
    let seed = base_seed(&config);
    info!(seed, runs, statistics = model.len(), "estimation starting");

    let summaries: Result<Vec<ChainSummary>, FrontendError> = (0..runs)
        .into_par_iter()
        .map(|rank| {
            let mut g = template.clone();
            let mut sampler = Sampler::new(
                config.sampler_kind(),
                config.sampler_options(),
                model.len(),
            );
            let mut rng = chain_rng(seed, rank as u64);

            let result = match (&config.theta_file_prefix, &config.dz_a_file_prefix) {
                (Some(theta_prefix), Some(dza_prefix)) => {
                    let mut writer =
                        TrajectoryWriter::create(theta_prefix, dza_prefix, rank, &labels)?;
                    let result = estimate(
                        &mut g,
                        &model,
                        &settings,
                        &mut sampler,
                        &mut rng,
                        &mut writer,
                    )?;
                    writer.finish()?;
                    result
                }
                _ => estimate(
                    &mut g,
                    &model,
                    &settings,
                    &mut sampler,
                    &mut rng,
                    &mut NullObserver,
                )?,
            };

            Ok(ChainSummary {
                rank,
                theta: result.theta_tail_mean,
                acceptance_rate: result.acceptance_rate,
                psi: result.psi,
            })
        })
        .collect();
    let summaries = summaries?;

    match output {
        "json" => print_json_summary(&labels, &summaries),
        _ => print_text_summary(&labels, &summaries),
    }
    Ok(())
}

fn print_text_summary(labels: &[&str], summaries: &[ChainSummary]) {
    println!("Estimation finished ({} chain(s))\n", summaries.len());
    for summary in summaries {
        println!(
            "chain {}: acceptance rate {:.4}{}",
            summary.rank,
            summary.acceptance_rate,
            summary
                .psi
                .map(|p| format!(", psi {:.6}", p))
                .unwrap_or_default()
        );
    }

    println!("\nParameter estimates (trajectory tail means):");
    for (k, label) in labels.iter().enumerate() {
        let mean =
            summaries.iter().map(|s| s.theta[k]).sum::<f64>() / summaries.len() as f64;
        print!("  {} = {:.6}", label, mean);
        if summaries.len() > 1 {
            let per_chain: Vec<String> =
                summaries.iter().map(|s| format!("{:.6}", s.theta[k])).collect();
            print!("  [{}]", per_chain.join(", "));
        }
        println!();
    }
}

fn print_json_summary(labels: &[&str], summaries: &[ChainSummary]) {
    let mean: Vec<serde_json::Value> = labels
        .iter()
        .enumerate()
        .map(|(k, label)| {
            let value =
                summaries.iter().map(|s| s.theta[k]).sum::<f64>() / summaries.len() as f64;
            serde_json::json!({ "statistic": label, "estimate": value })
        })
        .collect();
    let doc = serde_json::json!({
        "labels": labels,
        "estimates": mean,
        "chains": summaries,
    });
    match serde_json::to_string_pretty(&doc) {
        Ok(text) => println!("{}", text),
        Err(e) => {
            eprintln!("Error serializing summary: {}", e);
            process::exit(1);
        }
    }
}

fn run_simulate(path: &PathBuf) -> Result<(), FrontendError> {
    let config = Config::from_file(path)?;
    config.validate(RunMode::Simulation)?;
    let mut g = prepare_graph(&config)?;
    let resolved = resolve_model(&config, g.attributes(), RunMode::Simulation)?;
    let theta = resolved.theta()?;
    let model = resolved.model;
    let labels: Vec<&str> = model.labels().collect();
    let settings = config.simulation_settings();
    let seed = base_seed(&config);
    info!(seed, samples = settings.sample_size, "simulation starting");

    let net_prefix = if config.output_simulated_networks {
        config.sim_net_file_prefix.as_deref()
    } else {
        None
    };
    let mut writer = SimulationWriter::create(config.stats_file.as_ref(), net_prefix, &labels)?;
    let mut sampler = Sampler::new(
        config.sampler_kind(),
        config.sampler_options(),
        model.len(),
    );
    let mut rng = chain_rng(seed, 0);
    let summary = simulate(
        &mut g,
        &model,
        &theta,
        &settings,
        &mut sampler,
        &mut rng,
        &mut writer,
    )?;
    writer.finish()?;

    println!(
        "Simulation finished: {} samples, acceptance rate {:.4}",
        settings.sample_size, summary.acceptance_rate
    );
    println!("\nMean sampled statistics:");
    for (label, value) in labels.iter().zip(summary.mean_stats.iter()) {
        println!("  {} = {:.4}", label, value);
    }
    Ok(())
}

fn run_check(path: &PathBuf) -> Result<(), FrontendError> {
    let config = Config::from_file(path)?;
    // Estimation configs name an observed network; everything else is
    // checked as a simulation setup.
    let mode = if config.arclist_file.is_some() {
        RunMode::Estimation
    } else {
        RunMode::Simulation
    };
    config.validate(mode)?;
    let g = prepare_graph(&config)?;
    let resolved = resolve_model(&config, g.attributes(), mode)?;

    println!("✓ Configuration is valid ({:?} mode)", mode);
    println!(
        "\nNetwork: {} nodes, {} arcs, density {:.6}",
        g.num_nodes(),
        g.num_arcs(),
        g.density()
    );
    if let Some(sb) = g.snowball() {
        println!(
            "Snowball zones: {} waves, {} inner nodes, {} inner arcs",
            sb.max_zone() + 1,
            sb.inner_nodes().len(),
            sb.num_inner_arcs()
        );
    }
    println!(
        "Sampler: {:?}, two-path index: {}",
        config.sampler_kind(),
        ergonet_frontend::backend_name(config.two_path_index)
    );
    println!("\nStatistics ({}):", resolved.model.len());
    for label in resolved.model.labels() {
        println!("  - {}", label);
    }
    Ok(())
}
