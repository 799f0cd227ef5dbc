//! # inquest
//!
//! Command-line tool for inspecting what an investigation run would use:
//! the validated settings, the step budget and cost estimates.

#![deny(unsafe_code)]

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquest_core::Provider;
use inquest_core::logging::{init_json_subscriber, init_subscriber, level_for};
use inquest_llm::{estimate_cost_breakdown, format_cost, format_tokens, resolve_model};
use inquest_runtime::{Budget, compute_budget};
use inquest_settings::{RunConfig, load_settings_from_path, settings_path};
use tracing::debug;

/// Inspect Inquest settings, budgets and costs.
#[derive(Parser, Debug)]
#[command(name = "inquest", version, about)]
struct Cli {
    /// Settings file (defaults to `~/.inquest/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the validated run configuration.
    Config,
    /// Compute the recursion limit for a run.
    Budget {
        /// Active workers.
        #[arg(long, default_value_t = 3)]
        workers: u32,
    },
    /// Estimate the cost of a model call.
    Cost {
        /// Prompt tokens.
        #[arg(long)]
        input: u64,
        /// Completion tokens.
        #[arg(long, default_value_t = 0)]
        output: u64,
        /// Provider (defaults to the configured one).
        #[arg(long)]
        provider: Option<String>,
        /// Model (defaults to the configured or provider default).
        #[arg(long)]
        model: Option<String>,
    },
}

fn load_config(path: Option<PathBuf>) -> Result<RunConfig> {
    let path = path.unwrap_or_else(settings_path);
    let settings = load_settings_from_path(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    settings.validate().context("invalid settings")
}

fn print_budget(budget: &Budget, workers: u32, config: &RunConfig) {
    println!("workers:            {workers}");
    println!("worker iterations:  {}", config.max_worker_iterations());
    println!("tool call cap:      {}", config.max_tool_calls());
    println!("computed limit:     {}", budget.computed);
    if budget.overridden {
        println!("recursion limit:    {} (override)", budget.recursion_limit);
    } else {
        println!("recursion limit:    {}", budget.recursion_limit);
    }
    println!("per-worker limit:   {}", budget.per_worker_limit);
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.settings)?;

    let level = level_for(config.verbose_logging());
    if cli.json_logs {
        init_json_subscriber(level);
    } else {
        init_subscriber(level);
    }
    debug!(provider = %config.provider(), "settings loaded");

    match cli.command {
        Command::Config => {
            let json = serde_json::to_string_pretty(&config).context("failed to render config")?;
            println!("{json}");
        }
        Command::Budget { workers } => {
            let budget = compute_budget(
                workers,
                config.max_worker_iterations(),
                config.max_tool_calls(),
                config.recursion_limit(),
            )?;
            print_budget(&budget, workers, &config);
        }
        Command::Cost {
            input,
            output,
            provider,
            model,
        } => {
            // The configured model only applies to the configured provider.
            let (provider, configured_model) = match provider {
                Some(name) => (name.parse::<Provider>()?, None),
                None => (config.provider(), config.model_override()),
            };
            let resolved = resolve_model(provider, model.as_deref().or(configured_model));
            let cost = estimate_cost_breakdown(input, output, &resolved.model, resolved.provider);
            println!("model:   {resolved}");
            println!("tokens:  {} in, {} out", format_tokens(input), format_tokens(output));
            println!("input:   {}", format_cost(cost.input));
            println!("output:  {}", format_cost(cost.output));
            println!("total:   {} (${})", format_cost(cost.total), cost.total);
        }
    }
    Ok(())
}
