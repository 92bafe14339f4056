//! ctxpack CLI — the main entry point.
//!
//! Commands:
//! - `gather`     — Assemble a context package for a task
//! - `collectors` — List the built-in collectors
//! - `config`     — Show, validate or locate the configuration
//! - `onboard`    — Write a default config file

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ctxpack_core::fragment::FragmentKind;
use ctxpack_core::request::{Scope, TaskKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "ctxpack",
    about = "ctxpack — task-shaped, budget-bounded context assembly",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Use this config file instead of ~/.ctxpack/config.toml
    #[arg(long, global = true, env = "CTXPACK_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Assemble context for a task and print it
    Gather {
        /// Free-text task description
        #[arg(short, long)]
        task: String,

        /// Task kind (bug-fixing, code-generation, refactoring, code-review,
        /// documentation, testing, general)
        #[arg(short, long, default_value = "general")]
        kind: TaskKind,

        /// Starting scope (local, module, project)
        #[arg(short, long, default_value = "local")]
        scope: Scope,

        /// Token budget (defaults to engine.default_token_budget)
        #[arg(short, long)]
        budget: Option<usize>,

        /// Collector parameter, repeatable (e.g. --param path=src/lib.rs)
        #[arg(short, long = "param", value_parser = commands::gather::parse_param)]
        params: Vec<(String, String)>,

        /// Focus tag, repeatable
        #[arg(long = "focus")]
        focus: Vec<String>,

        /// Fragment kind to place first, repeatable
        #[arg(long = "prefer")]
        prefer: Vec<FragmentKind>,

        /// Render with this template file ({task}, {sections})
        #[arg(long)]
        template: Option<PathBuf>,

        /// Print quality metrics as JSON on stderr
        #[arg(long)]
        metrics: bool,
    },

    /// List the built-in collectors
    Collectors,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Write a default configuration file
    Onboard,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Check the configuration for errors
    Validate,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_json);

    let config_path = cli.config;
    match cli.command {
        Commands::Gather {
            task,
            kind,
            scope,
            budget,
            params,
            focus,
            prefer,
            template,
            metrics,
        } => {
            let args = commands::gather::GatherArgs {
                task,
                kind,
                scope,
                budget,
                params,
                focus,
                prefer,
                template,
                metrics,
            };
            commands::gather::run(config_path.as_deref(), args).await?
        }
        Commands::Collectors => commands::collectors::run().await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path.as_deref()).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path.as_deref()).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path.as_deref()).await?,
        },
        Commands::Onboard => commands::onboard::run(config_path.as_deref()).await?,
    }

    Ok(())
}

/// Filter used when `RUST_LOG` is unset.
fn default_filter(verbose: bool) -> &'static str {
    if verbose { "debug" } else { "info" }
}

/// Logs go to stderr so stdout carries only the package.
fn init_tracing(verbose: bool, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter(verbose)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
