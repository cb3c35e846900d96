//! declap - Declarative command-line parameter parsing.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use declap::{render_errors, render_json, render_shell, Config, Engine, ErrorPolicy, Parsed};
use std::collections::HashMap;
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

/// Environment variable holding the log filter.
const LOG_ENV: &str = "DECLAP_LOG";

/// Declarative command-line parameter parsing.
#[derive(Parser, Debug)]
#[command(name = "declap", version, about, disable_help_subcommand = true)]
struct Cli {
    /// Log filter, e.g. "debug" (overrides DECLAP_LOG)
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse arguments against a declaration and print the result
    Parse {
        /// JSON parameter declaration
        #[arg(long)]
        config: String,

        /// Collect every error instead of stopping at the first
        #[arg(long)]
        collect: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Shell export prefix (overrides config)
        #[arg(long)]
        prefix: Option<String>,

        /// Arguments to parse
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Check a declaration without parsing anything
    Check {
        /// JSON parameter declaration
        #[arg(long)]
        config: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Json,
    Shell,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Commands::Parse {
            config,
            collect,
            format,
            prefix,
            args,
        } => {
            let cfg = Config::from_json(&config).context("failed to parse config JSON")?;
            let parameters = cfg.parameters().context("invalid declaration")?;
            let registry = cfg.registry();
            let mut settings = cfg.settings();
            if collect {
                settings.policy = ErrorPolicy::CollectAll;
            }
            debug!(parameters = parameters.len(), policy = ?settings.policy, "declaration loaded");

            let env: HashMap<String, String> = std::env::vars().collect();
            let engine = Engine::new(&parameters, &registry).with_settings(settings);
            let effective_prefix = prefix.as_deref().unwrap_or_else(|| cfg.effective_prefix());

            match (engine.parse(&args, &env), format) {
                (Ok(parsed), Format::Json) => {
                    println!("{}", render_json(&parsed).context("failed to render result")?);
                    Ok(exit_code(&parsed))
                }
                (Ok(parsed), Format::Shell) => {
                    print!("{}", render_shell(&parsed, effective_prefix));
                    Ok(exit_code(&parsed))
                }
                (Err(err), Format::Shell) => {
                    print!("{}", render_errors(&[err.message()]));
                    Ok(ExitCode::FAILURE)
                }
                (Err(err), Format::Json) => {
                    let kind = err.kind();
                    Err(anyhow::Error::new(err))
                        .context(format!("failed to parse arguments ({})", kind))
                }
            }
        }
        Commands::Check { config } => {
            let cfg = Config::from_json(&config).context("failed to parse config JSON")?;
            let parameters = cfg.parameters().context("invalid declaration")?;
            info!(parameters = parameters.len(), "declaration is valid");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn exit_code(parsed: &Parsed) -> ExitCode {
    if parsed.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
