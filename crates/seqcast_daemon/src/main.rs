pub mod api;
pub mod config;
pub mod console;

use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use seqcast_core::{extract_symbols, Session};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[derive(Parser)]
#[command(name = "seqcast")]
#[command(about = "Online ensemble predictor for A/B symbol streams")]
struct Cli {
    /// Path to a TOML config file (defaults to <config_dir>/seqcast/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API
    Serve {
        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
        /// Override the configured bind address
        #[arg(long)]
        host: Option<String>,
    },
    /// Train on a sequence and predict interactively from stdin
    Interactive {
        /// Training sequence of 'A'/'B'
        #[arg(long)]
        sequence: Option<String>,
        /// Read the training sequence from a text file (A/B extracted, reversed)
        #[arg(long, conflicts_with = "sequence")]
        file: Option<PathBuf>,
    },
    /// Print the A/B symbols of a text file (or stdin), most recent first
    Extract {
        input: Option<PathBuf>,
    },
}

fn init_logging() {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_env("SEQCAST_LOG").unwrap_or_else(|_| "info".into()))
        .with_writer(io::stderr)
        .init();
}

fn read_input(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

fn serve(config: Config, port: Option<u16>, host: Option<String>) -> anyhow::Result<()> {
    let mut api = config.api;
    if let Some(port) = port {
        api.port = port;
    }
    if let Some(host) = host {
        api.host = host;
    }
    let session = Session::new(config.predictor);

    let rt = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    rt.block_on(api::run_api_server(&api, session))
}

fn interactive(config: Config, sequence: Option<String>, file: Option<PathBuf>) -> anyhow::Result<()> {
    let sequence = match (sequence, file) {
        (Some(sequence), _) => sequence,
        (None, Some(path)) => extract_symbols(&read_input(Some(&path))?),
        (None, None) => anyhow::bail!("a training sequence is required (--sequence or --file)"),
    };

    let mut session = Session::new(config.predictor);
    let summary = session.train(&sequence).context("training failed")?;
    info!(
        length = summary.length,
        patterns = summary.patterns,
        classifier_fitted = summary.classifier_fitted,
        "interactive session ready"
    );

    let stdout = io::stdout();
    let color = stdout.is_terminal();
    console::run_interactive(&mut session, io::stdin().lock(), stdout.lock(), color)?;
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Commands::Serve { port, host } => serve(config, port, host),
        Commands::Interactive { sequence, file } => interactive(config, sequence, file),
        Commands::Extract { input } => {
            println!("{}", extract_symbols(&read_input(input.as_ref())?));
            Ok(())
        }
    }
}

fn main() {
    init_logging();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        error!(error = %format!("{e:#}"), "fatal error");
        std::process::exit(1);
    }
}
