//! gocell CLI - run Go notebook cells from the terminal.

mod colors;
mod config;
mod repl;
mod run;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gocell")]
#[command(about = "Cell-based execution environment for Go")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Session configuration file (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

/// Overrides of the session configuration.
#[derive(Args, Debug, Default)]
struct SessionArgs {
    /// Module and binary name
    #[arg(short, long)]
    package: Option<String>,

    /// Working directory (default: a fresh temporary directory)
    #[arg(long)]
    workdir: Option<PathBuf>,

    /// Do not fetch missing dependencies
    #[arg(long)]
    no_autoget: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run cell files in order, one cell per file
    Run {
        /// Cell files
        #[arg(required = true)]
        files: Vec<PathBuf>,

        #[command(flatten)]
        session: SessionArgs,

        /// Arguments passed to the program
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Read cells from stdin, each terminated by a line containing only `;;`
    Repl {
        #[command(flatten)]
        session: SessionArgs,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format gocell-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(gocell_err) = err.downcast_ref::<gocell_core::Error>() {
            anyhow::anyhow!("{}", gocell_err.with_hint())
        } else {
            err
        }
    };

    let base = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { files, session, args } => {
            let mut config = config::apply(base, &session);
            if !args.is_empty() {
                config.args = args;
            }
            run::execute(config, &files).map_err(format_error)?;
        }

        Commands::Repl { session } => {
            repl::execute(config::apply(base, &session)).map_err(format_error)?;
        }
    }

    Ok(())
}
