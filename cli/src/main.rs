//! `correlate`: run commands and services under a correlation ID.
//!
//! Commands:
//! - `show` - Print the correlation ID bound to this invocation
//! - `exec` - Run a program with the ID exported to its environment
//! - `serve` - Serve `GET /`, echoing each request's correlation ID
//!
//! Configuration comes from `CORRELATION_*` environment variables. Log lines
//! are written to stderr as JSON, enriched with the correlation ID.

use anyhow::Result;
use clap::{Parser, Subcommand};
use correlate_core::{CorrelationConfig, CorrelationContext, storage};
use std::future::Future;
use std::net::SocketAddr;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod commands;

/// Run commands and services under a correlation ID
#[derive(Debug, Parser)]
#[command(name = "correlate")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Correlation ID propagation for commands and services", long_about = None)]
struct Cli {
    /// Correlation ID for this invocation (validated; generated when absent or invalid)
    #[arg(long, global = true)]
    correlation_id: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the correlation ID bound to this invocation
    Show,

    /// Run a program with the correlation ID exported to its environment
    Exec {
        /// Program to run
        program: String,

        /// Arguments passed to the program
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Serve HTTP, binding a correlation ID to every request
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: SocketAddr,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let context = CorrelationContext::from_config(CorrelationConfig::from_env())?;
    init_tracing(&context);
    correlate_core::metrics::describe_metrics();

    let code = run(cli, &context).await?;
    Ok(ExitCode::from(code))
}

fn init_tracing(context: &CorrelationContext) {
    let json = context.log_layer(std::io::stderr);
    let plain = json
        .is_none()
        .then(|| fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(json)
        .with(plain)
        .init();
}

async fn run(cli: Cli, context: &CorrelationContext) -> Result<u8> {
    let option = cli.correlation_id;

    match cli.command {
        Commands::Show => in_command(context, option, async { commands::show(context) }).await,
        Commands::Exec { program, args } => {
            in_command(context, option, commands::exec(context, &program, &args)).await
        }
        Commands::Serve { addr } => commands::serve(context, addr).await,
    }
}

/// Run a command inside the CLI edge, or in a bare scope when CLI
/// integration is disabled.
async fn in_command<Fut>(context: &CorrelationContext, option: Option<String>, command: Fut) -> Result<u8>
where
    Fut: Future<Output = Result<u8>>,
{
    match context.console() {
        Some(console) => {
            let input = console.capture_input(option);
            console.run_async(&input, command).await
        }
        None => storage::scope(command).await,
    }
}
