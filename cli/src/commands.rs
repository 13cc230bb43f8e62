//! Subcommand implementations.
//!
//! `show` and `exec` run inside the CLI edge, so their logs and the child
//! process share one correlation ID. `serve` binds a fresh ID per request.

use anyhow::{Context as _, Result};
use axum::{Router, routing::get};
use correlate_core::CorrelationContext;
use correlate_web::{CorrelationId, correlation_id_layer};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::process::Command;

/// Print the correlation ID bound to this invocation.
pub fn show(context: &CorrelationContext) -> Result<u8> {
    if let Some(id) = context.storage().get() {
        tracing::info!(%id, "Resolved correlation ID");
        println!("{id}");
    } else {
        tracing::warn!("CLI integration is disabled, no correlation ID bound");
    }
    Ok(0)
}

/// Run `program`, exporting the bound ID in the configured environment variable.
pub async fn exec(context: &CorrelationContext, program: &str, args: &[String]) -> Result<u8> {
    let mut command = Command::new(program);
    command.args(args);

    if let Some(id) = context.storage().get() {
        command.env(&context.config().cli.env_var, id);
    }

    tracing::info!(program, "Running child process");

    let status = command
        .status()
        .await
        .with_context(|| format!("failed to run `{program}`"))?;

    tracing::info!(%status, "Child process exited");

    Ok(exit_code(status.code()))
}

/// Map a child's exit status to ours. Signals and out-of-range codes become 1.
pub fn exit_code(code: Option<i32>) -> u8 {
    code.and_then(|code| u8::try_from(code).ok()).unwrap_or(1)
}

/// Router answering `GET /` with the request's correlation ID.
pub fn router(context: &CorrelationContext) -> Router {
    Router::new()
        .route("/", get(current_id))
        .layer(correlation_id_layer(context))
}

async fn current_id(correlation_id: CorrelationId) -> String {
    tracing::info!("Serving correlation ID");
    correlation_id.0.unwrap_or_default()
}

/// Serve [`router`] on `addr` until the process is stopped.
pub async fn serve(context: &CorrelationContext, addr: SocketAddr) -> Result<u8> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(%addr, "Listening");

    axum::serve(listener, router(context))
        .await
        .context("server error")?;

    Ok(0)
}
