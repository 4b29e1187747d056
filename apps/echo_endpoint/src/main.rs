//! Development inference endpoint that echoes the latest user turn back.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clap::Parser;
use shared::{
    domain::Role,
    error::ErrorBody,
    protocol::{
        ChatReplyBody, ChatRequestBody, CompletionReplyBody, CompletionRequestBody, WireMessage,
    },
};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "echo_endpoint", about = "Local stand-in for an Ollama-style inference endpoint")]
struct Args {
    #[arg(long, default_value = "127.0.0.1:11434")]
    bind: SocketAddr,
    /// Answer every request with this status code instead of a reply.
    #[arg(long)]
    fail_status: Option<u16>,
    /// Hold each reply for this many milliseconds.
    #[arg(long, default_value_t = 0)]
    delay_ms: u64,
}

struct EchoState {
    fail_status: Option<StatusCode>,
    delay: Duration,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let args = Args::parse();
    let fail_status = args
        .fail_status
        .map(StatusCode::from_u16)
        .transpose()
        .context("invalid --fail-status")?;
    let state = EchoState {
        fail_status,
        delay: Duration::from_millis(args.delay_ms),
    };
    let app = build_router(Arc::new(state));

    info!(addr = %args.bind, ?fail_status, delay_ms = args.delay_ms, "echo endpoint listening");
    let listener = tokio::net::TcpListener::bind(args.bind).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<EchoState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/chat", post(chat))
        .route("/api/generate", post(generate))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn hold(state: &EchoState) -> Option<Response> {
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    state.fail_status.map(|status| {
        warn!(status = status.as_u16(), "answering with simulated failure");
        (
            status,
            Json(ErrorBody::new(format!("simulated failure ({})", status.as_u16()))),
        )
            .into_response()
    })
}

async fn chat(State(state): State<Arc<EchoState>>, Json(req): Json<ChatRequestBody>) -> Response {
    if let Some(failure) = hold(&state).await {
        return failure;
    }

    let latest = req
        .messages
        .iter()
        .rev()
        .find(|message| message.role == Role::User)
        .map(|message| message.content.as_str())
        .unwrap_or_default();
    info!(model = %req.model, messages = req.messages.len(), "answered chat request");

    Json(ChatReplyBody {
        message: WireMessage {
            role: Role::Assistant,
            content: format!("echo: {latest}"),
        },
        done: true,
    })
    .into_response()
}

async fn generate(
    State(state): State<Arc<EchoState>>,
    Json(req): Json<CompletionRequestBody>,
) -> Response {
    if let Some(failure) = hold(&state).await {
        return failure;
    }

    info!(model = %req.model, prompt_len = req.prompt.len(), "answered completion request");
    Json(CompletionReplyBody {
        response: format!("echo: {}", prompt_tail(&req.prompt)),
        done: true,
    })
    .into_response()
}

/// Latest user line of a `role: content` transcript prompt.
fn prompt_tail(prompt: &str) -> &str {
    let body = prompt
        .trim_end()
        .strip_suffix("assistant:")
        .unwrap_or(prompt)
        .trim_end();
    match body.rsplit_once("user: ") {
        Some((_, tail)) => tail,
        None => body,
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
