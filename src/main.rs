//! MentoraAI · AI Tutor Backend
//!
//! - Axum HTTP API (Q&A chat, quiz mode, flashcard mode)
//! - Optional Anthropic integration (via resolved secrets)
//! - Static SPA fallback (./static/index.html)
//!
//! Important env variables:
//!   PORT                  : u16 (default 3000)
//!   ANTHROPIC_API_KEY     : enables model integration if present (lowest-precedence source)
//!   ANTHROPIC_BASE_URL    : default "https://api.anthropic.com"
//!   ANTHROPIC_MODEL       : default "claude-3-haiku-20240307"
//!   STRIPE_SECRET_KEY     : enables checkout-session creation if present
//!   STRIPE_WEBHOOK_SECRET : shared secret expected on webhook calls
//!   STRIPE_BASE_URL       : default "https://api.stripe.com"
//!   TUTOR_CONFIG_PATH     : path to TOML config (prompts + limits + checkout)
//!   TUTOR_SECRETS_PATH    : path to TOML secrets file (highest-precedence source)
//!   LOG_LEVEL             : tracing filter, e.g. "debug" or full directives
//!   LOG_FORMAT            : "pretty" (default) or "json"

mod telemetry;
mod util;
mod domain;
mod config;
mod parser;
mod store;
mod auth;
mod state;
mod protocol;
mod logic;
mod anthropic;
mod billing;
mod routes;

use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tracing::{info, instrument};

use crate::routes::build_router;
use crate::state::AppState;

#[instrument(level = "info", skip_all)]
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
  telemetry::init_tracing();

  // Build shared application state (user store, sessions, model + checkout clients).
  let state = Arc::new(AppState::new());

  // Build the HTTP router with routes, CORS and tracing layers.
  let app = build_router(state.clone());

  // Read port from env or default to 3000.
  let addr: SocketAddr = std::env::var("PORT")
    .ok()
    .and_then(|p| p.parse::<u16>().ok())
    .map(|port| SocketAddr::from(([0, 0, 0, 0], port)))
    .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], 3000)));

  let listener = TcpListener::bind(addr).await?;
  info!(target: "tutor_backend", %addr, "HTTP server listening");
  axum::serve(listener, app).await?;
  Ok(())
}
