//! # ESG Server
//!
//! Backend for an ESG management platform, built with Rust, Axum and Tokio.
//!
//! ## Features
//! - AI chat assistant that answers with the company's own ESG data
//! - Mailing lists, CSV contact import and email campaigns over SMTP
//! - Integrated ESG scoring report
//! - JWT authentication via Bearer header or `access_token` cookie
//!
//! ## Architecture
//! The server is organized into modules:
//! - `server`: Router and startup
//! - `config`: Environment variable configuration
//! - `assistant`: Intent routing, context loading and the chat completion client
//! - `mailing`: Mailing lists, CSV import and campaign delivery
//! - `scoring` / `reports`: ESG indicators and the integrated report
//! - `database`: Postgres pool, migrations and queries
//! - `routes`: HTTP route handlers organized by functionality
//!
//! ## Environment Setup
//! Required: `DATABASE_URL`, `JWT_SECRET`, `OPENAI_API_KEY`.
//! SMTP is enabled when `SMTP_HOST` and `SMTP_FROM_EMAIL` are set.
//!
//! ## Health Check
//! ```bash
//! curl http://localhost:3000/health
//! ```

mod assistant;
mod auth;
mod config;
mod database;
mod error;
mod mailing;
mod reports;
mod routes;
mod scoring;
mod server;

#[cfg(test)]
mod testing;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    // RUST_LOG overrides the default level
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .compact(),
        )
        .init();

    tracing::info!("🏁 Starting ESG Server...");
    tracing::info!("📦 Package: {} v{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    tracing::info!("🏗️  Build profile: {}", if cfg!(debug_assertions) { "debug" } else { "release" });

    if let Err(e) = server::start().await {
        tracing::error!("❌ Server failed: {:#}", e);
        std::process::exit(1);
    }
}
