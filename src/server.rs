//! # Server Module
//!
//! HTTP server setup and route configuration for the ESG server.

use anyhow::Context;
use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::assistant::{ChatModel, MarketIntelligence, OpenAiClient, StaticMarketIntel};
use crate::auth::{jwt::JwtService, middleware::AuthMiddleware};
use crate::config::Config;
use crate::database::{DatabaseConfig, DatabaseConnection, EsgDataSource, MailingStore};
use crate::mailing::{DisabledMailer, Mailer, SmtpMailer};
use crate::routes::{chat, health, mailing, reports};

/// Application state shared across all route handlers
#[derive(Clone)]
pub struct AppState {
    pub jwt_service: Arc<JwtService>,
    pub data: Arc<dyn EsgDataSource>,
    pub mailing: Arc<dyn MailingStore>,
    pub llm: Arc<dyn ChatModel>,
    pub mailer: Arc<dyn Mailer>,
    pub market: Arc<dyn MarketIntelligence>,
    /// Base URL of the public web app, used for form links in campaign emails
    pub public_app_url: Arc<str>,
}

/// Browser clients call from any origin and send the anon key headers along with the token.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
        ])
}

/// Build the application router.
///
/// `/ping` and `/health` are public; everything under `/api/v1` requires a valid token.
pub fn create_router(state: AppState) -> Router {
    let protected_routes = Router::new()
        .route("/api/v1/ai-chat", post(chat::ai_chat))
        .route("/api/v1/mailing", post(mailing::mailing_action))
        .route("/api/v1/reports/integrated", get(reports::integrated_report))
        .layer(middleware::from_fn_with_state(
            state.jwt_service.clone(),
            AuthMiddleware::validate_token,
        ));

    Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health))
        .merge(protected_routes)
        .layer(ServiceBuilder::new().layer(cors_layer()))
        .with_state(state)
}

/// Starts the ESG HTTP server.
///
/// Loads configuration, connects to Postgres and applies migrations before
/// binding the listener. Runs until the process is terminated.
pub async fn start() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let db_config = DatabaseConfig::from_url(&config.database_url, config.database_max_connections)?;
    let db = Arc::new(DatabaseConnection::new(db_config).await?);
    db.migrate().await?;

    let llm = OpenAiClient::new(&config.llm).context("Failed to build LLM client")?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(smtp) => Arc::new(SmtpMailer::new(smtp).context("Invalid SMTP configuration")?),
        None => {
            tracing::warn!("📭 SMTP not configured, campaign sending is disabled");
            Arc::new(DisabledMailer)
        }
    };

    let app_state = AppState {
        jwt_service: Arc::new(JwtService::new(&config.auth.jwt_secret, &config.auth.issuer, &config.auth.audience)),
        data: db.clone(),
        mailing: db,
        llm: Arc::new(llm),
        mailer,
        market: Arc::new(StaticMarketIntel),
        public_app_url: Arc::from(config.public_app_url.as_str()),
    };

    let app = create_router(app_state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid SERVER_HOST/SERVER_PORT")?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {addr} - port may already be in use"))?;

    tracing::info!("🚀 ESG Server starting...");
    tracing::info!("📡 Listening on http://{}", addr);
    tracing::info!("🏥 Health check available at http://{}/health", addr);
    tracing::info!("🤖 AI chat available at http://{}/api/v1/ai-chat", addr);
    tracing::info!("✉️  Mailing available at http://{}/api/v1/mailing", addr);

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
