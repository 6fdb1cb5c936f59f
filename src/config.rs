//! Configuration module for environment variables and application settings

use std::env;
use std::str::FromStr;
use anyhow::{Result, anyhow};

#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string
    pub database_url: String,

    /// Maximum pooled connections
    pub database_max_connections: usize,

    /// Server configuration
    pub server: ServerConfig,

    /// Token validation settings
    pub auth: AuthConfig,

    /// Chat completion provider settings
    pub llm: LlmConfig,

    /// Outgoing mail settings, absent when SMTP is not configured
    pub smtp: Option<SmtpConfig>,

    /// Base URL of the public web app, used to build form links in campaigns
    pub public_app_url: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub api_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
}

/// Read an optional variable, falling back to `default` when unset or unparsable.
fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| anyhow!("DATABASE_URL environment variable is required"))?,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 16),

            server: ServerConfig {
                host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                // $PORT wins so the binary runs unchanged on PaaS hosts
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or_else(|| var_or("SERVER_PORT", 3000)),
            },

            auth: AuthConfig {
                jwt_secret: env::var("JWT_SECRET")
                    .map_err(|_| anyhow!("JWT_SECRET environment variable is required"))?,
                issuer: env::var("JWT_ISSUER").unwrap_or_else(|_| "esg-platform".to_string()),
                audience: env::var("JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string()),
            },

            llm: LlmConfig {
                api_key: env::var("OPENAI_API_KEY")
                    .map_err(|_| anyhow!("OPENAI_API_KEY environment variable is required"))?,
                api_url: env::var("OPENAI_API_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                max_tokens: var_or("OPENAI_MAX_TOKENS", 1000),
                temperature: var_or("OPENAI_TEMPERATURE", 0.7),
                timeout_secs: var_or("LLM_TIMEOUT_SECS", 30),
            },

            smtp: SmtpConfig::from_env(),

            public_app_url: env::var("PUBLIC_APP_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string())
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

impl SmtpConfig {
    /// SMTP is optional; only host and sender address are mandatory to enable it.
    fn from_env() -> Option<Self> {
        let host = env::var("SMTP_HOST").ok().filter(|h| !h.is_empty())?;
        let from_email = env::var("SMTP_FROM_EMAIL").ok().filter(|f| !f.is_empty())?;

        Some(Self {
            host,
            port: var_or("SMTP_PORT", 587),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_email,
            from_name: env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Plataforma ESG".to_string()),
        })
    }
}
