//! # Database Module
//!
//! PostgreSQL integration using tokio-postgres with a deadpool connection pool.
//! Includes connection management, models, migrations and the Postgres side of
//! the data access traits.

pub mod connection;
pub mod migrations;
pub mod models;
pub mod queries;
pub mod source;

pub use connection::{DatabaseConfig, DatabaseConnection};
pub use source::{EsgDataSource, MailingStore};
