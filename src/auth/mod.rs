//! # Authentication Module
//!
//! Validates access tokens issued by the platform's auth provider and exposes
//! the authenticated user to handlers through request extensions.

pub mod jwt;
pub mod middleware;
pub mod models;
