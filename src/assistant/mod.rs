//! # Assistant Module
//!
//! ESG chat assistant: keyword intent routing, context loading, canned market
//! intelligence and the chat completion client.

pub mod ai_client;
pub mod context;
pub mod intent;
pub mod market;

pub use ai_client::{ChatModel, OpenAiClient};
pub use context::ContextResolver;
pub use market::{MarketIntelligence, StaticMarketIntel};
