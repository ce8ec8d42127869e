// Core modules
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod indicators;
pub mod market;
pub mod models;
pub mod orders;
pub mod persistence;
pub mod signals;
pub mod trailing;

// Re-export commonly used types
pub use config::Config;
pub use error::BotError;
pub use models::*;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
