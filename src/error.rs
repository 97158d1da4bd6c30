//! Error types for the arena

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level error type for infrastructure and collaborator failures.
///
/// Expected trade rejections (insufficient cash, bad lot size, date gate)
/// are *not* represented here; see [`crate::engine::TradeError`].
#[derive(Error, Debug)]
pub enum ArenaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Look-ahead rejected: requested {requested}, cutoff {cutoff}")]
    LookAhead {
        requested: NaiveDate,
        cutoff: NaiveDate,
    },

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, ArenaError>;
