//! Configuration loading
//!
//! All knobs live in a TOML file (default `arena.toml`), with `ARENA_*`
//! environment variables layered on top. Secrets (API keys) usually come
//! from `.env` via dotenvy.

use crate::error::{ArenaError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Deserialize;

/// Top-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub sim: SimConfig,
    #[serde(default)]
    pub fees: FeeConfig,
    pub tushare: Option<TushareConfig>,
    pub llm: Option<LlmConfig>,
    #[serde(default)]
    pub agents: Vec<AgentConfig>,
}

impl Config {
    /// Load configuration from a TOML file plus `ARENA_*` env overrides
    pub fn load(path: &str) -> Result<Self> {
        let path = shellexpand::tilde(path).to_string();
        let cfg = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("ARENA")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| ArenaError::Config(e.to_string()))?;

        cfg.try_deserialize()
            .map_err(|e| ArenaError::Config(e.to_string()))
    }
}

/// Simulation parameters
#[derive(Debug, Clone, Deserialize)]
pub struct SimConfig {
    /// Starting cash per agent
    #[serde(default = "default_initial_cash")]
    pub initial_cash: Decimal,
    /// Number of most recent trading days to simulate
    #[serde(default = "default_trading_days")]
    pub trading_days: usize,
    /// Size of the tradable universe offered to agents
    #[serde(default = "default_universe_size")]
    pub universe_size: usize,
    /// Minimum tradable share increment
    #[serde(default = "default_lot_size")]
    pub lot_size: u32,
    /// Per-agent decision deadline; overruns degrade to hold
    #[serde(default = "default_decision_timeout_secs")]
    pub decision_timeout_secs: u64,
    /// Index symbol reported next to the agents
    #[serde(default = "default_benchmark_symbol")]
    pub benchmark_symbol: String,
    /// Directory for per-agent state checkpoints
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
    /// Directory for exported reports
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

fn default_initial_cash() -> Decimal {
    dec!(1_000_000)
}

fn default_trading_days() -> usize {
    10
}

fn default_universe_size() -> usize {
    50
}

fn default_lot_size() -> u32 {
    100
}

fn default_decision_timeout_secs() -> u64 {
    120
}

fn default_benchmark_symbol() -> String {
    "000300.SH".to_string()
}

fn default_state_dir() -> String {
    "data/agent_data".to_string()
}

fn default_output_dir() -> String {
    "data/reports".to_string()
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            initial_cash: default_initial_cash(),
            trading_days: default_trading_days(),
            universe_size: default_universe_size(),
            lot_size: default_lot_size(),
            decision_timeout_secs: default_decision_timeout_secs(),
            benchmark_symbol: default_benchmark_symbol(),
            state_dir: default_state_dir(),
            output_dir: default_output_dir(),
        }
    }
}

/// Commission and stamp-tax schedule
#[derive(Debug, Clone, Deserialize)]
pub struct FeeConfig {
    #[serde(default = "default_commission_rate")]
    pub commission_rate: Decimal,
    #[serde(default = "default_min_commission")]
    pub min_commission: Decimal,
    #[serde(default = "default_stamp_tax_rate")]
    pub stamp_tax_rate: Decimal,
}

fn default_commission_rate() -> Decimal {
    dec!(0.0003)
}

fn default_min_commission() -> Decimal {
    dec!(5)
}

fn default_stamp_tax_rate() -> Decimal {
    dec!(0.001)
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            commission_rate: default_commission_rate(),
            min_commission: default_min_commission(),
            stamp_tax_rate: default_stamp_tax_rate(),
        }
    }
}

/// Market-data vendor credentials
#[derive(Debug, Clone, Deserialize)]
pub struct TushareConfig {
    #[serde(default = "default_tushare_url")]
    pub api_url: String,
    #[serde(default)]
    pub token: String,
    /// Exchange calendar used for trading dates
    #[serde(default = "default_exchange")]
    pub exchange: String,
}

fn default_tushare_url() -> String {
    "http://api.tushare.pro".to_string()
}

fn default_exchange() -> String {
    "SSE".to_string()
}

/// LLM provider settings; vendor differences are configuration, not code
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    #[serde(default)]
    pub api_key: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> u32 {
    1000
}

/// One registered decision-maker
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum AgentConfig {
    /// LLM-backed agent; `model` overrides the global LLM default
    Llm {
        name: String,
        #[serde(default)]
        model: Option<String>,
    },
    /// Random baseline; seedable for reproducible runs
    Random {
        name: String,
        #[serde(default)]
        seed: Option<u64>,
    },
    /// Rule-based momentum agent
    Momentum {
        name: String,
        #[serde(default = "default_stop_loss_pct")]
        stop_loss_pct: Decimal,
    },
}

fn default_stop_loss_pct() -> Decimal {
    dec!(5)
}

impl AgentConfig {
    pub fn name(&self) -> &str {
        match self {
            AgentConfig::Llm { name, .. }
            | AgentConfig::Random { name, .. }
            | AgentConfig::Momentum { name, .. } => name,
        }
    }
}
