//! Shared market and trade types

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trade direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl std::fmt::Display for TradeSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TradeSide::Buy => write!(f, "BUY"),
            TradeSide::Sell => write!(f, "SELL"),
        }
    }
}

/// One day of OHLCV data for a symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Day-over-day change in percent
    pub change_pct: Decimal,
}

/// A tradable instrument in the universe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockInfo {
    pub symbol: String,
    pub name: String,
    pub industry: String,
}

/// Universe entry with the day's bar attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub info: StockInfo,
    pub bar: DailyBar,
}

impl Quote {
    pub fn symbol(&self) -> &str {
        &self.info.symbol
    }

    pub fn close(&self) -> Decimal {
        self.bar.close
    }
}
