//! In-memory price source
//!
//! Backs tests and offline runs with a fixed symbol/date → bar table.

use super::PriceSource;
use crate::error::Result;
use crate::types::{DailyBar, StockInfo};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default)]
pub struct FixtureSource {
    bars: BTreeMap<String, BTreeMap<NaiveDate, DailyBar>>,
    universe: Vec<StockInfo>,
}

impl FixtureSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stock(&mut self, info: StockInfo) -> &mut Self {
        self.universe.push(info);
        self
    }

    pub fn add_bar(&mut self, bar: DailyBar) -> &mut Self {
        self.bars
            .entry(bar.symbol.clone())
            .or_default()
            .insert(bar.date, bar);
        self
    }
}

#[async_trait]
impl PriceSource for FixtureSource {
    async fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
        Ok(self
            .bars
            .get(symbol)
            .and_then(|by_date| by_date.get(&date))
            .cloned())
    }

    async fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let dates: BTreeSet<NaiveDate> = self
            .bars
            .values()
            .flat_map(|by_date| by_date.keys().copied())
            .filter(|d| *d >= start && *d <= end)
            .collect();
        Ok(dates.into_iter().collect())
    }

    async fn universe(&self, limit: usize) -> Result<Vec<StockInfo>> {
        Ok(self.universe.iter().take(limit).cloned().collect())
    }
}
