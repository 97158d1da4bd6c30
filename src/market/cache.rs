//! Bar cache
//!
//! Wraps any [`PriceSource`] with an in-memory (symbol, date) cache so that
//! repeated per-agent lookups within a trading day hit the vendor once.
//! Negative results are cached too: a symbol with no bar that day stays
//! absent for every agent.

use super::PriceSource;
use crate::error::Result;
use crate::types::{DailyBar, StockInfo};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

pub struct CachedSource {
    inner: Arc<dyn PriceSource>,
    bars: RwLock<HashMap<(String, NaiveDate), Option<DailyBar>>>,
}

impl CachedSource {
    pub fn new(inner: Arc<dyn PriceSource>) -> Self {
        Self {
            inner,
            bars: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.bars.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.read().is_empty()
    }
}

#[async_trait]
impl PriceSource for CachedSource {
    async fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
        let key = (symbol.to_string(), date);
        if let Some(cached) = self.bars.read().get(&key) {
            debug!(%symbol, %date, "bar cache hit");
            return Ok(cached.clone());
        }

        let fetched = self.inner.daily_bar(symbol, date).await?;
        self.bars.write().insert(key, fetched.clone());
        Ok(fetched)
    }

    async fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        self.inner.trading_dates(start, end).await
    }

    async fn universe(&self, limit: usize) -> Result<Vec<StockInfo>> {
        self.inner.universe(limit).await
    }
}
