//! Market data access
//!
//! [`PriceSource`] is the narrow contract to the market-data vendor;
//! [`GatedMarketView`] is the only handle a decision-maker ever receives,
//! and it refuses to serve data beyond the simulation clock's cutoff.

pub mod cache;
pub mod fixture;
pub mod tushare;

pub use cache::CachedSource;
pub use fixture::FixtureSource;
pub use tushare::TushareClient;

use crate::error::{ArenaError, Result};
use crate::types::{DailyBar, StockInfo};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Contract to the market-data vendor.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// OHLCV for a symbol on a calendar date; `None` when unavailable.
    async fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>>;

    /// Ordered open trading dates within `[start, end]`.
    async fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>>;

    /// The tradable universe, largest names first.
    async fn universe(&self, limit: usize) -> Result<Vec<StockInfo>>;
}

/// Time-gated view over a shared price source.
///
/// Every lookup is checked against the cutoff date before it reaches the
/// vendor; a request beyond the cutoff is a look-ahead leak and is
/// rejected without touching the source.
#[derive(Clone)]
pub struct GatedMarketView {
    source: Arc<dyn PriceSource>,
    cutoff: NaiveDate,
}

impl GatedMarketView {
    pub fn new(source: Arc<dyn PriceSource>, cutoff: NaiveDate) -> Self {
        Self { source, cutoff }
    }

    /// Latest date this view will serve.
    pub fn cutoff(&self) -> NaiveDate {
        self.cutoff
    }

    pub async fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
        if date > self.cutoff {
            return Err(ArenaError::LookAhead {
                requested: date,
                cutoff: self.cutoff,
            });
        }
        self.source.daily_bar(symbol, date).await
    }

    /// Close price shortcut; `None` when the symbol has no bar that day.
    pub async fn close(&self, symbol: &str, date: NaiveDate) -> Result<Option<Decimal>> {
        Ok(self.daily_bar(symbol, date).await?.map(|b| b.close))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Days;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn bar(symbol: &str, date: NaiveDate, close: Decimal) -> DailyBar {
        DailyBar {
            symbol: symbol.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1000),
            change_pct: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn gate_serves_current_and_past_dates() {
        let cutoff = date("2025-06-05");
        let mut source = MockPriceSource::new();
        source
            .expect_daily_bar()
            .returning(|symbol, date| Ok(Some(bar(symbol, date, dec!(10)))));

        let view = GatedMarketView::new(Arc::new(source), cutoff);
        assert!(view.daily_bar("AAA", cutoff).await.unwrap().is_some());
        assert!(view
            .daily_bar("AAA", date("2025-06-02"))
            .await
            .unwrap()
            .is_some());
        assert_eq!(view.close("AAA", cutoff).await.unwrap(), Some(dec!(10)));
    }

    #[tokio::test]
    async fn gate_rejects_future_dates_without_touching_the_source() {
        let cutoff = date("2025-06-05");
        let mut source = MockPriceSource::new();
        // Any call through to the vendor would be a leak.
        source.expect_daily_bar().never();

        let view = GatedMarketView::new(Arc::new(source), cutoff);
        let err = view
            .daily_bar("AAA", date("2025-06-06"))
            .await
            .unwrap_err();
        assert!(matches!(err, ArenaError::LookAhead { .. }));
    }

    #[tokio::test]
    async fn gate_sweep_finds_zero_leaks() {
        let mut rng = StdRng::seed_from_u64(7);
        let base = date("2024-01-01");
        for _ in 0..500 {
            let cutoff = base + Days::new(rng.random_range(0..500));
            let future = cutoff + Days::new(rng.random_range(1..365));
            let view = GatedMarketView::new(Arc::new(MockPriceSource::new()), cutoff);
            let result = view.daily_bar("AAA", future).await;
            assert!(
                matches!(result, Err(ArenaError::LookAhead { .. })),
                "leak at cutoff {cutoff}, future {future}"
            );
        }
    }
}
