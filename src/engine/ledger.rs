//! Portfolio ledger
//!
//! Owns cash, open positions, the append-only trade log, and the daily
//! snapshot series. Pure bookkeeping: no dates policy, no I/O. Every
//! mutating operation is all-or-nothing; a rejected trade leaves the
//! ledger untouched.

use super::fees::FeeSchedule;
use crate::types::TradeSide;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

/// Expected, recoverable trade rejections.
///
/// These are outcomes, not faults: the decision loop logs them and moves
/// on. Infrastructure failures live in [`crate::error::ArenaError`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradeError {
    #[error("share count {shares} is not a positive multiple of the {lot_size}-share lot")]
    InvalidShares { shares: u32, lot_size: u32 },

    #[error("price {price} is not positive")]
    InvalidPrice { price: Decimal },

    #[error("insufficient cash: need {required}, have {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },

    #[error("no open position in {symbol}")]
    UnknownPosition { symbol: String },

    #[error("insufficient shares in {symbol}: holding {held}, requested {requested}")]
    InsufficientShares {
        symbol: String,
        held: u32,
        requested: u32,
    },

    #[error("trade dated {submitted} rejected; simulation clock is at {current:?}")]
    DateMismatch {
        submitted: NaiveDate,
        current: Option<NaiveDate>,
    },

    #[error("simulation clock not initialized")]
    ClockUninitialized,
}

/// An open holding in a single symbol.
///
/// Exists only while `shares > 0`; a fully liquidated position is removed
/// from the book, never kept as a zero entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub name: String,
    pub shares: u32,
    /// Weighted-average cost across all accumulated buy lots
    pub avg_cost: Decimal,
    /// Most recent mark (execution or close price)
    pub last_price: Decimal,
}

impl Position {
    pub fn market_value(&self) -> Decimal {
        self.last_price * Decimal::from(self.shares)
    }

    pub fn unrealized_pnl(&self) -> Decimal {
        (self.last_price - self.avg_cost) * Decimal::from(self.shares)
    }

    pub fn unrealized_pnl_pct(&self) -> Decimal {
        if self.avg_cost.is_zero() {
            return Decimal::ZERO;
        }
        (self.last_price - self.avg_cost) / self.avg_cost * dec!(100)
    }
}

/// One executed fill. Append-only; never mutated after recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    pub date: NaiveDate,
    pub side: TradeSide,
    pub symbol: String,
    pub name: String,
    pub price: Decimal,
    pub shares: u32,
    /// price * shares, pre-fee
    pub notional: Decimal,
    /// Commission plus stamp tax on sells
    pub fees: Decimal,
    pub rationale: String,
}

/// End-of-day equity record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySnapshot {
    pub date: NaiveDate,
    pub cash: Decimal,
    pub market_value: Decimal,
    pub total_assets: Decimal,
    /// Cumulative return versus initial capital, in percent
    pub return_pct: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ledger {
    initial_cash: Decimal,
    cash: Decimal,
    positions: BTreeMap<String, Position>,
    trades: Vec<TradeRecord>,
    snapshots: Vec<DailySnapshot>,
    fees: FeeSchedule,
    lot_size: u32,
}

impl Ledger {
    pub fn new(initial_cash: Decimal, fees: FeeSchedule, lot_size: u32) -> Self {
        Self {
            initial_cash,
            cash: initial_cash,
            positions: BTreeMap::new(),
            trades: Vec::new(),
            snapshots: Vec::new(),
            fees,
            lot_size,
        }
    }

    pub fn initial_cash(&self) -> Decimal {
        self.initial_cash
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn lot_size(&self) -> u32 {
        self.lot_size
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn positions(&self) -> &BTreeMap<String, Position> {
        &self.positions
    }

    pub fn position(&self, symbol: &str) -> Option<&Position> {
        self.positions.get(symbol)
    }

    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    pub fn snapshots(&self) -> &[DailySnapshot] {
        &self.snapshots
    }

    /// Sum of `shares * last_price` over the open book
    pub fn total_market_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    pub fn total_assets(&self) -> Decimal {
        self.cash + self.total_market_value()
    }

    /// Cumulative return versus initial capital, in percent
    pub fn return_pct(&self) -> Decimal {
        if self.initial_cash.is_zero() {
            return Decimal::ZERO;
        }
        (self.total_assets() - self.initial_cash) / self.initial_cash * dec!(100)
    }

    fn check_order(&self, price: Decimal, shares: u32) -> Result<(), TradeError> {
        if shares == 0 || shares % self.lot_size != 0 {
            return Err(TradeError::InvalidShares {
                shares,
                lot_size: self.lot_size,
            });
        }
        if price <= Decimal::ZERO {
            return Err(TradeError::InvalidPrice { price });
        }
        Ok(())
    }

    /// Buy `shares` of `symbol` at `price`, debiting notional plus commission.
    ///
    /// No partial fills: if cash cannot cover the full cost the ledger is
    /// left untouched. An existing position is merged at weighted-average
    /// cost; otherwise one is opened at the execution price.
    pub fn buy(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        name: &str,
        price: Decimal,
        shares: u32,
        rationale: &str,
    ) -> Result<(), TradeError> {
        self.check_order(price, shares)?;

        let notional = price * Decimal::from(shares);
        let fees = self.fees.commission(notional, false);
        let total_cost = notional + fees;
        if total_cost > self.cash {
            return Err(TradeError::InsufficientCash {
                required: total_cost,
                available: self.cash,
            });
        }

        self.cash -= total_cost;
        match self.positions.entry(symbol.to_string()) {
            Entry::Occupied(mut entry) => {
                let pos = entry.get_mut();
                let merged = pos.shares + shares;
                pos.avg_cost =
                    (pos.avg_cost * Decimal::from(pos.shares) + notional) / Decimal::from(merged);
                pos.shares = merged;
                pos.last_price = price;
            }
            Entry::Vacant(entry) => {
                entry.insert(Position {
                    symbol: symbol.to_string(),
                    name: name.to_string(),
                    shares,
                    avg_cost: price,
                    last_price: price,
                });
            }
        }

        self.trades.push(TradeRecord {
            id: Uuid::new_v4(),
            date,
            side: TradeSide::Buy,
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
            shares,
            notional,
            fees,
            rationale: rationale.to_string(),
        });

        Ok(())
    }

    /// Sell `shares` of `symbol` at `price`, crediting notional minus
    /// commission and stamp tax.
    ///
    /// Average cost is deliberately not recomputed on sells; realized P&L
    /// is `price - avg_cost` regardless of partial liquidation. The
    /// position is removed entirely when its share count reaches zero.
    pub fn sell(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        price: Decimal,
        shares: u32,
        rationale: &str,
    ) -> Result<(), TradeError> {
        self.check_order(price, shares)?;

        let pos = self
            .positions
            .get_mut(symbol)
            .ok_or_else(|| TradeError::UnknownPosition {
                symbol: symbol.to_string(),
            })?;
        if pos.shares < shares {
            return Err(TradeError::InsufficientShares {
                symbol: symbol.to_string(),
                held: pos.shares,
                requested: shares,
            });
        }

        let notional = price * Decimal::from(shares);
        let fees = self.fees.commission(notional, true);

        pos.shares -= shares;
        pos.last_price = price;
        // The stored display name is authoritative; callers passing a bare
        // symbol as the name must not degrade the trade log.
        let name = pos.name.clone();
        let exhausted = pos.shares == 0;

        self.cash += notional - fees;
        if exhausted {
            self.positions.remove(symbol);
        }

        self.trades.push(TradeRecord {
            id: Uuid::new_v4(),
            date,
            side: TradeSide::Sell,
            symbol: symbol.to_string(),
            name,
            price,
            shares,
            notional,
            fees,
            rationale: rationale.to_string(),
        });

        Ok(())
    }

    /// Re-mark open positions to the supplied close prices.
    ///
    /// Symbols absent from the map keep their previous mark; a missing
    /// quote for an illiquid symbol is tolerated, not an error.
    pub fn mark_to_market(&mut self, closes: &BTreeMap<String, Decimal>) {
        for (symbol, pos) in self.positions.iter_mut() {
            if let Some(close) = closes.get(symbol) {
                pos.last_price = *close;
            }
        }
    }

    /// Append the end-of-day equity snapshot for `date`.
    ///
    /// Always appends; calling twice without intervening trades or marks
    /// yields two snapshots with identical values.
    pub fn record_snapshot(&mut self, date: NaiveDate) -> DailySnapshot {
        let market_value = self.total_market_value();
        let snapshot = DailySnapshot {
            date,
            cash: self.cash,
            market_value,
            total_assets: self.cash + market_value,
            return_pct: self.return_pct(),
        };
        self.snapshots.push(snapshot.clone());
        snapshot
    }

    /// Reset to initial cash with no positions, trades, or snapshots.
    pub fn reset(&mut self) {
        self.cash = self.initial_cash;
        self.positions.clear();
        self.trades.clear();
        self.snapshots.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn ledger() -> Ledger {
        Ledger::new(dec!(1_000_000), FeeSchedule::default(), 100)
    }

    #[test]
    fn buy_debits_notional_plus_commission() {
        let mut l = ledger();
        l.buy(date("2025-06-02"), "600000.SH", "Pudong Bank", dec!(10), 1000, "")
            .unwrap();
        // notional 10_000, commission max(3, 5) = 5
        assert_eq!(l.cash(), dec!(989_995));
        let pos = l.position("600000.SH").unwrap();
        assert_eq!(pos.shares, 1000);
        assert_eq!(pos.avg_cost, dec!(10));
        assert_eq!(l.trades().len(), 1);
        assert_eq!(l.trades()[0].fees, dec!(5));
    }

    #[test]
    fn average_cost_merges_lots() {
        let mut l = ledger();
        let d = date("2025-06-02");
        l.buy(d, "AAA", "Triple A", dec!(10), 100, "").unwrap();
        l.buy(d, "AAA", "Triple A", dec!(12), 100, "").unwrap();
        let pos = l.position("AAA").unwrap();
        assert_eq!(pos.shares, 200);
        assert_eq!(pos.avg_cost, dec!(11));

        // Partial sell leaves average cost untouched
        l.sell(d, "AAA", dec!(13), 100, "").unwrap();
        let pos = l.position("AAA").unwrap();
        assert_eq!(pos.shares, 100);
        assert_eq!(pos.avg_cost, dec!(11));
    }

    #[test]
    fn sell_exhausting_shares_removes_position() {
        let mut l = ledger();
        let d = date("2025-06-02");
        l.buy(d, "AAA", "Triple A", dec!(10), 200, "").unwrap();
        l.sell(d, "AAA", dec!(11), 200, "").unwrap();
        assert!(l.position("AAA").is_none());
        assert_eq!(l.trades().len(), 2);
    }

    #[test]
    fn sell_credits_net_of_commission_and_tax() {
        let mut l = ledger();
        let d = date("2025-06-02");
        l.buy(d, "AAA", "Triple A", dec!(10), 1000, "").unwrap();
        l.sell(d, "AAA", dec!(11), 1000, "").unwrap();
        // buy: -10_005; sell: notional 11_000, fees max(3.3, 5) + 11 = 16
        assert_eq!(l.cash(), dec!(1_000_979));
    }

    #[test]
    fn lot_size_violations_leave_ledger_unchanged() {
        let mut l = ledger();
        let before = l.clone();
        let d = date("2025-06-02");

        for shares in [0u32, 50, 150, 101] {
            assert!(matches!(
                l.buy(d, "AAA", "Triple A", dec!(10), shares, ""),
                Err(TradeError::InvalidShares { .. })
            ));
            assert!(matches!(
                l.sell(d, "AAA", dec!(10), shares, ""),
                Err(TradeError::InvalidShares { .. })
            ));
        }
        assert_eq!(l, before);
    }

    #[test]
    fn non_positive_price_rejected() {
        let mut l = ledger();
        let d = date("2025-06-02");
        assert!(matches!(
            l.buy(d, "AAA", "Triple A", Decimal::ZERO, 100, ""),
            Err(TradeError::InvalidPrice { .. })
        ));
        assert!(matches!(
            l.buy(d, "AAA", "Triple A", dec!(-1), 100, ""),
            Err(TradeError::InvalidPrice { .. })
        ));
    }

    #[test]
    fn insufficient_cash_is_rejected_without_partial_fill() {
        let mut l = Ledger::new(dec!(1_000), FeeSchedule::default(), 100);
        let before = l.clone();
        let err = l
            .buy(date("2025-06-02"), "AAA", "Triple A", dec!(100), 100, "")
            .unwrap_err();
        assert!(matches!(err, TradeError::InsufficientCash { .. }));
        assert_eq!(l, before);
    }

    #[test]
    fn sell_without_position_or_shares_is_rejected() {
        let mut l = ledger();
        let d = date("2025-06-02");
        assert!(matches!(
            l.sell(d, "AAA", dec!(10), 100, ""),
            Err(TradeError::UnknownPosition { .. })
        ));

        l.buy(d, "AAA", "Triple A", dec!(10), 100, "").unwrap();
        let before = l.clone();
        assert!(matches!(
            l.sell(d, "AAA", dec!(10), 200, ""),
            Err(TradeError::InsufficientShares { .. })
        ));
        assert_eq!(l, before);
    }

    #[test]
    fn conservation_per_trade() {
        let mut l = ledger();
        let d = date("2025-06-02");

        // Buy: equity drops by exactly the fee (position marked at fill price).
        let before = l.total_assets();
        l.buy(d, "AAA", "Triple A", dec!(25.5), 400, "").unwrap();
        let fee = l.trades()[0].fees;
        assert_eq!(l.total_assets(), before - fee);

        // Sell at the current mark: equity again drops by exactly the fee.
        let mut closes = BTreeMap::new();
        closes.insert("AAA".to_string(), dec!(26.4));
        l.mark_to_market(&closes);
        let before = l.total_assets();
        l.sell(d, "AAA", dec!(26.4), 200, "").unwrap();
        let fee = l.trades()[1].fees;
        assert_eq!(l.total_assets(), before - fee);
    }

    #[test]
    fn mark_to_market_tolerates_missing_symbols() {
        let mut l = ledger();
        let d = date("2025-06-02");
        l.buy(d, "AAA", "Triple A", dec!(10), 100, "").unwrap();
        l.buy(d, "BBB", "Double B", dec!(20), 100, "").unwrap();

        let mut closes = BTreeMap::new();
        closes.insert("AAA".to_string(), dec!(12));
        l.mark_to_market(&closes);

        assert_eq!(l.position("AAA").unwrap().last_price, dec!(12));
        // BBB keeps its stale mark
        assert_eq!(l.position("BBB").unwrap().last_price, dec!(20));
    }

    #[test]
    fn snapshot_values_are_idempotent_without_changes() {
        let mut l = ledger();
        let d = date("2025-06-02");
        l.buy(d, "AAA", "Triple A", dec!(10), 1000, "").unwrap();

        let first = l.record_snapshot(d);
        let second = l.record_snapshot(d);
        assert_eq!(l.snapshots().len(), 2);
        assert_eq!(first.total_assets, second.total_assets);
        assert_eq!(first.return_pct, second.return_pct);
    }

    #[test]
    fn return_pct_uses_initial_capital_as_baseline() {
        let mut l = ledger();
        let d = date("2025-06-02");
        l.buy(d, "AAA", "Triple A", dec!(10), 1000, "").unwrap();

        let mut closes = BTreeMap::new();
        closes.insert("AAA".to_string(), dec!(11));
        l.mark_to_market(&closes);

        let snap = l.record_snapshot(d);
        assert_eq!(snap.total_assets, dec!(1_000_995));
        assert_eq!(snap.return_pct, dec!(0.0995));
    }
}
