//! Time-aware trading engine
//!
//! One engine per agent: a [`Ledger`] for the bookkeeping and a
//! [`SimulationClock`] gating every trade date. Decision-makers never see
//! the engine itself, only the owned [`PortfolioView`] projection.

pub mod clock;
pub mod fees;
pub mod ledger;

pub use clock::SimulationClock;
pub use fees::FeeSchedule;
pub use ledger::{DailySnapshot, Ledger, Position, TradeError, TradeRecord};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct TradingEngine {
    agent: String,
    ledger: Ledger,
    clock: SimulationClock,
    start_date: Option<NaiveDate>,
}

impl TradingEngine {
    pub fn new(agent: impl Into<String>, initial_cash: Decimal, fees: FeeSchedule, lot_size: u32) -> Self {
        Self {
            agent: agent.into(),
            ledger: Ledger::new(initial_cash, fees, lot_size),
            clock: SimulationClock::new(),
            start_date: None,
        }
    }

    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn current_date(&self) -> Option<NaiveDate> {
        self.clock.current()
    }

    /// Begin a fresh simulation run: reset the ledger to its initial cash
    /// and put the clock at `start_date`.
    pub fn initialize(&mut self, start_date: NaiveDate) {
        self.ledger.reset();
        self.clock.start(start_date);
        self.start_date = Some(start_date);
    }

    /// Advance the clock to the next trading date.
    ///
    /// If the date being left has no snapshot yet, one is recorded from the
    /// current marks first, so no simulated day is ever skipped in the
    /// equity curve.
    pub fn advance_to(&mut self, date: NaiveDate) -> Result<(), TradeError> {
        let prev = self.clock.current();
        self.clock.advance(date)?;
        if let Some(left) = prev {
            let already = self.ledger.snapshots().last().map(|s| s.date) == Some(left);
            if !already {
                self.ledger.record_snapshot(left);
            }
        }
        Ok(())
    }

    /// Gate-checked buy. A date mismatch is loud: it means a decision-maker
    /// tried to backdate or forward-date a trade.
    pub fn buy(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        name: &str,
        price: Decimal,
        shares: u32,
        rationale: &str,
    ) -> Result<(), TradeError> {
        if let Err(e) = self.clock.gate(date) {
            warn!(agent = %self.agent, %date, "buy rejected by time gate: {e}");
            return Err(e);
        }
        self.ledger.buy(date, symbol, name, price, shares, rationale)
    }

    /// Gate-checked sell.
    pub fn sell(
        &mut self,
        date: NaiveDate,
        symbol: &str,
        price: Decimal,
        shares: u32,
        rationale: &str,
    ) -> Result<(), TradeError> {
        if let Err(e) = self.clock.gate(date) {
            warn!(agent = %self.agent, %date, "sell rejected by time gate: {e}");
            return Err(e);
        }
        self.ledger.sell(date, symbol, price, shares, rationale)
    }

    pub fn mark_to_market(&mut self, closes: &BTreeMap<String, Decimal>) {
        self.ledger.mark_to_market(closes);
    }

    /// Record the end-of-day snapshot for the clock's current date.
    pub fn record_snapshot(&mut self) -> Result<DailySnapshot, TradeError> {
        let date = self.clock.current().ok_or(TradeError::ClockUninitialized)?;
        Ok(self.ledger.record_snapshot(date))
    }

    /// Read-only projection handed to decision-makers. Owned data only;
    /// no references into the ledger escape.
    pub fn view(&self) -> PortfolioView {
        PortfolioView {
            date: self.clock.current(),
            cash: self.ledger.cash(),
            market_value: self.ledger.total_market_value(),
            total_assets: self.ledger.total_assets(),
            return_pct: self.ledger.return_pct(),
            positions: self
                .ledger
                .positions()
                .values()
                .map(PositionView::from)
                .collect(),
            trades_count: self.ledger.trades().len(),
        }
    }

    /// Full serializable state for checkpointing.
    pub fn state(&self) -> EngineState {
        EngineState {
            agent: self.agent.clone(),
            start_date: self.start_date,
            current_date: self.clock.current(),
            ledger: self.ledger.clone(),
        }
    }

    /// Reconstruct an engine from a checkpoint. `restore(state()) == self`.
    pub fn restore(state: EngineState) -> Self {
        let mut clock = SimulationClock::new();
        if let Some(date) = state.current_date {
            clock.start(date);
        }
        Self {
            agent: state.agent,
            ledger: state.ledger,
            clock,
            start_date: state.start_date,
        }
    }
}

/// What a decision-maker is allowed to see of a portfolio.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioView {
    pub date: Option<NaiveDate>,
    pub cash: Decimal,
    pub market_value: Decimal,
    pub total_assets: Decimal,
    pub return_pct: Decimal,
    pub positions: Vec<PositionView>,
    pub trades_count: usize,
}

impl PortfolioView {
    pub fn position(&self, symbol: &str) -> Option<&PositionView> {
        self.positions.iter().find(|p| p.symbol == symbol)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionView {
    pub symbol: String,
    pub name: String,
    pub shares: u32,
    pub avg_cost: Decimal,
    pub last_price: Decimal,
    pub market_value: Decimal,
    pub unrealized_pnl_pct: Decimal,
}

impl From<&Position> for PositionView {
    fn from(pos: &Position) -> Self {
        Self {
            symbol: pos.symbol.clone(),
            name: pos.name.clone(),
            shares: pos.shares,
            avg_cost: pos.avg_cost,
            last_price: pos.last_price,
            market_value: pos.market_value(),
            unrealized_pnl_pct: pos.unrealized_pnl_pct(),
        }
    }
}

/// Serializable engine + clock state; the persistence collaborator stores
/// this verbatim and the round-trip must be identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineState {
    pub agent: String,
    pub start_date: Option<NaiveDate>,
    pub current_date: Option<NaiveDate>,
    pub ledger: Ledger,
}
