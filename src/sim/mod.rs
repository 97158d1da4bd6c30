//! Daily simulation driver
//!
//! Sequences the arena: for each trading date, advance every agent's
//! engine, collect one instruction per agent against a time-gated market
//! view, apply it through the ledger, mark every book to the day's closes,
//! and snapshot. Agent failures, timeouts, and trade rejections degrade to
//! hold; the date loop always completes.

pub mod report;

pub use report::{AgentReport, BenchmarkPoint, CompetitionReport, RankingEntry};

use crate::agents::{DecisionContext, DecisionMaker, TradeInstruction};
use crate::config::SimConfig;
use crate::engine::{FeeSchedule, TradingEngine};
use crate::error::{ArenaError, Result};
use crate::market::{GatedMarketView, PriceSource};
use crate::state::StateStore;
use crate::types::{Quote, StockInfo};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

struct AgentEntry {
    agent: Box<dyn DecisionMaker>,
    engine: TradingEngine,
    /// Last date fully processed (decide + mark + snapshot)
    done_through: Option<NaiveDate>,
}

pub struct Arena {
    source: Arc<dyn PriceSource>,
    sim: SimConfig,
    fees: FeeSchedule,
    entries: Vec<AgentEntry>,
    store: Option<StateStore>,
}

impl Arena {
    pub fn new(source: Arc<dyn PriceSource>, sim: SimConfig, fees: FeeSchedule) -> Self {
        Self {
            source,
            sim,
            fees,
            entries: Vec::new(),
            store: None,
        }
    }

    /// Checkpoint every agent's state after each simulated date.
    pub fn with_state_store(mut self, store: StateStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Register a decision-maker. Each agent owns a private engine; agents
    /// never share mutable state.
    pub fn register(&mut self, agent: Box<dyn DecisionMaker>) {
        let engine = TradingEngine::new(
            agent.name(),
            self.sim.initial_cash,
            self.fees.clone(),
            self.sim.lot_size,
        );
        info!(agent = %agent.name(), "registered");
        self.entries.push(AgentEntry {
            agent,
            engine,
            done_through: None,
        });
    }

    pub fn agent_count(&self) -> usize {
        self.entries.len()
    }

    /// Run the full date sequence and produce the competition report.
    ///
    /// With `resume`, agents whose checkpointed state covers a prefix of
    /// `dates` skip the days they have already traded.
    pub async fn run(&mut self, dates: &[NaiveDate], resume: bool) -> Result<CompetitionReport> {
        if dates.is_empty() {
            return Err(ArenaError::Config("empty trading-date sequence".to_string()));
        }
        if dates.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ArenaError::Config(
                "trading dates must be strictly increasing".to_string(),
            ));
        }
        if self.entries.is_empty() {
            return Err(ArenaError::Config("no agents registered".to_string()));
        }

        self.prepare_engines(dates[0], resume).await?;

        let universe = self.source.universe(self.sim.universe_size).await?;
        info!(size = universe.len(), "tradable universe loaded");

        for (day, date) in dates.iter().enumerate() {
            info!(day = day + 1, total = dates.len(), %date, "trading day");

            let quotes = self.fetch_quotes(&universe, *date).await;
            if quotes.is_empty() {
                warn!(%date, "no price data; agents sit out this date");
            }
            let closes: BTreeMap<String, Decimal> = quotes
                .iter()
                .map(|q| (q.symbol().to_string(), q.close()))
                .collect();

            // Decision pass, in registration order.
            for entry in self.entries.iter_mut() {
                if entry.done_through.map_or(false, |done| done >= *date) {
                    debug!(agent = %entry.agent.name(), %date, "already processed, skipping");
                    continue;
                }
                if entry.engine.current_date() != Some(*date) {
                    entry
                        .engine
                        .advance_to(*date)
                        .map_err(|e| ArenaError::Internal(e.to_string()))?;
                }
                if quotes.is_empty() {
                    continue;
                }

                let instruction = Self::decide_one(
                    entry,
                    *date,
                    &quotes,
                    Arc::clone(&self.source),
                    self.sim.decision_timeout_secs,
                )
                .await;
                Self::apply_instruction(entry, *date, &quotes, instruction);
            }

            // Valuation pass: mark every book, then snapshot.
            for entry in self.entries.iter_mut() {
                if entry.done_through.map_or(false, |done| done >= *date) {
                    continue;
                }
                entry.engine.mark_to_market(&closes);
                if let Err(e) = entry.engine.record_snapshot() {
                    warn!(agent = %entry.agent.name(), %date, "snapshot failed: {e}");
                }
                entry.done_through = Some(*date);
            }

            self.checkpoint().await;
        }

        self.build_report(dates).await
    }

    async fn prepare_engines(&mut self, start: NaiveDate, resume: bool) -> Result<()> {
        for entry in self.entries.iter_mut() {
            let mut restored = false;
            if resume {
                if let Some(store) = &self.store {
                    match store.load(entry.agent.name()).await {
                        Ok(Some(state)) if state.current_date >= Some(start) => {
                            info!(
                                agent = %entry.agent.name(),
                                through = ?state.current_date,
                                "resuming from checkpoint"
                            );
                            entry.done_through = state.current_date;
                            entry.engine = TradingEngine::restore(state);
                            restored = true;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(agent = %entry.agent.name(), "checkpoint load failed: {e}");
                        }
                    }
                }
            }
            if !restored {
                entry.engine.initialize(start);
                entry.done_through = None;
            }
        }
        Ok(())
    }

    async fn fetch_quotes(&self, universe: &[StockInfo], date: NaiveDate) -> Vec<Quote> {
        let mut quotes = Vec::with_capacity(universe.len());
        for info in universe {
            match self.source.daily_bar(&info.symbol, date).await {
                Ok(Some(bar)) => quotes.push(Quote {
                    info: info.clone(),
                    bar,
                }),
                Ok(None) => {}
                Err(e) => {
                    // A failed fetch withholds a price; it never corrupts a trade.
                    warn!(symbol = %info.symbol, %date, "quote fetch failed: {e}");
                }
            }
        }
        quotes
    }

    async fn decide_one(
        entry: &mut AgentEntry,
        date: NaiveDate,
        quotes: &[Quote],
        source: Arc<dyn PriceSource>,
        timeout_secs: u64,
    ) -> TradeInstruction {
        let view = entry.engine.view();
        let market = GatedMarketView::new(source, date);
        let ctx = DecisionContext {
            date,
            portfolio: &view,
            universe: quotes,
            market: &market,
        };

        match tokio::time::timeout(Duration::from_secs(timeout_secs), entry.agent.decide(&ctx))
            .await
        {
            Ok(Ok(instruction)) => instruction,
            Ok(Err(e)) => {
                warn!(agent = %entry.agent.name(), %date, "decision failed, holding: {e}");
                TradeInstruction::hold(format!("decision failed: {e}"))
            }
            Err(_) => {
                warn!(agent = %entry.agent.name(), %date, "decision timed out, holding");
                TradeInstruction::hold("decision timed out")
            }
        }
    }

    fn apply_instruction(
        entry: &mut AgentEntry,
        date: NaiveDate,
        quotes: &[Quote],
        instruction: TradeInstruction,
    ) {
        let agent = entry.agent.name().to_string();
        match instruction {
            TradeInstruction::Buy {
                symbol,
                shares,
                reason,
            } => {
                let Some(quote) = quotes.iter().find(|q| q.symbol() == symbol) else {
                    warn!(%agent, %symbol, "buy names an unquoted symbol, holding");
                    return;
                };
                match entry.engine.buy(
                    date,
                    &symbol,
                    &quote.info.name,
                    quote.close(),
                    shares,
                    &reason,
                ) {
                    Ok(()) => {
                        info!(%agent, %symbol, shares, price = %quote.close(), "bought");
                    }
                    Err(e) => warn!(%agent, %symbol, shares, "buy rejected: {e}"),
                }
            }
            TradeInstruction::Sell {
                symbol,
                shares,
                reason,
            } => {
                let Some(quote) = quotes.iter().find(|q| q.symbol() == symbol) else {
                    warn!(%agent, %symbol, "sell names an unquoted symbol, holding");
                    return;
                };
                match entry
                    .engine
                    .sell(date, &symbol, quote.close(), shares, &reason)
                {
                    Ok(()) => {
                        info!(%agent, %symbol, shares, price = %quote.close(), "sold");
                    }
                    Err(e) => warn!(%agent, %symbol, shares, "sell rejected: {e}"),
                }
            }
            TradeInstruction::Hold { reason } => {
                debug!(%agent, %date, %reason, "holding");
            }
        }
    }

    async fn checkpoint(&self) {
        let Some(store) = &self.store else {
            return;
        };
        for entry in &self.entries {
            if let Err(e) = store.save(&entry.engine.state()).await {
                // Persistence trouble never invalidates in-memory results.
                warn!(agent = %entry.agent.name(), "checkpoint save failed: {e}");
            }
        }
    }

    async fn build_report(&self, dates: &[NaiveDate]) -> Result<CompetitionReport> {
        let benchmark = self.benchmark_series(dates).await;
        Ok(CompetitionReport::new(
            dates,
            self.sim.initial_cash,
            &self.sim.benchmark_symbol,
            benchmark,
            self.entries.iter().map(|e| AgentReport::from_engine(&e.engine)),
        ))
    }

    async fn benchmark_series(&self, dates: &[NaiveDate]) -> Vec<BenchmarkPoint> {
        let mut series = Vec::with_capacity(dates.len());
        let mut baseline: Option<Decimal> = None;
        for date in dates {
            match self.source.daily_bar(&self.sim.benchmark_symbol, *date).await {
                Ok(Some(bar)) => {
                    let base = *baseline.get_or_insert(bar.close);
                    let return_pct = if base.is_zero() {
                        Decimal::ZERO
                    } else {
                        (bar.close - base) / base * Decimal::ONE_HUNDRED
                    };
                    series.push(BenchmarkPoint {
                        date: *date,
                        close: bar.close,
                        return_pct,
                    });
                }
                Ok(None) => debug!(%date, "benchmark bar missing"),
                Err(e) => warn!(%date, "benchmark fetch failed: {e}"),
            }
        }
        series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{MomentumAgent, RandomAgent};
    use crate::config::SimConfig;
    use crate::error::ArenaError;
    use crate::market::FixtureSource;
    use crate::types::{DailyBar, StockInfo};
    use rust_decimal_macros::dec;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn bar(symbol: &str, date: NaiveDate, close: Decimal, change_pct: Decimal) -> DailyBar {
        DailyBar {
            symbol: symbol.to_string(),
            date,
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(10_000),
            change_pct,
        }
    }

    fn fixture() -> FixtureSource {
        let mut source = FixtureSource::new();
        source.add_stock(StockInfo {
            symbol: "AAA".to_string(),
            name: "Triple A".to_string(),
            industry: "bank".to_string(),
        });
        source.add_stock(StockInfo {
            symbol: "BBB".to_string(),
            name: "Double B".to_string(),
            industry: "tech".to_string(),
        });
        for (i, day) in ["2025-06-02", "2025-06-03", "2025-06-04"].iter().enumerate() {
            let d = date(day);
            let drift = Decimal::from(i as i64);
            source.add_bar(bar("AAA", d, dec!(10) + drift, dec!(1.0)));
            source.add_bar(bar("BBB", d, dec!(20) + drift, dec!(2.0)));
        }
        source
    }

    fn sim_config() -> SimConfig {
        SimConfig {
            initial_cash: dec!(1_000_000),
            decision_timeout_secs: 5,
            benchmark_symbol: "AAA".to_string(),
            ..SimConfig::default()
        }
    }

    #[tokio::test]
    async fn empty_date_sequence_is_a_config_error() {
        let mut arena = Arena::new(
            Arc::new(fixture()),
            sim_config(),
            FeeSchedule::default(),
        );
        arena.register(Box::new(RandomAgent::new("r", Some(1))));
        assert!(matches!(
            arena.run(&[], false).await,
            Err(ArenaError::Config(_))
        ));
    }

    #[tokio::test]
    async fn non_increasing_dates_are_a_config_error() {
        let mut arena = Arena::new(
            Arc::new(fixture()),
            sim_config(),
            FeeSchedule::default(),
        );
        arena.register(Box::new(RandomAgent::new("r", Some(1))));
        let dates = [date("2025-06-03"), date("2025-06-02")];
        assert!(matches!(
            arena.run(&dates, false).await,
            Err(ArenaError::Config(_))
        ));
    }

    #[tokio::test]
    async fn every_agent_gets_one_snapshot_per_date() {
        let mut arena = Arena::new(
            Arc::new(fixture()),
            sim_config(),
            FeeSchedule::default(),
        );
        arena.register(Box::new(RandomAgent::new("random", Some(7))));
        arena.register(Box::new(MomentumAgent::new("momentum", dec!(5))));

        let dates = [date("2025-06-02"), date("2025-06-03"), date("2025-06-04")];
        let report = arena.run(&dates, false).await.unwrap();

        assert_eq!(report.agents.len(), 2);
        for agent in &report.agents {
            assert_eq!(agent.snapshots.len(), 3);
            let got: Vec<NaiveDate> = agent.snapshots.iter().map(|s| s.date).collect();
            assert_eq!(got, dates);
        }
        assert_eq!(report.rankings.len(), 2);
        assert_eq!(report.benchmark.len(), 3);
        assert_eq!(report.benchmark[0].return_pct, Decimal::ZERO);
    }

    #[tokio::test]
    async fn identical_seeds_yield_identical_snapshot_sequences() {
        let dates = [date("2025-06-02"), date("2025-06-03"), date("2025-06-04")];

        let mut snapshots = Vec::new();
        for _ in 0..2 {
            let mut arena = Arena::new(
                Arc::new(fixture()),
                sim_config(),
                FeeSchedule::default(),
            );
            arena.register(Box::new(RandomAgent::new("random", Some(99))));
            let report = arena.run(&dates, false).await.unwrap();
            snapshots.push(report.agents[0].snapshots.clone());
        }
        assert_eq!(snapshots[0], snapshots[1]);
    }

    #[tokio::test]
    async fn momentum_agent_trades_and_is_accounted() {
        let mut arena = Arena::new(
            Arc::new(fixture()),
            sim_config(),
            FeeSchedule::default(),
        );
        arena.register(Box::new(MomentumAgent::new("momentum", dec!(5))));

        let dates = [date("2025-06-02"), date("2025-06-03")];
        let report = arena.run(&dates, false).await.unwrap();
        let agent = &report.agents[0];

        // Day 1: buys BBB (strongest gainer), 20% of cash at 20/share.
        // Day 2: buys AAA with 20% of remaining cash at 11/share.
        assert_eq!(agent.trades.len(), 2);
        assert_eq!(agent.trades[0].symbol, "BBB");
        assert_eq!(agent.trades[0].shares, 10_000);
        assert_eq!(agent.trades[1].symbol, "AAA");
        assert_eq!(agent.trades[1].shares, 14_500);

        // Equity is conserved modulo fees plus mark-to-market gains.
        let fees: Decimal = agent.trades.iter().map(|t| t.fees).sum();
        assert_eq!(fees, dec!(107.85));
        assert_eq!(agent.final_cash, dec!(640_392.15));
        assert_eq!(agent.market_value, dec!(369_500));
        assert_eq!(agent.total_assets, dec!(1_009_892.15));
    }
}
