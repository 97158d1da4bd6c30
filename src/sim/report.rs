//! Competition reporting
//!
//! Immutable export of a finished (or checkpointed) run: per-agent detail,
//! rankings by cumulative return, and the benchmark series. Written as
//! plain JSON files; rendering is someone else's job.

use crate::engine::{DailySnapshot, PositionView, TradeRecord, TradingEngine};
use crate::error::Result;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Everything worth keeping about one agent's run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentReport {
    pub name: String,
    pub initial_cash: Decimal,
    pub final_cash: Decimal,
    pub market_value: Decimal,
    pub total_assets: Decimal,
    pub return_pct: Decimal,
    pub trades_count: usize,
    pub positions: Vec<PositionView>,
    pub trades: Vec<TradeRecord>,
    pub snapshots: Vec<DailySnapshot>,
}

impl AgentReport {
    pub fn from_engine(engine: &TradingEngine) -> Self {
        let ledger = engine.ledger();
        Self {
            name: engine.agent().to_string(),
            initial_cash: ledger.initial_cash(),
            final_cash: ledger.cash(),
            market_value: ledger.total_market_value(),
            total_assets: ledger.total_assets(),
            return_pct: ledger.return_pct(),
            trades_count: ledger.trades().len(),
            positions: ledger.positions().values().map(PositionView::from).collect(),
            trades: ledger.trades().to_vec(),
            snapshots: ledger.snapshots().to_vec(),
        }
    }
}

/// One row of the leaderboard
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingEntry {
    pub rank: usize,
    pub name: String,
    pub total_assets: Decimal,
    pub return_pct: Decimal,
    pub trades_count: usize,
}

/// Benchmark index close and cumulative return for one date
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkPoint {
    pub date: NaiveDate,
    pub close: Decimal,
    pub return_pct: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitionReport {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trading_days: usize,
    pub initial_cash: Decimal,
    pub benchmark_symbol: String,
    pub benchmark: Vec<BenchmarkPoint>,
    pub rankings: Vec<RankingEntry>,
    pub agents: Vec<AgentReport>,
}

impl CompetitionReport {
    pub fn new(
        dates: &[NaiveDate],
        initial_cash: Decimal,
        benchmark_symbol: &str,
        benchmark: Vec<BenchmarkPoint>,
        agents: impl IntoIterator<Item = AgentReport>,
    ) -> Self {
        let agents: Vec<AgentReport> = agents.into_iter().collect();

        let mut rankings: Vec<RankingEntry> = agents
            .iter()
            .map(|a| RankingEntry {
                rank: 0,
                name: a.name.clone(),
                total_assets: a.total_assets,
                return_pct: a.return_pct,
                trades_count: a.trades_count,
            })
            .collect();
        rankings.sort_by(|a, b| b.return_pct.cmp(&a.return_pct));
        for (i, entry) in rankings.iter_mut().enumerate() {
            entry.rank = i + 1;
        }

        Self {
            start_date: dates.first().copied().unwrap_or(NaiveDate::MIN),
            end_date: dates.last().copied().unwrap_or(NaiveDate::MIN),
            trading_days: dates.len(),
            initial_cash,
            benchmark_symbol: benchmark_symbol.to_string(),
            benchmark,
            rankings,
            agents,
        }
    }

    /// Write `competition_summary.json` plus one detail file per agent.
    pub async fn export(&self, dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(dir).await?;

        let summary = serde_json::to_string_pretty(&SummaryOnly::from(self))?;
        tokio::fs::write(dir.join("competition_summary.json"), summary).await?;

        for agent in &self.agents {
            let file = format!("agent_{}.json", sanitize(&agent.name));
            let body = serde_json::to_string_pretty(agent)?;
            tokio::fs::write(dir.join(file), body).await?;
        }

        info!(dir = %dir.display(), agents = self.agents.len(), "report exported");
        Ok(())
    }
}

/// Summary file without the bulky per-agent detail
#[derive(Debug, Serialize)]
struct SummaryOnly<'a> {
    start_date: NaiveDate,
    end_date: NaiveDate,
    trading_days: usize,
    initial_cash: Decimal,
    benchmark_symbol: &'a str,
    benchmark: &'a [BenchmarkPoint],
    rankings: &'a [RankingEntry],
}

impl<'a> From<&'a CompetitionReport> for SummaryOnly<'a> {
    fn from(report: &'a CompetitionReport) -> Self {
        Self {
            start_date: report.start_date,
            end_date: report.end_date,
            trading_days: report.trading_days,
            initial_cash: report.initial_cash,
            benchmark_symbol: &report.benchmark_symbol,
            benchmark: &report.benchmark,
            rankings: &report.rankings,
        }
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FeeSchedule;
    use rust_decimal_macros::dec;
    use tempfile::tempdir;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn engine_with_trades(name: &str, buy_price: Decimal) -> TradingEngine {
        let mut engine = TradingEngine::new(name, dec!(1_000_000), FeeSchedule::default(), 100);
        engine.initialize(date("2025-06-02"));
        engine
            .buy(date("2025-06-02"), "AAA", "Triple A", buy_price, 1000, "test")
            .unwrap();
        engine.record_snapshot().unwrap();
        engine
    }

    #[test]
    fn rankings_are_ordered_by_return() {
        // Cheaper entry price means lower fees, hence better return
        let strong = engine_with_trades("strong", dec!(5));
        let weak = engine_with_trades("weak", dec!(500));

        let report = CompetitionReport::new(
            &[date("2025-06-02")],
            dec!(1_000_000),
            "000300.SH",
            Vec::new(),
            [
                AgentReport::from_engine(&weak),
                AgentReport::from_engine(&strong),
            ],
        );

        assert_eq!(report.rankings[0].name, "strong");
        assert_eq!(report.rankings[0].rank, 1);
        assert_eq!(report.rankings[1].name, "weak");
        assert_eq!(report.rankings[1].rank, 2);
    }

    #[test]
    fn agent_report_carries_the_full_trail() {
        let engine = engine_with_trades("a", dec!(10));
        let report = AgentReport::from_engine(&engine);

        assert_eq!(report.final_cash, dec!(989_995));
        assert_eq!(report.trades_count, 1);
        assert_eq!(report.positions.len(), 1);
        assert_eq!(report.snapshots.len(), 1);
        assert_eq!(report.total_assets, dec!(999_995));
    }

    #[tokio::test]
    async fn export_writes_summary_and_agent_files() {
        let engine = engine_with_trades("Claude Trader", dec!(10));
        let report = CompetitionReport::new(
            &[date("2025-06-02")],
            dec!(1_000_000),
            "000300.SH",
            Vec::new(),
            [AgentReport::from_engine(&engine)],
        );

        let dir = tempdir().unwrap();
        report.export(dir.path()).await.unwrap();

        assert!(dir.path().join("competition_summary.json").exists());
        let detail = dir.path().join("agent_claude_trader.json");
        assert!(detail.exists());

        let body = tokio::fs::read_to_string(&detail).await.unwrap();
        let parsed: AgentReport = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.name, "Claude Trader");
        assert_eq!(parsed.trades.len(), 1);
    }
}
