//! Rule-based momentum agent
//!
//! Deterministic policy: cut any holding past its stop-loss first, then
//! chase the day's strongest gainer not already held.

use super::{DecisionContext, DecisionMaker, TradeInstruction};
use crate::error::Result;
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub struct MomentumAgent {
    name: String,
    /// Liquidate a holding once its unrealized loss exceeds this (percent)
    stop_loss_pct: Decimal,
    /// Fraction of cash committed per entry
    entry_fraction: Decimal,
    lot_size: u32,
}

impl MomentumAgent {
    pub fn new(name: impl Into<String>, stop_loss_pct: Decimal) -> Self {
        Self {
            name: name.into(),
            stop_loss_pct,
            entry_fraction: dec!(0.2),
            lot_size: 100,
        }
    }
}

#[async_trait]
impl DecisionMaker for MomentumAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<TradeInstruction> {
        // Stop-loss has priority over new entries.
        if let Some(worst) = ctx
            .portfolio
            .positions
            .iter()
            .filter(|p| p.unrealized_pnl_pct <= -self.stop_loss_pct)
            .min_by_key(|p| p.unrealized_pnl_pct)
        {
            return Ok(TradeInstruction::Sell {
                symbol: worst.symbol.clone(),
                shares: worst.shares,
                reason: format!(
                    "stop loss: {:.2}% <= -{:.2}%",
                    worst.unrealized_pnl_pct, self.stop_loss_pct
                ),
            });
        }

        let leader = ctx
            .universe
            .iter()
            .filter(|q| q.bar.change_pct > Decimal::ZERO)
            .filter(|q| ctx.portfolio.position(q.symbol()).is_none())
            .max_by_key(|q| q.bar.change_pct);

        if let Some(quote) = leader {
            let price = quote.close();
            if price > Decimal::ZERO {
                let budget = ctx.portfolio.cash * self.entry_fraction;
                let shares = (budget / price).to_u32().unwrap_or(0) / self.lot_size * self.lot_size;
                if shares >= self.lot_size {
                    return Ok(TradeInstruction::Buy {
                        symbol: quote.symbol().to_string(),
                        shares,
                        reason: format!("momentum leader, change {:+.2}%", quote.bar.change_pct),
                    });
                }
            }
        }

        Ok(TradeInstruction::hold("no signal"))
    }
}
