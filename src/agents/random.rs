//! Random baseline agent
//!
//! Seedable benchmark policy: mostly holds, occasionally buys a random
//! universe name with 10-20% of cash or sells part of a random holding.
//! Useful as the floor every other policy must beat.

use super::{DecisionContext, DecisionMaker, TradeInstruction};
use crate::error::Result;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

pub struct RandomAgent {
    name: String,
    rng: StdRng,
    lot_size: u32,
}

impl RandomAgent {
    /// Seeded for reproducible runs; pass `None` for an OS-seeded rng.
    pub fn new(name: impl Into<String>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            name: name.into(),
            rng,
            lot_size: 100,
        }
    }

    fn round_to_lot(&self, shares: u32) -> u32 {
        shares / self.lot_size * self.lot_size
    }
}

#[async_trait]
impl DecisionMaker for RandomAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<TradeInstruction> {
        let roll: f64 = self.rng.random();

        // 15% buy, 15% sell, 70% hold
        if roll < 0.15 {
            if let Some(quote) = ctx.universe.choose(&mut self.rng) {
                let pct = self.rng.random_range(0.10..0.20);
                let budget = ctx.portfolio.cash
                    * Decimal::try_from(pct).unwrap_or_else(|_| Decimal::new(15, 2));
                let price = quote.close();
                if price > Decimal::ZERO {
                    let shares = (budget / price).to_u32().unwrap_or(0);
                    let shares = self.round_to_lot(shares);
                    if shares >= self.lot_size {
                        return Ok(TradeInstruction::Buy {
                            symbol: quote.symbol().to_string(),
                            shares,
                            reason: "random buy".to_string(),
                        });
                    }
                }
            }
        } else if roll < 0.30 {
            if let Some(pos) = ctx.portfolio.positions.choose(&mut self.rng) {
                // Sell 30-100% of the holding
                let pct = self.rng.random_range(0.30..=1.0);
                let shares = self.round_to_lot((pos.shares as f64 * pct) as u32);
                if shares >= self.lot_size {
                    return Ok(TradeInstruction::Sell {
                        symbol: pos.symbol.clone(),
                        shares,
                        reason: "random sell".to_string(),
                    });
                }
            }
        }

        Ok(TradeInstruction::hold("random hold"))
    }
}
