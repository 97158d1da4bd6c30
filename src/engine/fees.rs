//! Commission and stamp-tax schedule
//!
//! Pure arithmetic; the ledger is the only caller.

use crate::config::FeeConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Fee schedule applied to every fill.
///
/// Defaults mirror the A-share retail schedule: 0.03% commission with a
/// 5-unit floor, plus 0.1% stamp tax on the sell side only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub commission_rate: Decimal,
    pub min_commission: Decimal,
    pub stamp_tax_rate: Decimal,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            commission_rate: dec!(0.0003),
            min_commission: dec!(5),
            stamp_tax_rate: dec!(0.001),
        }
    }
}

impl From<&FeeConfig> for FeeSchedule {
    fn from(cfg: &FeeConfig) -> Self {
        Self {
            commission_rate: cfg.commission_rate,
            min_commission: cfg.min_commission,
            stamp_tax_rate: cfg.stamp_tax_rate,
        }
    }
}

impl FeeSchedule {
    /// Total fees for a fill of the given notional.
    ///
    /// Caller guarantees a non-negative finite notional.
    pub fn commission(&self, notional: Decimal, is_sell: bool) -> Decimal {
        let mut fee = (notional * self.commission_rate).max(self.min_commission);
        if is_sell {
            fee += notional * self.stamp_tax_rate;
        }
        fee
    }
}
