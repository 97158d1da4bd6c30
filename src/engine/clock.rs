//! Simulation clock
//!
//! Tracks the current simulated date and gates every trade against it.
//! Uninitialized until the first `start`; thereafter the date only moves
//! forward.

use super::ledger::TradeError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationClock {
    current: Option<NaiveDate>,
}

impl SimulationClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<NaiveDate> {
        self.current
    }

    /// Begin (or restart) a simulation at `date`.
    pub fn start(&mut self, date: NaiveDate) {
        self.current = Some(date);
    }

    /// Move to the next trading date. Backward movement and same-date
    /// re-advances are rejected: the driver visits each date exactly once,
    /// so anything else is a sequencing bug worth surfacing.
    pub fn advance(&mut self, date: NaiveDate) -> Result<(), TradeError> {
        match self.current {
            Some(current) if date > current => {
                self.current = Some(date);
                Ok(())
            }
            current => Err(TradeError::DateMismatch {
                submitted: date,
                current,
            }),
        }
    }

    /// A trade is admissible only when dated exactly at the clock.
    /// Rejects backdated and forward-dated instructions alike.
    pub fn gate(&self, date: NaiveDate) -> Result<(), TradeError> {
        if self.current == Some(date) {
            Ok(())
        } else {
            Err(TradeError::DateMismatch {
                submitted: date,
                current: self.current,
            })
        }
    }
}
