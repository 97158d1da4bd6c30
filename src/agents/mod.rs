//! Decision-makers
//!
//! A decision-maker sees a read-only portfolio projection and a time-gated
//! market view, and returns exactly one instruction per trading day. Share
//! counts are never trusted here; the ledger validates them.

mod llm;
mod momentum;
mod random;

pub use llm::LlmAgent;
pub use momentum::MomentumAgent;
pub use random::RandomAgent;

use crate::engine::PortfolioView;
use crate::error::Result;
use crate::market::GatedMarketView;
use crate::types::Quote;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One discrete instruction for the day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum TradeInstruction {
    Buy {
        symbol: String,
        shares: u32,
        #[serde(default)]
        reason: String,
    },
    Sell {
        symbol: String,
        shares: u32,
        #[serde(default)]
        reason: String,
    },
    Hold {
        #[serde(default)]
        reason: String,
    },
}

impl TradeInstruction {
    pub fn hold(reason: impl Into<String>) -> Self {
        TradeInstruction::Hold {
            reason: reason.into(),
        }
    }
}

/// Everything an agent may observe for the current date.
pub struct DecisionContext<'a> {
    pub date: NaiveDate,
    pub portfolio: &'a PortfolioView,
    pub universe: &'a [Quote],
    pub market: &'a GatedMarketView,
}

#[async_trait]
pub trait DecisionMaker: Send + Sync {
    fn name(&self) -> &str;

    /// Return exactly one instruction for the day. Errors and timeouts are
    /// degraded to hold by the driver; they never reach the ledger.
    async fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<TradeInstruction>;
}

/// Strictly parse a free-text reply into an instruction.
///
/// Tries the whole text, then a fenced ```json block, then the outermost
/// brace span. Anything unrecognized becomes a hold carrying the parse
/// failure, never an error that could reach the ledger.
pub fn parse_instruction(text: &str) -> TradeInstruction {
    for candidate in json_candidates(text) {
        if let Ok(instruction) = serde_json::from_str::<TradeInstruction>(candidate.trim()) {
            return instruction;
        }
    }
    TradeInstruction::hold(format!("unparseable reply: {}", excerpt(text)))
}

fn json_candidates(text: &str) -> Vec<&str> {
    let mut candidates = vec![text];
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            candidates.push(&rest[..end]);
        }
    }
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if end > start {
            candidates.push(&text[start..=end]);
        }
    }
    candidates
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 100 {
        let cut: String = trimmed.chars().take(100).collect();
        format!("{cut}…")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_json() {
        let instruction = parse_instruction(
            r#"{"action": "buy", "symbol": "600000.SH", "shares": 500, "reason": "undervalued"}"#,
        );
        assert_eq!(
            instruction,
            TradeInstruction::Buy {
                symbol: "600000.SH".to_string(),
                shares: 500,
                reason: "undervalued".to_string(),
            }
        );
    }

    #[test]
    fn parses_fenced_json_block() {
        let reply = "Let me think.\n```json\n{\"action\": \"sell\", \"symbol\": \"AAA\", \"shares\": 200}\n```\nDone.";
        assert_eq!(
            parse_instruction(reply),
            TradeInstruction::Sell {
                symbol: "AAA".to_string(),
                shares: 200,
                reason: String::new(),
            }
        );
    }

    #[test]
    fn parses_embedded_brace_span() {
        let reply = r#"I recommend holding today. {"action": "hold", "reason": "no edge"}"#;
        assert_eq!(
            parse_instruction(reply),
            TradeInstruction::Hold {
                reason: "no edge".to_string()
            }
        );
    }

    #[test]
    fn malformed_payload_degrades_to_hold() {
        for reply in [
            "I would buy some bank stocks today.",
            r#"{"action": "short", "symbol": "AAA"}"#,
            r#"{"action": "buy"}"#,
            r#"{"action": "buy", "symbol": "AAA", "shares": -100}"#,
            "",
        ] {
            assert!(
                matches!(parse_instruction(reply), TradeInstruction::Hold { .. }),
                "expected hold for {reply:?}"
            );
        }
    }

    #[test]
    fn hold_reason_carries_an_excerpt() {
        let long = "x".repeat(300);
        let TradeInstruction::Hold { reason } = parse_instruction(&long) else {
            panic!("expected hold");
        };
        assert!(reason.starts_with("unparseable reply: "));
        assert!(reason.chars().count() < 150);
    }
}
