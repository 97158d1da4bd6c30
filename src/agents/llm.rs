//! LLM-backed decision-maker
//!
//! One type for every vendor: the provider, endpoint, and model are
//! configuration. Talks to any OpenAI-compatible chat-completions API and
//! parses the reply with the strict instruction parser.

use super::{parse_instruction, DecisionContext, DecisionMaker, TradeInstruction};
use crate::config::LlmConfig;
use crate::error::{ArenaError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

const SYSTEM_PROMPT: &str = "\
You are a professional quantitative equity trader managing a simulated \
portfolio. Each trading day you make exactly one decision: buy one stock, \
sell one holding, or hold.

Rules:
- You only see market data up to the current simulation date.
- Share counts must be positive multiples of 100.
- Fees: 0.03% commission (minimum 5), plus 0.1% stamp tax on sells.
- Prefer 3-5 diversified holdings and keep single positions under 30% of \
total assets.

Reply with a single JSON object and nothing else:
{\"action\": \"buy|sell|hold\", \"symbol\": \"...\", \"shares\": N, \"reason\": \"...\"}
`symbol` and `shares` are required only for buy and sell.";

#[derive(Debug)]
pub struct LlmAgent {
    name: String,
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    http: Client,
}

impl LlmAgent {
    /// Build from configuration; `model` overrides the config default.
    pub fn from_config(name: impl Into<String>, cfg: &LlmConfig, model: Option<String>) -> Result<Self> {
        let base_url = cfg
            .base_url
            .clone()
            .or_else(|| default_base_url(&cfg.provider).map(str::to_string))
            .ok_or_else(|| {
                ArenaError::Config(format!("no base_url known for provider {}", cfg.provider))
            })?;

        let model = model
            .or_else(|| cfg.model.clone())
            .ok_or_else(|| ArenaError::Config("llm model not configured".to_string()))?;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(90))
            .build()?;

        Ok(Self {
            name: name.into(),
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            http,
        })
    }

    fn build_user_message(&self, ctx: &DecisionContext<'_>) -> String {
        let mut msg = format!("Trading date: {}\n\n== Portfolio ==\n", ctx.date);
        let p = ctx.portfolio;
        msg.push_str(&format!(
            "Total assets: {:.2}\nCash: {:.2}\nMarket value: {:.2}\nReturn: {:.2}%\n",
            p.total_assets, p.cash, p.market_value, p.return_pct
        ));
        if p.positions.is_empty() {
            msg.push_str("No open positions.\n");
        } else {
            msg.push_str(&format!("Open positions ({}):\n", p.positions.len()));
            for pos in &p.positions {
                msg.push_str(&format!(
                    "  {} ({}): {} shares, cost {:.2}, last {:.2}, pnl {:+.2}%\n",
                    pos.name, pos.symbol, pos.shares, pos.avg_cost, pos.last_price,
                    pos.unrealized_pnl_pct
                ));
            }
        }

        msg.push_str("\n== Market ==\n");
        for (i, quote) in ctx.universe.iter().take(20).enumerate() {
            msg.push_str(&format!(
                "{}. {} ({}) - {} | close {:.2}, change {:+.2}%\n",
                i + 1,
                quote.info.name,
                quote.info.symbol,
                quote.info.industry,
                quote.bar.close,
                quote.bar.change_pct
            ));
        }
        msg.push_str("\nMake your decision for today and reply with the JSON object.");
        msg
    }

    async fn chat(&self, user_message: &str) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_message.to_string(),
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ArenaError::Llm(format!("{status}: {body}")));
        }

        let reply: ChatResponse = response.json().await?;
        reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ArenaError::Llm("empty choices in reply".to_string()))
    }
}

#[async_trait]
impl DecisionMaker for LlmAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn decide(&mut self, ctx: &DecisionContext<'_>) -> Result<TradeInstruction> {
        let user_message = self.build_user_message(ctx);
        let content = self.chat(&user_message).await?;
        debug!(agent = %self.name, reply = %content, "llm reply");
        Ok(parse_instruction(&content))
    }
}

fn default_base_url(provider: &str) -> Option<&'static str> {
    match provider {
        "openai" => Some("https://api.openai.com/v1"),
        "deepseek" => Some("https://api.deepseek.com/v1"),
        "siliconflow" => Some("https://api.siliconflow.cn/v1"),
        "openrouter" => Some("https://openrouter.ai/api/v1"),
        "ollama" => Some("http://localhost:11434/v1"),
        _ => None,
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}
