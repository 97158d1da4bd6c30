//! Tushare market-data client
//!
//! Single-endpoint JSON API: every call POSTs `{api_name, token, params,
//! fields}` and gets back a column-oriented table. Only the endpoints the
//! arena needs are wrapped: `daily`, `trade_cal`, `stock_basic`,
//! `daily_basic`.

use super::PriceSource;
use crate::config::TushareConfig;
use crate::error::{ArenaError, Result};
use crate::types::{DailyBar, StockInfo};
use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

const DATE_FMT: &str = "%Y%m%d";

pub struct TushareClient {
    http: Client,
    api_url: String,
    token: String,
    exchange: String,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    code: i64,
    msg: Option<String>,
    data: Option<ApiTable>,
}

/// Column-oriented result table as the API returns it
#[derive(Debug, Deserialize)]
struct ApiTable {
    fields: Vec<String>,
    items: Vec<Vec<Value>>,
}

impl ApiTable {
    fn col(&self, name: &str) -> Result<usize> {
        self.fields
            .iter()
            .position(|f| f == name)
            .ok_or_else(|| ArenaError::MarketData(format!("field {name} missing from response")))
    }
}

fn dec_cell(row: &[Value], idx: usize) -> Decimal {
    row.get(idx)
        .and_then(Value::as_f64)
        .and_then(|f| Decimal::try_from(f).ok())
        .unwrap_or(Decimal::ZERO)
}

fn str_cell(row: &[Value], idx: usize) -> String {
    row.get(idx)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

impl TushareClient {
    pub fn new(cfg: &TushareConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
            exchange: cfg.exchange.clone(),
        })
    }

    async fn call(&self, api_name: &str, params: Value, fields: &str) -> Result<ApiTable> {
        let body = json!({
            "api_name": api_name,
            "token": self.token,
            "params": params,
            "fields": fields,
        });

        let resp: ApiResponse = self
            .http
            .post(&self.api_url)
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if resp.code != 0 {
            return Err(ArenaError::MarketData(format!(
                "{api_name} failed: {}",
                resp.msg.unwrap_or_else(|| "unknown error".to_string())
            )));
        }
        resp.data
            .ok_or_else(|| ArenaError::MarketData(format!("{api_name}: empty payload")))
    }

    /// Free-float market caps for ranking the universe. Falls back through
    /// recent days because the current day's table is empty until close.
    async fn market_caps(&self) -> Result<Vec<(String, Decimal)>> {
        let today = Utc::now().date_naive();
        for back in 0..5u64 {
            let probe = today - Days::new(back);
            let table = self
                .call(
                    "daily_basic",
                    json!({ "trade_date": probe.format(DATE_FMT).to_string() }),
                    "ts_code,total_mv",
                )
                .await?;
            if !table.items.is_empty() {
                let code = table.col("ts_code")?;
                let mv = table.col("total_mv")?;
                return Ok(table
                    .items
                    .iter()
                    .map(|row| (str_cell(row, code), dec_cell(row, mv)))
                    .collect());
            }
            debug!(%probe, "daily_basic empty, probing previous day");
        }
        Ok(Vec::new())
    }
}

#[async_trait]
impl PriceSource for TushareClient {
    async fn daily_bar(&self, symbol: &str, date: NaiveDate) -> Result<Option<DailyBar>> {
        let table = self
            .call(
                "daily",
                json!({
                    "ts_code": symbol,
                    "trade_date": date.format(DATE_FMT).to_string(),
                }),
                "ts_code,trade_date,open,high,low,close,vol,pct_chg",
            )
            .await?;

        let Some(row) = table.items.first() else {
            return Ok(None);
        };

        Ok(Some(DailyBar {
            symbol: str_cell(row, table.col("ts_code")?),
            date,
            open: dec_cell(row, table.col("open")?),
            high: dec_cell(row, table.col("high")?),
            low: dec_cell(row, table.col("low")?),
            close: dec_cell(row, table.col("close")?),
            volume: dec_cell(row, table.col("vol")?),
            change_pct: dec_cell(row, table.col("pct_chg")?),
        }))
    }

    async fn trading_dates(&self, start: NaiveDate, end: NaiveDate) -> Result<Vec<NaiveDate>> {
        let table = self
            .call(
                "trade_cal",
                json!({
                    "exchange": self.exchange,
                    "start_date": start.format(DATE_FMT).to_string(),
                    "end_date": end.format(DATE_FMT).to_string(),
                    "is_open": "1",
                }),
                "cal_date,is_open",
            )
            .await?;

        let col = table.col("cal_date")?;
        let mut dates: Vec<NaiveDate> = table
            .items
            .iter()
            .filter_map(|row| {
                NaiveDate::parse_from_str(&str_cell(row, col), DATE_FMT).ok()
            })
            .collect();
        dates.sort_unstable();
        Ok(dates)
    }

    async fn universe(&self, limit: usize) -> Result<Vec<StockInfo>> {
        let table = self
            .call(
                "stock_basic",
                json!({ "list_status": "L" }),
                "ts_code,symbol,name,industry",
            )
            .await?;

        let code = table.col("ts_code")?;
        let name = table.col("name")?;
        let industry = table.col("industry")?;

        let mut stocks: Vec<(StockInfo, Decimal)> = table
            .items
            .iter()
            .map(|row| {
                (
                    StockInfo {
                        symbol: str_cell(row, code),
                        name: str_cell(row, name),
                        industry: str_cell(row, industry),
                    },
                    Decimal::ZERO,
                )
            })
            .collect();

        // Rank by market cap when the ranking table is available.
        let caps = self.market_caps().await.unwrap_or_default();
        if !caps.is_empty() {
            let by_code: std::collections::HashMap<&str, Decimal> =
                caps.iter().map(|(c, mv)| (c.as_str(), *mv)).collect();
            for (info, mv) in stocks.iter_mut() {
                if let Some(cap) = by_code.get(info.symbol.as_str()) {
                    *mv = *cap;
                }
            }
            stocks.sort_by(|a, b| b.1.cmp(&a.1));
        }

        Ok(stocks.into_iter().take(limit).map(|(info, _)| info).collect())
    }
}
