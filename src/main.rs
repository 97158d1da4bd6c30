//! LLM Trading Arena
//!
//! Runs simulated day-by-day trading competitions between configured
//! decision-makers against real market data.

use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::sync::Arc;
use trading_arena::{
    agents::{DecisionMaker, LlmAgent, MomentumAgent, RandomAgent},
    config::{AgentConfig, Config},
    engine::FeeSchedule,
    market::{CachedSource, PriceSource, TushareClient},
    sim::Arena,
    state::StateStore,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "trading-arena")]
#[command(about = "Simulated trading competition between LLM and baseline agents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path
    #[arg(short, long, default_value = "arena.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the competition over the most recent trading days
    Run {
        /// Comma-separated agent names (default: all configured)
        #[arg(long)]
        agents: Option<String>,

        /// Number of trading days to simulate (default from config)
        #[arg(long)]
        days: Option<usize>,

        /// Resume from per-agent checkpoints where available
        #[arg(long)]
        resume: bool,
    },
    /// List configured agents
    Agents,
    /// Show the most recent trading dates
    Dates {
        /// How many dates to show
        #[arg(short, long, default_value = "10")]
        days: usize,
    },
    /// Fetch one day's bar for a symbol
    Quote {
        /// Symbol, e.g. 600000.SH
        symbol: String,
        /// Date (YYYY-MM-DD); defaults to the latest trading date
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Run {
            agents,
            days,
            resume,
        } => run_arena(config, agents, days, resume).await,
        Commands::Agents => list_agents(config),
        Commands::Dates { days } => show_dates(config, days).await,
        Commands::Quote { symbol, date } => show_quote(config, &symbol, date).await,
    }
}

fn build_source(config: &Config) -> anyhow::Result<Arc<dyn PriceSource>> {
    let tushare = config
        .tushare
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("tushare not configured in arena.toml"))?;
    let client = TushareClient::new(tushare)?;
    Ok(Arc::new(CachedSource::new(Arc::new(client))))
}

/// Most recent `n` open trading dates, probing the last ~90 calendar days.
async fn recent_trading_dates(
    source: &dyn PriceSource,
    n: usize,
) -> anyhow::Result<Vec<NaiveDate>> {
    let end = Utc::now().date_naive();
    let start = end - Days::new(90);
    let mut dates = source.trading_dates(start, end).await?;
    if dates.is_empty() {
        anyhow::bail!("trading calendar returned no open dates");
    }
    if dates.len() > n {
        dates = dates.split_off(dates.len() - n);
    }
    Ok(dates)
}

fn build_agents(
    config: &Config,
    filter: Option<&str>,
) -> anyhow::Result<Vec<Box<dyn DecisionMaker>>> {
    let wanted: Option<Vec<&str>> =
        filter.map(|list| list.split(',').map(str::trim).collect());

    let mut agents: Vec<Box<dyn DecisionMaker>> = Vec::new();
    for agent_config in &config.agents {
        if let Some(wanted) = &wanted {
            if !wanted.contains(&agent_config.name()) {
                continue;
            }
        }
        match agent_config {
            AgentConfig::Llm { name, model } => {
                let Some(llm) = &config.llm else {
                    tracing::warn!(agent = %name, "llm not configured, skipping agent");
                    continue;
                };
                match LlmAgent::from_config(name.clone(), llm, model.clone()) {
                    Ok(agent) => agents.push(Box::new(agent)),
                    Err(e) => tracing::warn!(agent = %name, "failed to build llm agent: {e}"),
                }
            }
            AgentConfig::Random { name, seed } => {
                agents.push(Box::new(RandomAgent::new(name.clone(), *seed)));
            }
            AgentConfig::Momentum {
                name,
                stop_loss_pct,
            } => {
                agents.push(Box::new(MomentumAgent::new(name.clone(), *stop_loss_pct)));
            }
        }
    }
    if agents.is_empty() {
        anyhow::bail!("no agents to run; check [agents] in arena.toml");
    }
    Ok(agents)
}

async fn run_arena(
    config: Config,
    agents: Option<String>,
    days: Option<usize>,
    resume: bool,
) -> anyhow::Result<()> {
    tracing::info!("Starting trading arena");

    let source = build_source(&config)?;
    let days = days.unwrap_or(config.sim.trading_days);
    let dates = recent_trading_dates(source.as_ref(), days).await?;
    tracing::info!(
        "Simulating {} trading days: {} .. {}",
        dates.len(),
        dates[0],
        dates[dates.len() - 1]
    );

    let state_dir = shellexpand::tilde(&config.sim.state_dir).to_string();
    let output_dir = shellexpand::tilde(&config.sim.output_dir).to_string();

    let mut arena = Arena::new(
        Arc::clone(&source),
        config.sim.clone(),
        FeeSchedule::from(&config.fees),
    )
    .with_state_store(StateStore::new(&state_dir));

    for agent in build_agents(&config, agents.as_deref())? {
        arena.register(agent);
    }

    let report = arena.run(&dates, resume).await?;
    report.export(Path::new(&output_dir)).await?;

    println!("\n🏁 Final rankings ({} .. {}):\n", report.start_date, report.end_date);
    println!(
        "{:<4} {:<24} {:>16} {:>10} {:>8}",
        "#", "Agent", "Total assets", "Return", "Trades"
    );
    println!("{}", "-".repeat(68));
    for entry in &report.rankings {
        println!(
            "{:<4} {:<24} {:>16.2} {:>9.2}% {:>8}",
            entry.rank, entry.name, entry.total_assets, entry.return_pct, entry.trades_count
        );
    }
    if let Some(last) = report.benchmark.last() {
        println!(
            "\nBenchmark {}: {:+.2}% over the same period",
            report.benchmark_symbol, last.return_pct
        );
    }
    println!("\nReports written to {output_dir}");

    Ok(())
}

fn list_agents(config: Config) -> anyhow::Result<()> {
    if config.agents.is_empty() {
        println!("No agents configured.");
        return Ok(());
    }
    println!("\nConfigured agents:\n");
    for agent in &config.agents {
        let kind = match agent {
            AgentConfig::Llm { model, .. } => format!(
                "llm ({})",
                model
                    .clone()
                    .or_else(|| config.llm.as_ref().and_then(|l| l.model.clone()))
                    .unwrap_or_else(|| "no model".to_string())
            ),
            AgentConfig::Random { seed, .. } => match seed {
                Some(seed) => format!("random (seed {seed})"),
                None => "random".to_string(),
            },
            AgentConfig::Momentum { stop_loss_pct, .. } => {
                format!("momentum (stop {stop_loss_pct}%)")
            }
        };
        println!("  {:<24} {}", agent.name(), kind);
    }
    Ok(())
}

async fn show_dates(config: Config, days: usize) -> anyhow::Result<()> {
    let source = build_source(&config)?;
    let dates = recent_trading_dates(source.as_ref(), days).await?;
    println!("\nMost recent {} trading dates:\n", dates.len());
    for (i, date) in dates.iter().enumerate() {
        println!("  Day {:>2}: {}", i + 1, date);
    }
    Ok(())
}

async fn show_quote(
    config: Config,
    symbol: &str,
    date: Option<NaiveDate>,
) -> anyhow::Result<()> {
    let source = build_source(&config)?;
    let date = match date {
        Some(date) => date,
        None => *recent_trading_dates(source.as_ref(), 1)
            .await?
            .first()
            .ok_or_else(|| anyhow::anyhow!("no trading dates available"))?,
    };

    match source.daily_bar(symbol, date).await? {
        Some(bar) => {
            println!("\n📊 {} on {}\n", bar.symbol, bar.date);
            println!("  Open:   {:.2}", bar.open);
            println!("  High:   {:.2}", bar.high);
            println!("  Low:    {:.2}", bar.low);
            println!("  Close:  {:.2}", bar.close);
            println!("  Volume: {:.0}", bar.volume);
            println!("  Change: {:+.2}%", bar.change_pct);
        }
        None => println!("No bar for {symbol} on {date}"),
    }
    Ok(())
}
