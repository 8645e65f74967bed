//! # Price Board
//!
//! Command-line view over the token price cache: current prices, holding
//! values and client profit/loss, the same figures the dashboards render.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin price_board -- price Bitcoin
//! cargo run --bin price_board -- holdings Ethereum 30 --rounds 3 --interval-secs 20
//! cargo run --bin price_board -- positions data/clients.json --json
//! ```
//!
//! `--rounds` repeats the query through one cache instance, which shows the
//! `refreshed` -> `fresh` -> `refreshed` cycle as the TTL expires.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use token_price_cache::{
    portfolio, ClientPosition, FiatConverter, HoldingsValuation, PositionReport, PriceCache,
    PriceLookup, PriceSource, Settings,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// Settings file (TOML); missing file means defaults
    #[arg(long, default_value = "Config.toml", global = true)]
    config: String,

    /// How many times to run the query
    #[arg(long, default_value_t = 1, global = true)]
    rounds: u32,

    /// Pause between rounds
    #[arg(long, default_value_t = 5, global = true)]
    interval_secs: u64,

    /// Print JSON instead of a table
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Current USD price of one token
    Price { token: String },

    /// Value of a quantity of one token
    Holdings { token: String, quantity: f64 },

    /// Value and profit/loss for every client in a JSON file
    Positions { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let settings = Settings::from_file(&cli.config)
        .with_context(|| format!("loading settings from {}", cli.config))?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(settings.log.level.as_str()))
        .init();

    let cache = Arc::new(PriceCache::from_settings(&settings)?);
    let converter = FiatConverter::from_settings(&settings.conversion);

    let positions = match &cli.cmd {
        Command::Positions { file } => Some(load_positions(file)?),
        _ => None,
    };

    for round in 1..=cli.rounds {
        if cli.rounds > 1 && !cli.json {
            println!("{}", format!("── round {}/{} ──", round, cli.rounds).dimmed());
        }

        match &cli.cmd {
            Command::Price { token } => {
                let lookup = cache.get_price(token).await;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&lookup)?);
                } else {
                    print_lookup(token, &lookup);
                }
            }
            Command::Holdings { token, quantity } => {
                let valuation = cache.calculate_holdings(token, *quantity).await;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&valuation)?);
                } else {
                    print_valuation(&valuation);
                }
            }
            Command::Positions { .. } => {
                let positions = positions.as_deref().unwrap_or_default();
                let reports = portfolio::value_positions(&cache, &converter, positions).await?;
                if cli.json {
                    println!("{}", serde_json::to_string_pretty(&reports)?);
                } else {
                    for report in &reports {
                        print_report(report);
                    }
                }
            }
        }

        if round < cli.rounds {
            sleep(Duration::from_secs(cli.interval_secs)).await;
        }
    }

    let metrics = cache.metrics();
    log::info!(
        "cache: {} fresh, {} refreshed, {} stale, {} unavailable, {} coalesced, {} unsupported (hit rate {:.0}%)",
        metrics.fresh_hits,
        metrics.refreshes,
        metrics.stale_served,
        metrics.unavailable,
        metrics.coalesced,
        metrics.unsupported,
        metrics.hit_rate * 100.0
    );

    Ok(())
}

fn load_positions(path: &PathBuf) -> Result<Vec<ClientPosition>> {
    let raw = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let positions = serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    Ok(positions)
}

fn source_label(source: PriceSource) -> colored::ColoredString {
    match source {
        PriceSource::Fresh => source.as_str().green(),
        PriceSource::Refreshed => source.as_str().cyan(),
        PriceSource::Stale => source.as_str().yellow(),
        PriceSource::Unavailable => source.as_str().red(),
    }
}

fn updated_label(lookup_time: Option<chrono::DateTime<chrono::Utc>>) -> String {
    lookup_time
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "never".to_string())
}

fn print_lookup(token: &str, lookup: &PriceLookup) {
    if lookup.source.has_price() {
        println!(
            "{:<12} ${:>14.4}  [{}]  updated {}",
            token,
            lookup.price,
            source_label(lookup.source),
            updated_label(lookup.last_updated)
        );
    } else {
        println!("{:<12} {:>15}  [{}]", token, "no data", source_label(lookup.source));
    }
}

fn print_valuation(valuation: &HoldingsValuation) {
    println!(
        "{:<12} {:>10} x ${:<12.4} = ${:>14.2}  [{}]  updated {}",
        valuation.token_id,
        valuation.tokens_held,
        valuation.current_price,
        valuation.total_value,
        source_label(valuation.data_source),
        updated_label(valuation.last_updated)
    );
}

fn print_report(report: &PositionReport) {
    let pl = &report.profit_loss;
    let pl_text = format!("{:+.2} ({:+.2}%)", pl.profit_loss, pl.profit_loss_percentage);
    let pl_text = if !report.holdings.data_source.has_price() {
        "n/a".dimmed()
    } else if pl.is_gain() {
        pl_text.green()
    } else {
        pl_text.red()
    };

    println!(
        "{:<10} {:<10} invested {:>10.2} {} (${:>10.2})  value ${:>12.2}  P/L {}  [{}]",
        report.name,
        report.holdings.token_id,
        report.amount_invested,
        report.currency,
        pl.converted_investment,
        report.holdings.total_value,
        pl_text,
        source_label(report.holdings.data_source)
    );
}
