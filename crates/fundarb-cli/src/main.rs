//! fundarb - entry point

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use fundarb_cli::{AppConfig, Application, TradeReport};
use fundarb_client::OrderStatus;
use fundarb_core::{Price, Size};
use rust_decimal::Decimal;
use tracing::info;

/// Funding-rate arbitrage front end for the exchange API
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via FUNDARB_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,

    /// Print Prometheus metrics after the command
    #[arg(long)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply the exchange price precision rules
    FormatPrice {
        price: String,
        #[arg(long)]
        sz_decimals: u32,
    },
    /// Print mid prices
    Mids {
        /// Only this coin
        #[arg(long)]
        coin: Option<String>,
    },
    /// List perps by current funding rate, highest first
    Funding {
        #[arg(long, default_value_t = 9)]
        top: usize,
    },
    /// Sign a USDC permit and print the bridge deposit argument
    BridgePermit {
        #[arg(long)]
        usd: Decimal,
        /// The token's current `nonces(owner)`
        #[arg(long)]
        nonce: u64,
    },
    /// Print account summary and positions
    Account {
        #[arg(long)]
        user: Option<String>,
    },
    /// Open a short worth USD on COIN
    Open {
        #[arg(long)]
        coin: String,
        #[arg(long)]
        usd: Decimal,
        #[arg(long)]
        leverage: Option<u32>,
    },
    /// Buy back a short (reduce-only)
    Close {
        #[arg(long)]
        coin: String,
        /// Defaults to the full open short
        #[arg(long)]
        size: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    fundarb_telemetry::init_logging()?;

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = AppConfig::from_file(&config_path)?;
    info!(
        is_mainnet = config.is_mainnet,
        api_url = %config.api_url(),
        "Configuration loaded"
    );

    let app = Application::new(config)?;

    match args.command {
        Command::FormatPrice { price, sz_decimals } => {
            let price: Price = price.parse()?;
            println!("{}", app.format_price(price, sz_decimals));
        }
        Command::Mids { coin } => {
            let mut mids: Vec<_> = app.mids().await?.into_iter().collect();
            mids.sort_by(|a, b| a.0.cmp(&b.0));
            for (name, mid) in mids {
                if coin.as_deref().map_or(true, |c| c == name) {
                    println!("{name}\t{mid}");
                }
            }
        }
        Command::Funding { top } => {
            println!("{:<10} {:>14} {:>10}", "coin", "hourly", "apy %");
            for rate in app.funding(top).await? {
                println!(
                    "{:<10} {:>14} {:>10}",
                    rate.coin,
                    rate.hourly,
                    rate.annualized_pct.round_dp(2)
                );
            }
        }
        Command::BridgePermit { usd, nonce } => {
            let deposit = app.bridge_permit(usd, nonce).await?;
            println!("{}", serde_json::to_string_pretty(&[deposit])?);
        }
        Command::Account { user } => {
            let state = app.account(user.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        Command::Open {
            coin,
            usd,
            leverage,
        } => {
            let report = app.open_short(&coin, usd, leverage).await?;
            print_report(&report)?;
        }
        Command::Close { coin, size } => {
            let size = size.map(|s| s.parse::<Size>()).transpose()?;
            let report = app.close_short(&coin, size).await?;
            print_report(&report)?;
        }
    }

    if args.print_metrics {
        print!("{}", fundarb_telemetry::Metrics::render()?);
    }

    Ok(())
}

/// Fails when the exchange accepted the request but rejected the order.
fn print_report(report: &TradeReport) -> Result<()> {
    let side = if report.order.is_buy { "buy" } else { "sell" };
    println!(
        "{} {side} {} @ {} (asset {}, delegate {})",
        report.coin,
        report.order.size,
        report.order.limit_price,
        report.order.asset_index,
        report.delegate
    );
    for status in &report.statuses {
        match status {
            OrderStatus::Resting { oid } => println!("  resting oid={oid}"),
            OrderStatus::Filled {
                oid,
                total_sz,
                avg_px,
            } => println!("  filled oid={oid} size={total_sz} avg_px={avg_px}"),
            OrderStatus::Error(msg) => println!("  error: {msg}"),
        }
    }
    if let Some(msg) = report.order_error() {
        bail!("{} order rejected: {msg}", report.coin);
    }
    Ok(())
}
