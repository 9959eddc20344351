use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::{EntryLevel, IntentAction, Side, TradeIntent};
use crate::error::{HypercopyError, Result};

#[derive(Parser)]
#[command(name = "hypercopy")]
#[command(version)]
#[command(about = "Mirror followed traders' signals onto Hyperliquid sub-accounts", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and environment overrides
    #[arg(short, long, env = "HYPERCOPY_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve credentials, connect every sub-account and report
    Check,
    /// Apply intents from a file (JSON array or one JSON object per line)
    Apply {
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Read JSON-lines intents from stdin until EOF or Ctrl+C
    Run,
    /// Apply a single intent described by flags
    Intent {
        /// Followed trader name (e.g. Perdu)
        #[arg(short, long)]
        trader: String,
        /// Signal symbol (e.g. BTC/USDT)
        #[arg(short, long)]
        symbol: String,
        /// CREATE, UPDATE or CLOSE
        #[arg(short, long)]
        action: IntentAction,
        /// LONG or SHORT
        #[arg(long, default_value = "LONG")]
        side: Side,
        /// Entry level as PRICE or PRICE:WEIGHT, repeatable
        #[arg(short, long = "entry", value_parser = parse_entry)]
        entries: Vec<EntryLevel>,
        #[arg(long)]
        stop_loss: Option<Decimal>,
        /// Take profit target, repeatable
        #[arg(long = "take-profit")]
        take_profits: Vec<Decimal>,
        /// Risk per trade in USD for this intent; 0 sizes at the minimum notional
        #[arg(long)]
        risk: Option<Decimal>,
    },
    /// Print the venue's open orders and position for a trader and symbol
    State {
        #[arg(short, long)]
        trader: String,
        #[arg(short, long)]
        symbol: String,
    },
}

impl Commands {
    /// Build the intent for the `intent` subcommand.
    pub fn to_intent(&self) -> Option<TradeIntent> {
        match self {
            Commands::Intent {
                trader,
                symbol,
                action,
                side,
                entries,
                stop_loss,
                take_profits,
                risk,
            } => {
                let mut intent = TradeIntent::new(trader.clone(), symbol.clone(), *action, *side)
                    .with_entries(entries.clone());
                intent.stop_loss = *stop_loss;
                match take_profits.as_slice() {
                    [single] => intent.take_profit = Some(*single),
                    many => intent.take_profit_list = many.to_vec(),
                }
                intent.risk_per_trade = *risk;
                Some(intent)
            }
            _ => None,
        }
    }
}

/// Parse `PRICE` or `PRICE:WEIGHT`.
pub fn parse_entry(raw: &str) -> std::result::Result<EntryLevel, String> {
    let (price, weight) = match raw.split_once(':') {
        Some((p, w)) => (p, Some(w)),
        None => (raw, None),
    };
    let price = Decimal::from_str(price.trim()).map_err(|e| format!("bad price {price:?}: {e}"))?;
    match weight {
        Some(w) => {
            let weight =
                Decimal::from_str(w.trim()).map_err(|e| format!("bad weight {w:?}: {e}"))?;
            Ok(EntryLevel::weighted(price, weight))
        }
        None => Ok(EntryLevel::new(price)),
    }
}

/// Parse intents from file contents: either a JSON array or JSON-lines.
/// Blank lines and `#` comments are skipped in the line form.
pub fn parse_intents(text: &str) -> Result<Vec<TradeIntent>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| {
            serde_json::from_str(line).map_err(|e| {
                HypercopyError::InvalidIntent(format!("line {}: {}", idx + 1, e))
            })
        })
        .collect()
}
