//! Risk-based order sizing.
//!
//! Each entry order risks `risk_per_trade` dollars if the stop is hit:
//! `size = (risk / stop_distance_fraction) / avg_entry`. Every order also
//! meets the venue minimum notional.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::SizingConfig;
use crate::domain::EntryLevel;
use crate::error::{HypercopyError, Result};

/// One entry order with its concrete size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizedEntry {
    pub price: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone)]
pub struct PositionSizer {
    risk_per_trade: Decimal,
    min_notional: Decimal,
}

fn overflow(what: &str) -> HypercopyError {
    HypercopyError::InvalidIntent(format!("{what} is out of range for sizing"))
}

impl PositionSizer {
    pub fn new(risk_per_trade: Decimal, min_notional: Decimal) -> Self {
        Self {
            risk_per_trade,
            min_notional,
        }
    }

    pub fn from_config(config: &SizingConfig) -> Self {
        Self::new(config.risk_per_trade_usd, config.min_order_notional_usd)
    }

    /// Same minimum notional, different risk. Zero risk sizes every entry
    /// at the minimum notional.
    pub fn with_risk(&self, risk_per_trade: Decimal) -> Self {
        Self::new(risk_per_trade, self.min_notional)
    }

    pub fn risk_per_trade(&self) -> Decimal {
        self.risk_per_trade
    }

    /// Size each entry. Returns an empty plan for empty input.
    pub fn size_entries(
        &self,
        entries: &[EntryLevel],
        stop_loss: Option<Decimal>,
    ) -> Result<Vec<SizedEntry>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        let sum = entries
            .iter()
            .try_fold(Decimal::ZERO, |acc, e| acc.checked_add(e.price))
            .ok_or_else(|| overflow("entry price sum"))?;
        let avg_entry = sum
            .checked_div(Decimal::from(entries.len()))
            .ok_or_else(|| overflow("average entry"))?;
        let base = self.base_size(avg_entry, stop_loss)?;

        entries
            .iter()
            .map(|entry| {
                let mut size = base
                    .checked_mul(entry.weight)
                    .ok_or_else(|| overflow("weighted size"))?;
                let notional = size
                    .checked_mul(entry.price)
                    .ok_or_else(|| overflow("entry notional"))?;
                if notional < self.min_notional {
                    size = self
                        .min_notional
                        .checked_div(entry.price)
                        .ok_or_else(|| overflow("minimum size"))?;
                }
                Ok(SizedEntry {
                    price: entry.price,
                    size,
                })
            })
            .collect()
    }

    fn base_size(&self, avg_entry: Decimal, stop_loss: Option<Decimal>) -> Result<Decimal> {
        if avg_entry <= Decimal::ZERO {
            return Ok(Decimal::ZERO);
        }
        let floor = self
            .min_notional
            .checked_div(avg_entry)
            .ok_or_else(|| overflow("minimum size"))?;

        let stop_distance = match stop_loss {
            Some(stop) => avg_entry
                .checked_sub(stop)
                .ok_or_else(|| overflow("stop distance"))?
                .abs(),
            None => return Ok(floor),
        };
        if stop_distance.is_zero() || self.risk_per_trade <= Decimal::ZERO {
            return Ok(floor);
        }

        // (risk / (distance / avg)) / avg reduces to risk / distance.
        let size = self
            .risk_per_trade
            .checked_div(stop_distance)
            .ok_or_else(|| overflow("risk over stop distance"))?;
        Ok(size.max(floor))
    }
}

/// Split `size` into `parts` near-equal slices; the last slice takes the
/// remainder so the slices always sum to `size`.
pub fn split_size(size: Decimal, parts: usize) -> Vec<Decimal> {
    if parts == 0 {
        return Vec::new();
    }
    let slice = size / Decimal::from(parts);
    let mut out = vec![slice; parts - 1];
    out.push(size - slice * Decimal::from(parts - 1));
    out
}
