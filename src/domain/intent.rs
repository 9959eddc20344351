use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::OrderSide;
use crate::error::{HypercopyError, Result};

/// Lifecycle action carried by a trade signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntentAction {
    #[serde(alias = "create", alias = "Create")]
    Create,
    #[serde(alias = "update", alias = "Update")]
    Update,
    #[serde(alias = "close", alias = "Close")]
    Close,
}

impl IntentAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentAction::Create => "CREATE",
            IntentAction::Update => "UPDATE",
            IntentAction::Close => "CLOSE",
        }
    }
}

impl std::fmt::Display for IntentAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IntentAction {
    type Err = HypercopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREATE" => Ok(IntentAction::Create),
            "UPDATE" => Ok(IntentAction::Update),
            "CLOSE" => Ok(IntentAction::Close),
            other => Err(HypercopyError::InvalidIntent(format!(
                "unknown action: {other}"
            ))),
        }
    }
}

/// Direction of the position a signal wants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    #[serde(alias = "long", alias = "Long", alias = "BUY", alias = "buy")]
    Long,
    #[serde(alias = "short", alias = "Short", alias = "SELL", alias = "sell")]
    Short,
}

impl Side {
    /// Order side that opens or adds to the position.
    pub fn entry_side(&self) -> OrderSide {
        match self {
            Side::Long => OrderSide::Buy,
            Side::Short => OrderSide::Sell,
        }
    }

    /// Order side that reduces the position (stops, targets, flattening).
    pub fn exit_side(&self) -> OrderSide {
        self.entry_side().opposite()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Long => "LONG",
            Side::Short => "SHORT",
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Side {
    type Err = HypercopyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LONG" | "BUY" => Ok(Side::Long),
            "SHORT" | "SELL" => Ok(Side::Short),
            other => Err(HypercopyError::InvalidIntent(format!("unknown side: {other}"))),
        }
    }
}

fn default_weight() -> Decimal {
    Decimal::ONE
}

/// One entry level of a signal: a limit price and its relative size weight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryLevel {
    pub price: Decimal,
    #[serde(default = "default_weight")]
    pub weight: Decimal,
}

impl EntryLevel {
    pub fn new(price: Decimal) -> Self {
        Self {
            price,
            weight: Decimal::ONE,
        }
    }

    pub fn weighted(price: Decimal, weight: Decimal) -> Self {
        Self { price, weight }
    }
}

/// Normalized instruction produced by the signal consumer for one
/// trader and one instrument.
///
/// Intents are consumed once and never retained. Re-delivering the same
/// intent is safe because every decision re-derives state from the venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeIntent {
    #[serde(alias = "trader_name")]
    pub trader: String,
    pub symbol: String,
    pub action: IntentAction,
    pub side: Side,
    #[serde(default)]
    pub entries: Vec<EntryLevel>,
    #[serde(default)]
    pub stop_loss: Option<Decimal>,
    #[serde(default)]
    pub take_profit: Option<Decimal>,
    /// Several targets; when present it replaces `take_profit`
    #[serde(default, alias = "take_profits")]
    pub take_profit_list: Vec<Decimal>,
    /// A reported exit price means the trade is over, whatever `action` says
    #[serde(default)]
    pub closed_price: Option<Decimal>,
    /// Overrides the configured risk; zero sizes every entry at the minimum notional
    #[serde(default)]
    pub risk_per_trade: Option<Decimal>,
}

impl TradeIntent {
    pub fn new(
        trader: impl Into<String>,
        symbol: impl Into<String>,
        action: IntentAction,
        side: Side,
    ) -> Self {
        Self {
            trader: trader.into(),
            symbol: symbol.into(),
            action,
            side,
            entries: Vec::new(),
            stop_loss: None,
            take_profit: None,
            take_profit_list: Vec::new(),
            closed_price: None,
            risk_per_trade: None,
        }
    }

    pub fn with_entries(mut self, entries: Vec<EntryLevel>) -> Self {
        self.entries = entries;
        self
    }

    pub fn with_stop_loss(mut self, price: Decimal) -> Self {
        self.stop_loss = Some(price);
        self
    }

    pub fn with_take_profit(mut self, price: Decimal) -> Self {
        self.take_profit = Some(price);
        self
    }

    pub fn with_take_profit_list(mut self, prices: Vec<Decimal>) -> Self {
        self.take_profit_list = prices;
        self
    }

    pub fn with_closed_price(mut self, price: Decimal) -> Self {
        self.closed_price = Some(price);
        self
    }

    pub fn with_risk_per_trade(mut self, risk: Decimal) -> Self {
        self.risk_per_trade = Some(risk);
        self
    }

    /// The lifecycle step to run. A closed price turns any intent into a CLOSE.
    pub fn effective_action(&self) -> IntentAction {
        if self.closed_price.is_some() {
            IntentAction::Close
        } else {
            self.action
        }
    }

    /// Take profit targets in order: the list if given, else the single target.
    pub fn take_profits(&self) -> Vec<Decimal> {
        if !self.take_profit_list.is_empty() {
            self.take_profit_list.clone()
        } else {
            self.take_profit.into_iter().collect()
        }
    }

    pub fn has_protection(&self) -> bool {
        self.stop_loss.is_some() || !self.take_profits().is_empty()
    }

    /// Structural checks that need no venue state.
    pub fn validate(&self) -> Result<()> {
        if self.trader.trim().is_empty() {
            return Err(HypercopyError::InvalidIntent("empty trader name".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(HypercopyError::InvalidIntent("empty symbol".into()));
        }
        if self.effective_action() == IntentAction::Close {
            return Ok(());
        }

        if self.action == IntentAction::Create && self.entries.is_empty() {
            return Err(HypercopyError::InvalidIntent(
                "CREATE requires at least one entry".into(),
            ));
        }
        if let Some(risk) = self.risk_per_trade {
            if risk < Decimal::ZERO {
                return Err(HypercopyError::InvalidIntent(format!(
                    "risk per trade must not be negative, got {risk}"
                )));
            }
        }

        for entry in &self.entries {
            if entry.price <= Decimal::ZERO {
                return Err(HypercopyError::InvalidIntent(format!(
                    "entry price must be positive, got {}",
                    entry.price
                )));
            }
            if entry.weight <= Decimal::ZERO {
                return Err(HypercopyError::InvalidIntent(format!(
                    "entry weight must be positive, got {}",
                    entry.weight
                )));
            }
        }

        if let Some(sl) = self.stop_loss {
            if sl <= Decimal::ZERO {
                return Err(HypercopyError::InvalidIntent(format!(
                    "stop loss must be positive, got {sl}"
                )));
            }
            if let Some(bad) = self.entries.iter().find(|e| !self.protects(sl, e.price)) {
                return Err(HypercopyError::InvalidIntent(format!(
                    "stop loss {sl} is on the wrong side of {} entry {}",
                    self.side, bad.price
                )));
            }
        }

        for tp in self.take_profits() {
            if tp <= Decimal::ZERO {
                return Err(HypercopyError::InvalidIntent(format!(
                    "take profit must be positive, got {tp}"
                )));
            }
            if let Some(bad) = self.entries.iter().find(|e| self.protects(tp, e.price)) {
                return Err(HypercopyError::InvalidIntent(format!(
                    "take profit {tp} is on the wrong side of {} entry {}",
                    self.side, bad.price
                )));
            }
        }

        Ok(())
    }

    // A stop sits below entries for longs and above for shorts.
    fn protects(&self, stop: Decimal, entry: Decimal) -> bool {
        match self.side {
            Side::Long => stop < entry,
            Side::Short => stop > entry,
        }
    }
}

/// (trader, venue symbol) pair; intents sharing a key touch the same orders
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IntentKey {
    pub trader: String,
    pub symbol: String,
}
