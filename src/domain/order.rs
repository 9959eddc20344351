use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Side;
use crate::error::{HypercopyError, Result};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, OrderSide::Buy)
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good Till Cancelled
    #[serde(alias = "GTC", alias = "gtc")]
    Gtc,
    /// Immediate Or Cancel
    #[serde(alias = "IOC", alias = "ioc")]
    Ioc,
    /// Add Liquidity Only (post-only)
    #[serde(alias = "ALO", alias = "alo")]
    Alo,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "Gtc",
            TimeInForce::Ioc => "Ioc",
            TimeInForce::Alo => "Alo",
        }
    }
}

/// What a conditional order protects against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriggerKind {
    StopLoss,
    TakeProfit,
    None,
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerKind::StopLoss => write!(f, "STOP_LOSS"),
            TriggerKind::TakeProfit => write!(f, "TAKE_PROFIT"),
            TriggerKind::None => write!(f, "NONE"),
        }
    }
}

/// Venue-reported order state. Only live orders are ever reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Open,
    TriggerPending,
}

/// Dormant activation condition attached to a resting order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerSpec {
    pub trigger_price: Decimal,
    pub kind: TriggerKind,
    /// Execute at market once the trigger price is touched.
    pub market_on_trigger: bool,
}

/// Order request (what we want the venue to do)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub client_order_id: String,
    /// Venue-format symbol, e.g. `BTC/USDC:USDC`
    pub symbol: String,
    pub side: OrderSide,
    pub size: Decimal,
    pub limit_price: Decimal,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub reduce_only: bool,
    pub trigger: Option<TriggerSpec>,
}

fn new_client_order_id() -> String {
    format!("0x{}", Uuid::new_v4().simple())
}

impl OrderRequest {
    pub fn limit(
        symbol: impl Into<String>,
        side: OrderSide,
        size: Decimal,
        price: Decimal,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            client_order_id: new_client_order_id(),
            symbol: symbol.into(),
            side,
            size,
            limit_price: price,
            order_type: OrderType::Limit,
            time_in_force,
            reduce_only: false,
            trigger: None,
        }
    }

    /// Reduce-only conditional order that rests until `trigger_price` trades.
    ///
    /// The order class stays `Limit`; the venue holds it dormant and fills
    /// it at market on activation.
    pub fn trigger(
        symbol: impl Into<String>,
        side: OrderSide,
        size: Decimal,
        trigger_price: Decimal,
        kind: TriggerKind,
    ) -> Self {
        Self {
            client_order_id: new_client_order_id(),
            symbol: symbol.into(),
            side,
            size,
            limit_price: trigger_price,
            order_type: OrderType::Limit,
            time_in_force: TimeInForce::Gtc,
            reduce_only: true,
            trigger: Some(TriggerSpec {
                trigger_price,
                kind,
                market_on_trigger: true,
            }),
        }
    }

    /// Reduce-only immediate order. `worst_price` bounds the fill.
    pub fn market_close(
        symbol: impl Into<String>,
        side: OrderSide,
        size: Decimal,
        worst_price: Decimal,
    ) -> Self {
        Self {
            client_order_id: new_client_order_id(),
            symbol: symbol.into(),
            side,
            size,
            limit_price: worst_price,
            order_type: OrderType::Market,
            time_in_force: TimeInForce::Ioc,
            reduce_only: true,
            trigger: None,
        }
    }

    /// Replace the limit price, e.g. to bound how far a triggered market
    /// execution may slip.
    pub fn with_worst_price(mut self, price: Decimal) -> Self {
        self.limit_price = price;
        self
    }

    pub fn is_trigger(&self) -> bool {
        self.trigger.is_some()
    }

    pub fn validate(&self) -> Result<()> {
        if self.size <= Decimal::ZERO {
            return Err(HypercopyError::InvalidOrder(format!(
                "size must be positive, got {}",
                self.size
            )));
        }
        if self.limit_price <= Decimal::ZERO {
            return Err(HypercopyError::InvalidOrder(format!(
                "price must be positive, got {}",
                self.limit_price
            )));
        }
        if let Some(trigger) = &self.trigger {
            // An immediate order with a trigger would execute now instead of
            // waiting for the condition.
            if self.order_type == OrderType::Market || self.time_in_force == TimeInForce::Ioc {
                return Err(HypercopyError::InvalidOrder(
                    "trigger orders must rest; market/IOC with a trigger is refused".into(),
                ));
            }
            if trigger.kind == TriggerKind::None {
                return Err(HypercopyError::InvalidOrder(
                    "trigger order without a trigger kind".into(),
                ));
            }
            if trigger.trigger_price <= Decimal::ZERO {
                return Err(HypercopyError::InvalidOrder(format!(
                    "trigger price must be positive, got {}",
                    trigger.trigger_price
                )));
            }
        }
        Ok(())
    }
}

/// Live order as reported by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    pub order_id: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub price: Decimal,
    pub size: Decimal,
    pub status: OrderStatus,
    pub is_trigger: bool,
    pub trigger_kind: TriggerKind,
    pub reduce_only: bool,
}

impl ExchangeOrder {
    /// Whether this order belongs to the `side` position: entries on the
    /// entry side, protective triggers on the exit side.
    pub fn belongs_to(&self, side: Side) -> bool {
        if self.is_trigger || self.reduce_only {
            self.side == side.exit_side()
        } else {
            self.side == side.entry_side()
        }
    }
}

/// Open position as reported by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: Side,
    /// Absolute size in base units
    pub size: Decimal,
    pub entry_price: Option<Decimal>,
}

impl Position {
    /// Build from the venue's signed size; zero means no position.
    pub fn from_signed(
        symbol: impl Into<String>,
        signed_size: Decimal,
        entry_price: Option<Decimal>,
    ) -> Option<Self> {
        if signed_size.is_zero() {
            return None;
        }
        let side = if signed_size.is_sign_positive() {
            Side::Long
        } else {
            Side::Short
        };
        Some(Self {
            symbol: symbol.into(),
            side,
            size: signed_size.abs(),
            entry_price,
        })
    }
}

/// Venue acknowledgement of an accepted placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementAck {
    Resting {
        order_id: u64,
    },
    Filled {
        order_id: u64,
        total_size: Decimal,
        avg_price: Decimal,
    },
    /// Accepted without an order id yet (e.g. `waitingForTrigger`)
    Pending {
        status: String,
    },
}

impl PlacementAck {
    pub fn order_id(&self) -> Option<u64> {
        match self {
            PlacementAck::Resting { order_id } | PlacementAck::Filled { order_id, .. } => {
                Some(*order_id)
            }
            PlacementAck::Pending { .. } => None,
        }
    }
}

impl std::fmt::Display for PlacementAck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlacementAck::Resting { order_id } => write!(f, "resting oid={order_id}"),
            PlacementAck::Filled {
                order_id,
                total_size,
                avg_price,
            } => write!(f, "filled oid={order_id} size={total_size} avg={avg_price}"),
            PlacementAck::Pending { status } => write!(f, "accepted ({status})"),
        }
    }
}

/// Result of cancelling a single order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancelOutcome {
    Canceled,
    /// The order was already canceled, filled, or never existed
    AlreadyGone,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn trigger_orders_rest_as_limit_and_reduce_only() {
        let req = OrderRequest::trigger(
            "BTC/USDC:USDC",
            OrderSide::Sell,
            dec!(0.001),
            dec!(59000),
            TriggerKind::StopLoss,
        );
        assert_eq!(req.order_type, OrderType::Limit);
        assert_eq!(req.time_in_force, TimeInForce::Gtc);
        assert!(req.reduce_only);
        assert!(req.is_trigger());
        assert!(req.validate().is_ok());
    }

    #[test]
    fn market_with_trigger_is_refused() {
        let mut req = OrderRequest::trigger(
            "BTC/USDC:USDC",
            OrderSide::Sell,
            dec!(0.001),
            dec!(59000),
            TriggerKind::StopLoss,
        );
        req.order_type = OrderType::Market;
        assert!(matches!(
            req.validate(),
            Err(HypercopyError::InvalidOrder(_))
        ));
    }

    #[test]
    fn trigger_without_kind_is_refused() {
        let req = OrderRequest::trigger(
            "BTC/USDC:USDC",
            OrderSide::Sell,
            dec!(0.001),
            dec!(59000),
            TriggerKind::None,
        );
        assert!(req.validate().is_err());
    }

    #[test]
    fn zero_size_is_refused() {
        let req = OrderRequest::limit(
            "BTC/USDC:USDC",
            OrderSide::Buy,
            Decimal::ZERO,
            dec!(60000),
            TimeInForce::Gtc,
        );
        assert!(req.validate().is_err());
    }

    #[test]
    fn client_order_ids_are_128_bit_hex() {
        let req = OrderRequest::limit(
            "ETH/USDC:USDC",
            OrderSide::Buy,
            dec!(1),
            dec!(3000),
            TimeInForce::Gtc,
        );
        assert!(req.client_order_id.starts_with("0x"));
        assert_eq!(req.client_order_id.len(), 34);
    }

    #[test]
    fn position_from_signed_size() {
        let short = Position::from_signed("ETH/USDC:USDC", dec!(-2.5), Some(dec!(3000)))
            .expect("short position");
        assert_eq!(short.side, Side::Short);
        assert_eq!(short.size, dec!(2.5));
        assert!(Position::from_signed("ETH/USDC:USDC", dec!(0.0), None).is_none());
    }

    #[test]
    fn orders_are_attributed_to_position_side() {
        let entry = ExchangeOrder {
            order_id: 1,
            symbol: "BTC/USDC:USDC".into(),
            side: OrderSide::Buy,
            price: dec!(60000),
            size: dec!(0.001),
            status: OrderStatus::Open,
            is_trigger: false,
            trigger_kind: TriggerKind::None,
            reduce_only: false,
        };
        let stop = ExchangeOrder {
            order_id: 2,
            side: OrderSide::Sell,
            status: OrderStatus::TriggerPending,
            is_trigger: true,
            trigger_kind: TriggerKind::StopLoss,
            reduce_only: true,
            ..entry.clone()
        };
        assert!(entry.belongs_to(Side::Long));
        assert!(stop.belongs_to(Side::Long));
        assert!(!entry.belongs_to(Side::Short));
        assert!(!stop.belongs_to(Side::Short));
    }
}
