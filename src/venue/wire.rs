//! Exchange action payloads, number formatting and response decoding.
//!
//! Field order in the action structs is significant: the signature covers
//! the msgpack encoding, which preserves declaration order.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{OrderRequest, OrderType, PlacementAck, TriggerKind};
use crate::error::{HypercopyError, Result};
use crate::venue::meta::AssetInfo;

const PRICE_SIG_FIGS: u32 = 5;
const PERP_MAX_DECIMALS: u32 = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LimitWire {
    pub tif: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerWire {
    pub is_market: bool,
    pub trigger_px: String,
    pub tpsl: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OrderTypeWire {
    Limit(LimitWire),
    Trigger(TriggerWire),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWire {
    pub a: u32,
    pub b: bool,
    pub p: String,
    pub s: String,
    pub r: bool,
    pub t: OrderTypeWire,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub c: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub orders: Vec<OrderWire>,
    pub grouping: &'static str,
}

impl OrderAction {
    pub fn single(order: OrderWire) -> Self {
        Self {
            kind: "order",
            orders: vec![order],
            grouping: "na",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelWire {
    pub a: u32,
    pub o: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelAction {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub cancels: Vec<CancelWire>,
}

impl CancelAction {
    pub fn single(asset: u32, order_id: u64) -> Self {
        Self {
            kind: "cancel",
            cancels: vec![CancelWire {
                a: asset,
                o: order_id,
            }],
        }
    }
}

/// Render a decimal the way the venue expects: no exponent, no trailing zeros.
pub fn wire_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Decimal places allowed for a price: 5 significant figures, at most
/// `6 - sz_decimals` decimals. Whole-number prices are always accepted.
fn price_decimals(price: Decimal, sz_decimals: u32) -> u32 {
    let max_decimals = PERP_MAX_DECIMALS.saturating_sub(sz_decimals);
    let abs = price.abs();
    let sig_decimals = if abs >= Decimal::ONE {
        let mut int_digits = 0u32;
        let mut v = abs.trunc();
        while v >= Decimal::ONE {
            v = (v / Decimal::TEN).trunc();
            int_digits += 1;
        }
        PRICE_SIG_FIGS.saturating_sub(int_digits)
    } else {
        let mut leading_zeros = 0u32;
        let mut v = abs;
        while !v.is_zero() && v < Decimal::new(1, 1) {
            v *= Decimal::TEN;
            leading_zeros += 1;
        }
        PRICE_SIG_FIGS + leading_zeros
    };
    sig_decimals.min(max_decimals)
}

pub fn round_price(price: Decimal, sz_decimals: u32) -> Decimal {
    if price.fract().is_zero() {
        return price.normalize();
    }
    price
        .round_dp_with_strategy(
            price_decimals(price, sz_decimals),
            RoundingStrategy::MidpointNearestEven,
        )
        .normalize()
}

/// Round a size to the asset's lot precision. Reduce-only sizes round down
/// so they never exceed the position; opening sizes round up so the minimum
/// notional survives rounding.
pub fn round_size(size: Decimal, sz_decimals: u32, reduce_only: bool) -> Decimal {
    let strategy = if reduce_only {
        RoundingStrategy::ToZero
    } else {
        RoundingStrategy::AwayFromZero
    };
    size.round_dp_with_strategy(sz_decimals, strategy).normalize()
}

fn tpsl(kind: TriggerKind) -> Result<&'static str> {
    match kind {
        TriggerKind::StopLoss => Ok("sl"),
        TriggerKind::TakeProfit => Ok("tp"),
        TriggerKind::None => Err(HypercopyError::InvalidOrder(
            "trigger order without a trigger kind".into(),
        )),
    }
}

/// Encode a validated request for `asset`.
pub fn order_wire(request: &OrderRequest, asset: AssetInfo) -> Result<OrderWire> {
    request.validate()?;

    let t = match (&request.trigger, request.order_type) {
        (Some(trigger), OrderType::Limit) => OrderTypeWire::Trigger(TriggerWire {
            is_market: trigger.market_on_trigger,
            trigger_px: wire_decimal(round_price(trigger.trigger_price, asset.sz_decimals)),
            tpsl: tpsl(trigger.kind)?,
        }),
        (Some(_), OrderType::Market) => {
            return Err(HypercopyError::InvalidOrder(
                "market order with a trigger".into(),
            ))
        }
        // Market orders are aggressive IOC limits bounded by the worst price.
        (None, OrderType::Market) => OrderTypeWire::Limit(LimitWire { tif: "Ioc" }),
        (None, OrderType::Limit) => OrderTypeWire::Limit(LimitWire {
            tif: request.time_in_force.as_str(),
        }),
    };

    let size = round_size(request.size, asset.sz_decimals, request.reduce_only);
    if size.is_zero() {
        return Err(HypercopyError::InvalidOrder(format!(
            "size {} rounds to zero at {} decimals",
            request.size, asset.sz_decimals
        )));
    }

    Ok(OrderWire {
        a: asset.index,
        b: request.side.is_buy(),
        p: wire_decimal(round_price(request.limit_price, asset.sz_decimals)),
        s: wire_decimal(size),
        r: request.reduce_only,
        t,
        c: Some(request.client_order_id.clone()),
    })
}

fn first_status(body: &Value) -> Option<&Value> {
    body.get("response")
        .and_then(|r| r.get("data"))
        .and_then(|d| d.get("statuses"))
        .and_then(|s| s.as_array())
        .and_then(|s| s.first())
}

fn top_level_error(body: &Value) -> Option<String> {
    if body.get("status").and_then(Value::as_str) == Some("err") {
        let msg = match body.get("response") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unspecified error".to_string(),
        };
        return Some(msg);
    }
    None
}

fn pick_decimal(value: &Value, key: &str) -> Option<Decimal> {
    match value.get(key)? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        _ => None,
    }
}

/// Decode the reply to a single-order action.
pub fn parse_order_response(body: &Value) -> Result<PlacementAck> {
    if let Some(msg) = top_level_error(body) {
        return Err(HypercopyError::OrderRejected(msg));
    }
    let status = first_status(body).ok_or_else(|| {
        HypercopyError::Internal(format!("order response without statuses: {}", body))
    })?;

    if let Some(msg) = status.get("error").and_then(Value::as_str) {
        return Err(HypercopyError::OrderRejected(msg.to_string()));
    }
    if let Some(resting) = status.get("resting") {
        let order_id = resting.get("oid").and_then(Value::as_u64).ok_or_else(|| {
            HypercopyError::Internal(format!("resting status without oid: {}", status))
        })?;
        return Ok(PlacementAck::Resting { order_id });
    }
    if let Some(filled) = status.get("filled") {
        let order_id = filled.get("oid").and_then(Value::as_u64).ok_or_else(|| {
            HypercopyError::Internal(format!("filled status without oid: {}", status))
        })?;
        return Ok(PlacementAck::Filled {
            order_id,
            total_size: pick_decimal(filled, "totalSz").unwrap_or_default(),
            avg_price: pick_decimal(filled, "avgPx").unwrap_or_default(),
        });
    }
    if let Some(text) = status.as_str() {
        return Ok(PlacementAck::Pending {
            status: text.to_string(),
        });
    }
    Err(HypercopyError::Internal(format!(
        "unrecognized order status: {}",
        status
    )))
}

const GONE_MARKERS: &[&str] = &[
    "already canceled",
    "already cancelled",
    "never placed",
    "not found",
    "does not exist",
];

/// Whether a per-order cancel status says the order no longer exists.
pub fn is_order_gone(status_error: &str) -> bool {
    let text = status_error.to_lowercase();
    GONE_MARKERS.iter().any(|m| text.contains(m))
}

/// Decode the reply to a single-cancel action. Account-level failures stay
/// `CancelRejected`; only a per-order status can report the order as gone.
pub fn parse_cancel_response(body: &Value) -> Result<()> {
    if let Some(msg) = top_level_error(body) {
        return Err(HypercopyError::CancelRejected(msg));
    }
    match first_status(body) {
        Some(Value::String(s)) if s == "success" => Ok(()),
        Some(status) => match status.get("error").and_then(Value::as_str) {
            Some(msg) if is_order_gone(msg) => Err(HypercopyError::OrderGone(msg.to_string())),
            Some(msg) => Err(HypercopyError::CancelRejected(msg.to_string())),
            None => Err(HypercopyError::Internal(format!(
                "unrecognized cancel status: {}",
                status
            ))),
        },
        None => Err(HypercopyError::Internal(format!(
            "cancel response without statuses: {}",
            body
        ))),
    }
}

/// Apply a fractional slippage to a reference price in the direction that
/// makes an aggressive order marketable.
pub fn slippage_price(reference: Decimal, slippage: Decimal, is_buy: bool) -> Decimal {
    if is_buy {
        reference * (Decimal::ONE + slippage)
    } else {
        reference * (Decimal::ONE - slippage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderSide, TimeInForce};
    use rust_decimal_macros::dec;
    use serde_json::json;

    const BTC: AssetInfo = AssetInfo {
        index: 0,
        sz_decimals: 5,
    };

    #[test]
    fn price_rounding_rules() {
        assert_eq!(round_price(dec!(60000), 5), dec!(60000));
        assert_eq!(round_price(dec!(60123.7), 5), dec!(60124));
        assert_eq!(round_price(dec!(3001.234), 4), dec!(3001.2));
        assert_eq!(round_price(dec!(0.0012345678), 0), dec!(0.001235));
        assert_eq!(round_price(dec!(1.234567), 2), dec!(1.2346));
    }

    #[test]
    fn size_rounding_direction() {
        assert_eq!(round_size(dec!(0.000166666), 5, false), dec!(0.00017));
        assert_eq!(round_size(dec!(0.000166666), 5, true), dec!(0.00016));
        assert_eq!(wire_decimal(dec!(1.50000)), "1.5");
    }

    #[test]
    fn limit_entry_wire_shape() {
        let req = OrderRequest::limit(
            "BTC/USDC:USDC",
            OrderSide::Buy,
            dec!(0.00017),
            dec!(60000),
            TimeInForce::Gtc,
        );
        let wire = order_wire(&req, BTC).expect("wire");
        let value = serde_json::to_value(OrderAction::single(wire)).expect("json");
        assert_eq!(value["type"], "order");
        assert_eq!(value["grouping"], "na");
        let order = &value["orders"][0];
        assert_eq!(order["a"], 0);
        assert_eq!(order["b"], true);
        assert_eq!(order["p"], "60000");
        assert_eq!(order["s"], "0.00017");
        assert_eq!(order["r"], false);
        assert_eq!(order["t"], json!({"limit": {"tif": "Gtc"}}));
    }

    #[test]
    fn stop_loss_is_a_resting_trigger_not_ioc() {
        let req = OrderRequest::trigger(
            "BTC/USDC:USDC",
            OrderSide::Sell,
            dec!(0.00017),
            dec!(59000),
            TriggerKind::StopLoss,
        );
        let wire = order_wire(&req, BTC).expect("wire");
        assert!(wire.r);
        assert!(!wire.b);
        assert_eq!(
            wire.t,
            OrderTypeWire::Trigger(TriggerWire {
                is_market: true,
                trigger_px: "59000".into(),
                tpsl: "sl",
            })
        );
        let value = serde_json::to_value(&wire.t).expect("json");
        assert!(value.get("limit").is_none());
        assert_eq!(value["trigger"]["triggerPx"], "59000");
        assert_eq!(value["trigger"]["isMarket"], true);
    }

    #[test]
    fn market_close_is_ioc_limit() {
        let req = OrderRequest::market_close("BTC/USDC:USDC", OrderSide::Sell, dec!(0.5), dec!(48000));
        let wire = order_wire(&req, BTC).expect("wire");
        assert_eq!(wire.t, OrderTypeWire::Limit(LimitWire { tif: "Ioc" }));
        assert!(wire.r);
    }

    #[test]
    fn dust_size_is_refused() {
        let req = OrderRequest::market_close("BTC/USDC:USDC", OrderSide::Sell, dec!(0.000001), dec!(48000));
        assert!(matches!(
            order_wire(&req, BTC),
            Err(HypercopyError::InvalidOrder(_))
        ));
    }

    #[test]
    fn action_msgpack_keeps_field_order() {
        let action = CancelAction::single(3, 77);
        let bytes = rmp_serde::to_vec_named(&action).expect("msgpack");
        let type_pos = bytes.windows(4).position(|w| w == b"type");
        let cancels_pos = bytes.windows(7).position(|w| w == b"cancels");
        assert!(type_pos < cancels_pos);
    }

    #[test]
    fn parses_order_statuses() {
        let resting = json!({"status": "ok", "response": {"type": "order", "data": {"statuses": [{"resting": {"oid": 77738308}}]}}});
        assert_eq!(
            parse_order_response(&resting).expect("resting"),
            PlacementAck::Resting { order_id: 77738308 }
        );

        let filled = json!({"status": "ok", "response": {"type": "order", "data": {"statuses": [{"filled": {"totalSz": "0.02", "avgPx": "1891.4", "oid": 77747314}}]}}});
        assert_eq!(
            parse_order_response(&filled).expect("filled"),
            PlacementAck::Filled {
                order_id: 77747314,
                total_size: dec!(0.02),
                avg_price: dec!(1891.4)
            }
        );

        let waiting = json!({"status": "ok", "response": {"type": "order", "data": {"statuses": ["waitingForTrigger"]}}});
        assert!(matches!(
            parse_order_response(&waiting),
            Ok(PlacementAck::Pending { .. })
        ));

        let rejected = json!({"status": "ok", "response": {"type": "order", "data": {"statuses": [{"error": "Order must have minimum value of $10."}]}}});
        assert!(matches!(
            parse_order_response(&rejected),
            Err(HypercopyError::OrderRejected(msg)) if msg.contains("minimum value")
        ));

        let err = json!({"status": "err", "response": "User or API Wallet does not exist."});
        assert!(matches!(
            parse_order_response(&err),
            Err(HypercopyError::OrderRejected(_))
        ));
    }

    #[test]
    fn parses_cancel_statuses() {
        let ok = json!({"status": "ok", "response": {"type": "cancel", "data": {"statuses": ["success"]}}});
        assert!(parse_cancel_response(&ok).is_ok());

        let gone = json!({"status": "ok", "response": {"type": "cancel", "data": {"statuses": [{"error": "Order was never placed, already canceled, or filled."}]}}});
        assert!(matches!(
            parse_cancel_response(&gone),
            Err(HypercopyError::OrderGone(_))
        ));

        let wallet = json!({"status": "err", "response": "User or API Wallet 0xabc does not exist."});
        assert!(matches!(
            parse_cancel_response(&wallet),
            Err(HypercopyError::CancelRejected(_))
        ));

        let refused = json!({"status": "ok", "response": {"type": "cancel", "data": {"statuses": [{"error": "Too many cumulative requests sent."}]}}});
        assert!(matches!(
            parse_cancel_response(&refused),
            Err(HypercopyError::CancelRejected(_))
        ));
    }

    #[test]
    fn slippage_moves_price_against_us() {
        assert_eq!(slippage_price(dec!(100), dec!(0.2), true), dec!(120.0));
        assert_eq!(slippage_price(dec!(100), dec!(0.2), false), dec!(80.0));
    }
}
