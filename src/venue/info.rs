//! Information endpoint: the authoritative, uncached read path.
//!
//! Account queries name the sub-account as their query subject. Nothing in
//! this module signs or routes mutations.

use async_trait::async_trait;
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::domain::{ExchangeOrder, OrderSide, OrderStatus, Position, TriggerKind};
use crate::error::{HypercopyError, Result};
use crate::retry::{with_retry, RetryPolicy};
use crate::symbol::coin_of;
use crate::venue::http::VenueHttp;
use crate::venue::meta::AssetDirectory;
use crate::venue::traits::StateReader;

/// Typed body for `POST /info`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InfoRequest {
    Meta,
    AllMids,
    FrontendOpenOrders { user: String },
    ClearinghouseState { user: String },
}

impl InfoRequest {
    pub fn open_orders(subaccount: Address) -> Self {
        InfoRequest::FrontendOpenOrders {
            user: format!("{:?}", subaccount),
        }
    }

    pub fn account_state(subaccount: Address) -> Self {
        InfoRequest::ClearinghouseState {
            user: format!("{:?}", subaccount),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenOrderRecord {
    pub coin: String,
    pub side: String,
    pub limit_px: Decimal,
    pub sz: Decimal,
    pub oid: u64,
    #[serde(default)]
    pub is_trigger: bool,
    #[serde(default)]
    pub trigger_px: Option<Decimal>,
    #[serde(default)]
    pub order_type: Option<String>,
    #[serde(default)]
    pub reduce_only: bool,
}

impl OpenOrderRecord {
    fn trigger_kind(&self) -> TriggerKind {
        if !self.is_trigger {
            return TriggerKind::None;
        }
        let kind = self.order_type.as_deref().unwrap_or_default().to_ascii_lowercase();
        if kind.contains("stop") {
            TriggerKind::StopLoss
        } else if kind.contains("take profit") {
            TriggerKind::TakeProfit
        } else {
            TriggerKind::None
        }
    }

    fn into_order(self, symbol: &str) -> Result<ExchangeOrder> {
        let side = match self.side.as_str() {
            "B" => OrderSide::Buy,
            "A" => OrderSide::Sell,
            other => {
                return Err(HypercopyError::Internal(format!(
                    "unknown order side '{}' for oid {}",
                    other, self.oid
                )))
            }
        };
        let trigger_kind = self.trigger_kind();
        let price = match self.trigger_px {
            Some(px) if self.is_trigger && !px.is_zero() => px,
            _ => self.limit_px,
        };
        Ok(ExchangeOrder {
            order_id: self.oid,
            symbol: symbol.to_string(),
            side,
            price,
            size: self.sz,
            status: if self.is_trigger {
                OrderStatus::TriggerPending
            } else {
                OrderStatus::Open
            },
            is_trigger: self.is_trigger,
            trigger_kind,
            reduce_only: self.reduce_only,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub coin: String,
    pub szi: Decimal,
    #[serde(default)]
    pub entry_px: Option<Decimal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPositionRecord {
    pub position: PositionRecord,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClearinghouseState {
    #[serde(default)]
    pub asset_positions: Vec<AssetPositionRecord>,
}

/// Raw info-endpoint client
#[derive(Debug, Clone)]
pub struct InfoClient {
    http: VenueHttp,
}

impl InfoClient {
    pub fn new(http: VenueHttp) -> Self {
        Self { http }
    }

    async fn query(&self, request: &InfoRequest) -> Result<serde_json::Value> {
        self.http.post_json("/info", request).await
    }

    #[instrument(skip(self))]
    pub async fn meta(&self) -> Result<AssetDirectory> {
        AssetDirectory::from_meta(self.query(&InfoRequest::Meta).await?)
    }

    #[instrument(skip(self))]
    pub async fn frontend_open_orders(&self, subaccount: Address) -> Result<Vec<OpenOrderRecord>> {
        let value = self.query(&InfoRequest::open_orders(subaccount)).await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn clearinghouse_state(&self, subaccount: Address) -> Result<ClearinghouseState> {
        let value = self.query(&InfoRequest::account_state(subaccount)).await?;
        if value.is_null() {
            return Ok(ClearinghouseState {
                asset_positions: Vec::new(),
            });
        }
        Ok(serde_json::from_value(value)?)
    }

    #[instrument(skip(self))]
    pub async fn all_mids(&self) -> Result<HashMap<String, Decimal>> {
        let value = self.query(&InfoRequest::AllMids).await?;
        Ok(serde_json::from_value(value)?)
    }
}

/// Keep only `symbol`'s orders and convert them.
pub fn orders_for_symbol(records: Vec<OpenOrderRecord>, symbol: &str) -> Result<Vec<ExchangeOrder>> {
    let coin = coin_of(symbol);
    records
        .into_iter()
        .filter(|o| o.coin == coin)
        .map(|o| o.into_order(symbol))
        .collect()
}

/// Find `symbol`'s position in an account snapshot.
pub fn position_for_symbol(state: &ClearinghouseState, symbol: &str) -> Option<Position> {
    let coin = coin_of(symbol);
    state
        .asset_positions
        .iter()
        .map(|ap| &ap.position)
        .find(|p| p.coin == coin)
        .and_then(|p| Position::from_signed(symbol, p.szi, p.entry_px))
}

/// [`StateReader`] backed by the info endpoint, retrying transient failures
#[derive(Debug, Clone)]
pub struct InfoStateReader {
    client: InfoClient,
    retry: RetryPolicy,
}

impl InfoStateReader {
    pub fn new(client: InfoClient, retry: &RetryPolicy) -> Self {
        Self {
            client,
            retry: retry.for_reads(),
        }
    }
}

#[async_trait]
impl StateReader for InfoStateReader {
    async fn fetch_open_orders(
        &self,
        subaccount: Address,
        symbol: &str,
    ) -> Result<Vec<ExchangeOrder>> {
        let records = with_retry(&self.retry, "fetch_open_orders", || {
            self.client.frontend_open_orders(subaccount)
        })
        .await?
        .into_value()?;
        let orders = orders_for_symbol(records, symbol)?;
        debug!(
            "{} open orders for {} on {:?}",
            orders.len(),
            symbol,
            subaccount
        );
        Ok(orders)
    }

    async fn fetch_position(&self, subaccount: Address, symbol: &str) -> Result<Option<Position>> {
        let state = with_retry(&self.retry, "fetch_position", || {
            self.client.clearinghouse_state(subaccount)
        })
        .await?
        .into_value()?;
        Ok(position_for_symbol(&state, symbol))
    }

    async fn fetch_mid_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        let mids = with_retry(&self.retry, "fetch_mid_price", || self.client.all_mids())
            .await?
            .into_value()?;
        Ok(mids.get(coin_of(symbol)).copied())
    }
}
