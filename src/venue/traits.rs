use async_trait::async_trait;
use ethers::types::Address;
use rust_decimal::Decimal;

use crate::domain::{ExchangeOrder, OrderRequest, PlacementAck, Position};
use crate::error::Result;

/// Read-only view of what exists on the venue right now.
///
/// Queries are addressed by the sub-account itself (the venue's query
/// subject), never by the owning wallet. Every call goes to the venue; no
/// implementation may answer from a cache.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StateReader: Send + Sync {
    /// Live orders (resting and trigger-pending) for `symbol`; empty when none.
    async fn fetch_open_orders(&self, subaccount: Address, symbol: &str)
        -> Result<Vec<ExchangeOrder>>;

    /// Current position for `symbol`; `None` when flat.
    async fn fetch_position(&self, subaccount: Address, symbol: &str) -> Result<Option<Position>>;

    /// Mid price for `symbol`, if the venue quotes one.
    async fn fetch_mid_price(&self, symbol: &str) -> Result<Option<Decimal>>;
}

/// Signed mutation surface bound to one sub-account.
///
/// Every action is routed with the sub-account as its routing attribute;
/// the handle is shared and safe for concurrent use.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    /// Sub-account that every mutation through this handle is routed to.
    fn routing_address(&self) -> Address;

    /// Whether the venue lists `symbol` as tradable.
    fn is_listed(&self, symbol: &str) -> bool;

    async fn submit(&self, request: &OrderRequest) -> Result<PlacementAck>;

    /// Cancel by venue order id. An order that is already gone surfaces as
    /// `OrderGone`; callers classify it.
    async fn cancel(&self, symbol: &str, order_id: u64) -> Result<()>;
}
