//! In-memory venue shared by the integration tests.
//!
//! One `FakeVenue` holds the authoritative book for every sub-account.
//! Readers and gateways are thin views over it, so what a test asserts on
//! is exactly what the venue would hold.
#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::Address;
use hypercopy::domain::{
    ExchangeOrder, OrderRequest, OrderStatus, OrderType, PlacementAck, Position, Side,
    TriggerKind,
};
use hypercopy::error::{HypercopyError, Result};
use hypercopy::registry::{AccountRegistry, TraderAccount};
use hypercopy::retry::RetryPolicy;
use hypercopy::venue::{OrderGateway, StateReader};
use hypercopy::Orchestrator;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const PERDU_SUB: [u8; 20] = [0x01; 20];
pub const VICTORIOUS_SUB: [u8; 20] = [0x02; 20];
pub const OSBRAH_SUB: [u8; 20] = [0x03; 20];
pub const OWNER: [u8; 20] = [0xaa; 20];

pub fn addr(bytes: [u8; 20]) -> Address {
    Address::from(bytes)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub routed_to: Address,
    pub request: OrderRequest,
}

#[derive(Default)]
pub struct VenueBook {
    pub orders: HashMap<Address, Vec<ExchangeOrder>>,
    pub positions: HashMap<(Address, String), Position>,
    pub mids: HashMap<String, Decimal>,
    pub listed: HashSet<String>,
    pub submissions: Vec<Submission>,
    pub cancels: Vec<(Address, u64)>,
    /// Query subjects seen by the reader, in order
    pub order_reads: Vec<Address>,
    pub position_reads: Vec<Address>,
    /// Prices the venue rejects: limit price for entries, trigger price for triggers
    pub reject_prices: HashSet<Decimal>,
    /// Account-level error returned for every cancel, e.g. an unknown API wallet
    pub cancel_error: Option<String>,
    /// Fail the next N open-order reads with a transient error
    pub flaky_reads: u32,
    next_oid: u64,
}

#[derive(Clone, Default)]
pub struct FakeVenue {
    book: Arc<Mutex<VenueBook>>,
}

impl FakeVenue {
    pub fn new() -> Self {
        let venue = Self::default();
        venue.with_book(|b| {
            b.next_oid = 1000;
            b.listed.extend(
                ["BTC/USDC:USDC", "ETH/USDC:USDC", "SOL/USDC:USDC"]
                    .into_iter()
                    .map(String::from),
            );
        });
        venue
    }

    pub fn with_book<R>(&self, f: impl FnOnce(&mut VenueBook) -> R) -> R {
        let mut book = self.book.lock().expect("venue lock");
        f(&mut book)
    }

    pub fn reader(&self) -> Arc<dyn StateReader> {
        Arc::new(FakeReader {
            venue: self.clone(),
        })
    }

    pub fn gateway(&self, routing: Address) -> Arc<dyn OrderGateway> {
        Arc::new(FakeGateway {
            venue: self.clone(),
            routing,
        })
    }

    pub fn set_position(&self, sub: Address, symbol: &str, side: Side, size: Decimal, entry: Decimal) {
        self.with_book(|b| {
            b.positions.insert(
                (sub, symbol.to_string()),
                Position {
                    symbol: symbol.to_string(),
                    side,
                    size,
                    entry_price: Some(entry),
                },
            );
        });
    }

    pub fn open_orders(&self, sub: Address) -> Vec<ExchangeOrder> {
        self.with_book(|b| b.orders.get(&sub).cloned().unwrap_or_default())
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.with_book(|b| b.submissions.clone())
    }

    pub fn position(&self, sub: Address, symbol: &str) -> Option<Position> {
        self.with_book(|b| b.positions.get(&(sub, symbol.to_string())).cloned())
    }

    /// Registry with Perdu, Victorious and Osbrah, each routed to its own sub-account.
    pub fn registry(&self) -> AccountRegistry {
        let accounts = [
            ("Perdu", PERDU_SUB),
            ("Victorious", VICTORIOUS_SUB),
            ("Osbrah", OSBRAH_SUB),
        ]
        .into_iter()
        .map(|(name, sub)| {
            TraderAccount::new(name, addr(OWNER), addr(OWNER), addr(sub), self.gateway(addr(sub)))
        });
        AccountRegistry::new(accounts).expect("registry")
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            Arc::new(self.registry()),
            self.reader(),
            RetryPolicy::new(3, Duration::from_millis(1)),
        )
    }
}

struct FakeReader {
    venue: FakeVenue,
}

#[async_trait]
impl StateReader for FakeReader {
    async fn fetch_open_orders(&self, subaccount: Address, symbol: &str) -> Result<Vec<ExchangeOrder>> {
        self.venue.with_book(|b| {
            b.order_reads.push(subaccount);
            if b.flaky_reads > 0 {
                b.flaky_reads -= 1;
                return Err(HypercopyError::Timeout("info request timed out".into()));
            }
            Ok(b.orders
                .get(&subaccount)
                .map(|orders| orders.iter().filter(|o| o.symbol == symbol).cloned().collect())
                .unwrap_or_default())
        })
    }

    async fn fetch_position(&self, subaccount: Address, symbol: &str) -> Result<Option<Position>> {
        self.venue.with_book(|b| {
            b.position_reads.push(subaccount);
            Ok(b.positions.get(&(subaccount, symbol.to_string())).cloned())
        })
    }

    async fn fetch_mid_price(&self, symbol: &str) -> Result<Option<Decimal>> {
        Ok(self.venue.with_book(|b| b.mids.get(symbol).copied()))
    }
}

struct FakeGateway {
    venue: FakeVenue,
    routing: Address,
}

#[async_trait]
impl OrderGateway for FakeGateway {
    fn routing_address(&self) -> Address {
        self.routing
    }

    fn is_listed(&self, symbol: &str) -> bool {
        self.venue.with_book(|b| b.listed.contains(symbol))
    }

    async fn submit(&self, request: &OrderRequest) -> Result<PlacementAck> {
        let routing = self.routing;
        self.venue.with_book(|b| {
            b.submissions.push(Submission {
                routed_to: routing,
                request: request.clone(),
            });
            let quoted = request
                .trigger
                .map(|t| t.trigger_price)
                .unwrap_or(request.limit_price);
            if b.reject_prices.contains(&quoted) {
                return Err(HypercopyError::OrderRejected(
                    "Insufficient margin to place order".into(),
                ));
            }

            b.next_oid += 1;
            let order_id = b.next_oid;

            if request.order_type == OrderType::Market {
                let key = (routing, request.symbol.clone());
                let filled = match b.positions.get_mut(&key) {
                    Some(position) => {
                        let filled = request.size.min(position.size);
                        position.size -= filled;
                        if position.size.is_zero() {
                            b.positions.remove(&key);
                        }
                        filled
                    }
                    None => Decimal::ZERO,
                };
                return Ok(PlacementAck::Filled {
                    order_id,
                    total_size: filled,
                    avg_price: request.limit_price,
                });
            }

            let (status, kind, price) = match &request.trigger {
                Some(t) => (OrderStatus::TriggerPending, t.kind, t.trigger_price),
                None => (OrderStatus::Open, TriggerKind::None, request.limit_price),
            };
            b.orders.entry(routing).or_default().push(ExchangeOrder {
                order_id,
                symbol: request.symbol.clone(),
                side: request.side,
                price,
                size: request.size,
                status,
                is_trigger: request.is_trigger(),
                trigger_kind: kind,
                reduce_only: request.reduce_only,
            });
            Ok(PlacementAck::Resting { order_id })
        })
    }

    async fn cancel(&self, _symbol: &str, order_id: u64) -> Result<()> {
        let routing = self.routing;
        self.venue.with_book(|b| {
            b.cancels.push((routing, order_id));
            if let Some(msg) = &b.cancel_error {
                return Err(HypercopyError::CancelRejected(msg.clone()));
            }
            let orders = b.orders.entry(routing).or_default();
            match orders.iter().position(|o| o.order_id == order_id) {
                Some(idx) => {
                    orders.remove(idx);
                    Ok(())
                }
                None => Err(HypercopyError::OrderGone(
                    "Order was never placed, already canceled, or filled.".into(),
                )),
            }
        })
    }
}
