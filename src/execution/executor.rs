//! Venue mutations scoped to one trader's sub-account.
//!
//! Every call is wrapped in the retry policy. Bulk operations fan out and
//! are fully joined before returning, and each order's result is kept
//! independently so one rejection never masks another order's success.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::domain::{
    CancelOutcome, OrderRequest, PlacementAck, Side, TimeInForce, TriggerKind,
};
use crate::error::{HypercopyError, Result};
use crate::registry::TraderAccount;
use crate::retry::{with_retry, Retried, RetryPolicy};
use crate::sizing::SizedEntry;
use crate::venue::wire::slippage_price;
use crate::venue::StateReader;

/// Result of one entry placement
#[derive(Debug)]
pub struct EntryPlacement {
    pub entry: SizedEntry,
    pub result: Result<PlacementAck>,
}

impl EntryPlacement {
    pub fn is_placed(&self) -> bool {
        self.result.is_ok()
    }
}

/// Size the venue accepted across `placements`; rejected entries count as zero.
pub fn placed_size(placements: &[EntryPlacement]) -> Decimal {
    placements
        .iter()
        .filter(|p| p.is_placed())
        .map(|p| p.entry.size)
        .sum()
}

/// Outcome of cancelling everything that matched
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CancelSummary {
    pub canceled: usize,
    pub already_gone: usize,
    /// (order id, error message)
    pub failed: Vec<(u64, String)>,
}

impl CancelSummary {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.canceled + self.already_gone + self.failed.len()
    }
}

impl std::fmt::Display for CancelSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "canceled {}, already gone {}, failed {}",
            self.canceled,
            self.already_gone,
            self.failed.len()
        )
    }
}

/// Offsetting order sent to flatten a position
#[derive(Debug)]
pub struct Flatten {
    pub side: Side,
    pub size: Decimal,
    pub worst_price: Decimal,
    pub result: Result<PlacementAck>,
}

#[derive(Debug)]
pub struct CloseSummary {
    pub canceled: CancelSummary,
    /// `None` when there was no position to flatten
    pub flatten: Option<Flatten>,
}

pub struct MutationExecutor {
    reader: Arc<dyn StateReader>,
    retry: RetryPolicy,
    close_slippage: Decimal,
    trigger_slippage: Decimal,
}

impl MutationExecutor {
    pub fn new(reader: Arc<dyn StateReader>, retry: RetryPolicy) -> Self {
        Self {
            reader,
            retry,
            close_slippage: Decimal::new(20, 2),
            trigger_slippage: Decimal::new(10, 2),
        }
    }

    pub fn with_slippage(mut self, close: Decimal, trigger: Decimal) -> Self {
        self.close_slippage = close;
        self.trigger_slippage = trigger;
        self
    }

    async fn submit(&self, account: &TraderAccount, request: &OrderRequest) -> Result<PlacementAck> {
        request.validate()?;
        // The client order id is fixed across attempts, so a retry after an
        // ambiguous timeout cannot create a second order.
        match with_retry(&self.retry, "place_order", || account.gateway.submit(request)).await? {
            Retried::Completed(ack) => Ok(ack),
            Retried::Ignored(msg) => Err(HypercopyError::OrderRejected(msg)),
        }
    }

    /// Place one limit order per entry, concurrently.
    #[instrument(skip(self, account, entries), fields(trader = %account.trader_name, entries = entries.len()))]
    pub async fn place_orders(
        &self,
        account: &TraderAccount,
        symbol: &str,
        side: Side,
        entries: &[SizedEntry],
        kind: TimeInForce,
    ) -> Vec<EntryPlacement> {
        join_all(entries.iter().map(|entry| async move {
            let request =
                OrderRequest::limit(symbol, side.entry_side(), entry.size, entry.price, kind);
            let result = self.submit(account, &request).await;
            match &result {
                Ok(ack) => info!("Entry {} @ {} placed: {}", entry.size, entry.price, ack),
                Err(e) => error!("Entry {} @ {} failed: {}", entry.size, entry.price, e),
            }
            EntryPlacement {
                entry: *entry,
                result,
            }
        }))
        .await
    }

    /// Rest a reduce-only conditional on the exit side of a `side` position.
    #[instrument(skip(self, account), fields(trader = %account.trader_name))]
    pub async fn place_trigger_order(
        &self,
        account: &TraderAccount,
        symbol: &str,
        side: Side,
        trigger_price: Decimal,
        trigger_kind: TriggerKind,
        size: Decimal,
    ) -> Result<PlacementAck> {
        let exit = side.exit_side();
        let worst = slippage_price(trigger_price, self.trigger_slippage, exit.is_buy());
        let request = OrderRequest::trigger(symbol, exit, size, trigger_price, trigger_kind)
            .with_worst_price(worst);
        let result = self.submit(account, &request).await;
        match &result {
            Ok(ack) => info!("{} {} @ {} placed: {}", trigger_kind, size, trigger_price, ack),
            Err(e) => error!("{} {} @ {} failed: {}", trigger_kind, size, trigger_price, e),
        }
        result
    }

    /// Cancel one order. An order that is already gone counts as done.
    pub async fn cancel_order(
        &self,
        account: &TraderAccount,
        symbol: &str,
        order_id: u64,
    ) -> Result<CancelOutcome> {
        let outcome = with_retry(&self.retry, "cancel_order", || {
            account.gateway.cancel(symbol, order_id)
        })
        .await?;
        match outcome {
            Retried::Completed(()) => Ok(CancelOutcome::Canceled),
            Retried::Ignored(msg) => {
                debug!("Order {} already gone: {}", order_id, msg);
                Ok(CancelOutcome::AlreadyGone)
            }
        }
    }

    /// Cancel every live order for `symbol` found by a fresh read,
    /// optionally only those belonging to a `side` position.
    #[instrument(skip(self, account), fields(trader = %account.trader_name))]
    pub async fn cancel_all(
        &self,
        account: &TraderAccount,
        symbol: &str,
        side: Option<Side>,
    ) -> Result<CancelSummary> {
        let orders = self
            .reader
            .fetch_open_orders(account.subaccount_address, symbol)
            .await?;
        let targets: Vec<u64> = orders
            .iter()
            .filter(|o| side.map_or(true, |s| o.belongs_to(s)))
            .map(|o| o.order_id)
            .collect();

        if targets.is_empty() {
            debug!("No open orders to cancel for {}", symbol);
            return Ok(CancelSummary::default());
        }

        let results = join_all(targets.iter().map(|&order_id| async move {
            (order_id, self.cancel_order(account, symbol, order_id).await)
        }))
        .await;

        let mut summary = CancelSummary::default();
        for (order_id, result) in results {
            match result {
                Ok(CancelOutcome::Canceled) => summary.canceled += 1,
                Ok(CancelOutcome::AlreadyGone) => summary.already_gone += 1,
                Err(e) => {
                    warn!("Cancel of order {} failed: {}", order_id, e);
                    summary.failed.push((order_id, e.to_string()));
                }
            }
        }
        info!("Cancel sweep on {}: {}", symbol, summary);
        Ok(summary)
    }

    /// Cancel everything for `symbol`, then flatten any remaining position
    /// with a reduce-only immediate order bounded by the close slippage.
    #[instrument(skip(self, account), fields(trader = %account.trader_name))]
    pub async fn close_position(&self, account: &TraderAccount, symbol: &str) -> Result<CloseSummary> {
        let canceled = self.cancel_all(account, symbol, None).await?;

        let position = match self
            .reader
            .fetch_position(account.subaccount_address, symbol)
            .await?
        {
            Some(position) => position,
            None => {
                info!("No open position on {}; nothing to flatten", symbol);
                return Ok(CloseSummary {
                    canceled,
                    flatten: None,
                });
            }
        };

        let reference = self
            .reader
            .fetch_mid_price(symbol)
            .await?
            .or(position.entry_price)
            .ok_or_else(|| {
                HypercopyError::Internal(format!("no reference price to flatten {}", symbol))
            })?;

        let exit = position.side.exit_side();
        let worst_price = slippage_price(reference, self.close_slippage, exit.is_buy());
        let request = OrderRequest::market_close(symbol, exit, position.size, worst_price);
        let result = self.submit(account, &request).await;
        match &result {
            Ok(ack) => info!("Flattened {} {} on {}: {}", position.size, position.side, symbol, ack),
            Err(e) => error!("Flatten of {} {} on {} failed: {}", position.size, position.side, symbol, e),
        }

        Ok(CloseSummary {
            canceled,
            flatten: Some(Flatten {
                side: position.side,
                size: position.size,
                worst_price,
                result,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExchangeOrder, OrderSide, OrderStatus, OrderType, Position};
    use crate::venue::traits::{MockOrderGateway, MockStateReader};
    use ethers::types::Address;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const SYMBOL: &str = "BTC/USDC:USDC";

    fn sub() -> Address {
        Address::from([0x11; 20])
    }

    fn account(gateway: MockOrderGateway) -> TraderAccount {
        TraderAccount::new(
            "Perdu",
            Address::from([0x01; 20]),
            Address::from([0x02; 20]),
            sub(),
            Arc::new(gateway),
        )
    }

    fn executor(reader: MockStateReader) -> MutationExecutor {
        MutationExecutor::new(Arc::new(reader), RetryPolicy::new(3, Duration::from_millis(1)))
    }

    fn open_order(order_id: u64, side: OrderSide, is_trigger: bool) -> ExchangeOrder {
        ExchangeOrder {
            order_id,
            symbol: SYMBOL.to_string(),
            side,
            price: dec!(60000),
            size: dec!(0.001),
            status: if is_trigger {
                OrderStatus::TriggerPending
            } else {
                OrderStatus::Open
            },
            is_trigger,
            trigger_kind: if is_trigger {
                TriggerKind::StopLoss
            } else {
                TriggerKind::None
            },
            reduce_only: is_trigger,
        }
    }

    #[tokio::test]
    async fn cancel_is_idempotent() {
        let mut gateway = MockOrderGateway::new();
        let mut calls = 0;
        gateway.expect_cancel().times(2).returning(move |_, _| {
            calls += 1;
            if calls == 1 {
                Ok(())
            } else {
                Err(HypercopyError::OrderGone(
                    "Order was never placed, already canceled, or filled.".into(),
                ))
            }
        });
        let account = account(gateway);
        let exec = executor(MockStateReader::new());

        let first = exec.cancel_order(&account, SYMBOL, 7).await.expect("first cancel");
        let second = exec.cancel_order(&account, SYMBOL, 7).await.expect("second cancel");
        assert_eq!(first, CancelOutcome::Canceled);
        assert_eq!(second, CancelOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn cancel_of_unknown_order_succeeds() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_cancel()
            .times(1)
            .returning(|_, _| Err(HypercopyError::OrderGone("Order does not exist".into())));
        let exec = executor(MockStateReader::new());
        let outcome = exec
            .cancel_order(&account(gateway), SYMBOL, 999)
            .await
            .expect("ignorable");
        assert_eq!(outcome, CancelOutcome::AlreadyGone);
    }

    #[tokio::test]
    async fn partial_failure_keeps_other_entries() {
        let mut gateway = MockOrderGateway::new();
        gateway.expect_submit().times(3).returning(|req| {
            if req.limit_price == dec!(59500) {
                Err(HypercopyError::OrderRejected("Insufficient margin".into()))
            } else {
                Ok(PlacementAck::Resting {
                    order_id: req.limit_price.mantissa() as u64,
                })
            }
        });
        let exec = executor(MockStateReader::new());
        let entries = [
            SizedEntry { price: dec!(60000), size: dec!(0.001) },
            SizedEntry { price: dec!(59500), size: dec!(0.001) },
            SizedEntry { price: dec!(59000), size: dec!(0.001) },
        ];

        let placements = exec
            .place_orders(&account(gateway), SYMBOL, Side::Long, &entries, TimeInForce::Gtc)
            .await;

        assert_eq!(placements.len(), 3);
        assert!(placements[0].result.is_ok());
        assert!(placements[1].result.is_err());
        assert!(placements[2].result.is_ok());
        assert_eq!(placed_size(&placements), dec!(0.002));
    }

    #[tokio::test]
    async fn trigger_orders_are_resting_reduce_only_on_exit_side() {
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit()
            .withf(|req| {
                req.order_type == OrderType::Limit
                    && req.reduce_only
                    && req.side == OrderSide::Sell
                    && req.trigger.map(|t| t.trigger_price) == Some(dec!(59000))
                    && req.limit_price < dec!(59000)
            })
            .times(1)
            .returning(|_| Ok(PlacementAck::Pending { status: "waitingForTrigger".into() }));
        let exec = executor(MockStateReader::new());

        exec.place_trigger_order(
            &account(gateway),
            SYMBOL,
            Side::Long,
            dec!(59000),
            TriggerKind::StopLoss,
            dec!(0.001),
        )
        .await
        .expect("trigger placed");
    }

    #[tokio::test]
    async fn transient_submit_errors_are_retried() {
        let mut gateway = MockOrderGateway::new();
        let mut calls = 0;
        gateway.expect_submit().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(HypercopyError::Timeout("slow".into()))
            } else {
                Ok(PlacementAck::Resting { order_id: 5 })
            }
        });
        let exec = executor(MockStateReader::new());
        let placements = exec
            .place_orders(
                &account(gateway),
                SYMBOL,
                Side::Long,
                &[SizedEntry { price: dec!(60000), size: dec!(0.001) }],
                TimeInForce::Gtc,
            )
            .await;
        assert_eq!(
            placements[0].result.as_ref().ok(),
            Some(&PlacementAck::Resting { order_id: 5 })
        );
    }

    #[tokio::test]
    async fn cancel_all_reads_fresh_and_filters_side() {
        let mut reader = MockStateReader::new();
        reader
            .expect_fetch_open_orders()
            .withf(|addr, symbol| *addr == sub() && symbol.to_string() == SYMBOL)
            .times(1)
            .returning(|_, _| {
                Ok(vec![
                    open_order(1, OrderSide::Buy, false),
                    open_order(2, OrderSide::Sell, true),
                    open_order(3, OrderSide::Sell, false),
                ])
            });
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_cancel()
            .withf(|_, oid| *oid == 1 || *oid == 2)
            .times(2)
            .returning(|_, _| Ok(()));

        let summary = executor(reader)
            .cancel_all(&account(gateway), SYMBOL, Some(Side::Long))
            .await
            .expect("summary");
        assert_eq!(summary.canceled, 2);
        assert!(summary.is_clean());
    }

    #[tokio::test]
    async fn close_with_no_position_only_cancels() {
        let mut reader = MockStateReader::new();
        reader
            .expect_fetch_open_orders()
            .returning(|_, _| Ok(vec![open_order(9, OrderSide::Sell, true)]));
        reader.expect_fetch_position().times(1).returning(|_, _| Ok(None));
        reader.expect_fetch_mid_price().never();
        let mut gateway = MockOrderGateway::new();
        gateway.expect_cancel().times(1).returning(|_, _| Ok(()));
        gateway.expect_submit().never();

        let summary = executor(reader)
            .close_position(&account(gateway), SYMBOL)
            .await
            .expect("close");
        assert_eq!(summary.canceled.canceled, 1);
        assert!(summary.flatten.is_none());
    }

    #[tokio::test]
    async fn close_flattens_with_bounded_market_order() {
        let mut reader = MockStateReader::new();
        reader.expect_fetch_open_orders().returning(|_, _| Ok(Vec::new()));
        reader.expect_fetch_position().returning(|_, _| {
            Ok(Some(Position {
                symbol: SYMBOL.to_string(),
                side: Side::Short,
                size: dec!(0.5),
                entry_price: Some(dec!(61000)),
            }))
        });
        reader
            .expect_fetch_mid_price()
            .returning(|_| Ok(Some(dec!(60000))));
        let mut gateway = MockOrderGateway::new();
        gateway
            .expect_submit()
            .withf(|req| {
                req.order_type == OrderType::Market
                    && req.reduce_only
                    && req.side == OrderSide::Buy
                    && req.size == dec!(0.5)
                    && req.limit_price == dec!(72000)
                    && req.trigger.is_none()
            })
            .times(1)
            .returning(|_| {
                Ok(PlacementAck::Filled {
                    order_id: 3,
                    total_size: dec!(0.5),
                    avg_price: dec!(60010),
                })
            });

        let summary = executor(reader)
            .close_position(&account(gateway), SYMBOL)
            .await
            .expect("close");
        let flatten = summary.flatten.expect("flatten");
        assert_eq!(flatten.side, Side::Short);
        assert!(flatten.result.is_ok());
    }
}
