//! CREATE / UPDATE / CLOSE lifecycle.
//!
//! No order ids are remembered between intents. Each intent resolves its
//! account, reads the venue fresh where it needs current state, and issues
//! the mutations that realize the intent. An UPDATE interrupted halfway is
//! repaired by the next intent for the same key: the next UPDATE cancels
//! whatever it finds and re-places, and a CLOSE flattens whatever exists.

use futures::future::join_all;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::domain::{IntentAction, IntentKey, TimeInForce, TradeIntent, TriggerKind};
use crate::error::HypercopyError;
use crate::execution::executor::{placed_size, MutationExecutor};
use crate::execution::report::{ExecutionReport, IntentOutcome, Step, StepStatus};
use crate::registry::{AccountRegistry, TraderAccount};
use crate::retry::RetryPolicy;
use crate::services::{EventCounter, Notifier, NullNotifier, SoundNotifier};
use crate::sizing::{split_size, PositionSizer, SizedEntry};
use crate::symbol::SymbolNormalizer;
use crate::venue::StateReader;

/// An intent that passed every check that needs no venue mutation
struct Prepared<'a> {
    account: &'a TraderAccount,
    plan: Vec<SizedEntry>,
}

pub struct Orchestrator {
    registry: Arc<AccountRegistry>,
    reader: Arc<dyn StateReader>,
    executor: MutationExecutor,
    normalizer: SymbolNormalizer,
    sizer: PositionSizer,
    entry_tif: TimeInForce,
    events: Arc<EventCounter>,
    notifier: Arc<dyn Notifier>,
}

impl Orchestrator {
    pub fn new(
        registry: Arc<AccountRegistry>,
        reader: Arc<dyn StateReader>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            registry,
            executor: MutationExecutor::new(reader.clone(), retry),
            reader,
            normalizer: SymbolNormalizer::new(),
            sizer: PositionSizer::new(Decimal::ONE, Decimal::TEN),
            entry_tif: TimeInForce::Gtc,
            events: Arc::new(EventCounter::new()),
            notifier: Arc::new(NullNotifier),
        }
    }

    /// Wire every collaborator from configuration.
    pub fn from_config(
        config: &AppConfig,
        registry: Arc<AccountRegistry>,
        reader: Arc<dyn StateReader>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.retry);
        let mut orchestrator = Self::new(registry, reader.clone(), retry.clone())
            .with_normalizer(SymbolNormalizer::with_overrides(&config.symbols.overrides))
            .with_sizer(PositionSizer::from_config(&config.sizing))
            .with_entry_time_in_force(config.execution.entry_time_in_force)
            .with_notifier(SoundNotifier::from_config(&config.notifications));
        orchestrator.executor = MutationExecutor::new(reader, retry)
            .with_slippage(config.venue.close_slippage, config.venue.trigger_slippage);
        orchestrator
    }

    pub fn with_normalizer(mut self, normalizer: SymbolNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_sizer(mut self, sizer: PositionSizer) -> Self {
        self.sizer = sizer;
        self
    }

    pub fn with_entry_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.entry_tif = tif;
        self
    }

    pub fn with_events(mut self, events: Arc<EventCounter>) -> Self {
        self.events = events;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn events(&self) -> &Arc<EventCounter> {
        &self.events
    }

    pub fn registry(&self) -> &Arc<AccountRegistry> {
        &self.registry
    }

    pub fn normalizer(&self) -> &SymbolNormalizer {
        &self.normalizer
    }

    pub fn key_for(&self, intent: &TradeIntent) -> IntentKey {
        IntentKey {
            trader: intent.trader.trim().to_ascii_lowercase(),
            symbol: self.normalizer.normalize(&intent.symbol),
        }
    }

    /// Apply one intent end to end. Never fails: every problem ends up in
    /// the outcome and the log.
    pub async fn handle(&self, intent: &TradeIntent) -> IntentOutcome {
        let symbol = self.normalizer.normalize(&intent.symbol);
        let action = intent.effective_action();

        let prepared = match self.prepare(intent, &symbol) {
            Ok(prepared) => prepared,
            Err(e) => {
                warn!(
                    "Skipping {} {} for {}: {}",
                    action, intent.symbol, intent.trader, e
                );
                let outcome = IntentOutcome::Skipped {
                    trader: intent.trader.clone(),
                    symbol,
                    action,
                    reason: e.to_string(),
                };
                self.events.record(&outcome);
                return outcome;
            }
        };
        let account = prepared.account;

        info!(
            "Handling {} {} {} for {} (sub-account {:?})",
            action, intent.side, symbol, account.trader_name, account.subaccount_address
        );

        let mut report = ExecutionReport::new(&account.trader_name, &symbol, action, intent.side);
        match action {
            IntentAction::Create => {
                self.apply_create(account, &symbol, intent, &prepared.plan, &mut report)
                    .await
            }
            IntentAction::Update => {
                self.apply_update(account, &symbol, intent, &prepared.plan, &mut report)
                    .await
            }
            IntentAction::Close => self.apply_close(account, &symbol, &mut report).await,
        }
        report.finish();

        let outcome = IntentOutcome::from_report(report);
        self.events.record(&outcome);
        match &outcome {
            IntentOutcome::Applied(r) => {
                info!(
                    "{} {} for {} applied ({} steps, {}ms)",
                    r.action,
                    r.symbol,
                    r.trader,
                    r.steps.len(),
                    r.elapsed_ms
                );
                self.notifier.notify_success(action).await;
            }
            IntentOutcome::PartiallyApplied(r) => {
                for failed in r.failures() {
                    error!(
                        "{} {} for {}: {} failed: {:?}",
                        r.action, r.symbol, r.trader, failed.step, failed.status
                    );
                }
            }
            IntentOutcome::Skipped { .. } => {}
        }
        outcome
    }

    /// Apply many intents. Intents for the same (trader, symbol) run in
    /// arrival order; different keys run concurrently. Outcomes are
    /// returned in input order.
    pub async fn handle_batch(&self, intents: Vec<TradeIntent>) -> Vec<IntentOutcome> {
        let mut groups: Vec<(IntentKey, Vec<(usize, TradeIntent)>)> = Vec::new();
        for (idx, intent) in intents.into_iter().enumerate() {
            let key = self.key_for(&intent);
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, group)) => group.push((idx, intent)),
                None => groups.push((key, vec![(idx, intent)])),
            }
        }

        let results = join_all(groups.into_iter().map(|(_, group)| async move {
            let mut out = Vec::with_capacity(group.len());
            for (idx, intent) in group {
                out.push((idx, self.handle(&intent).await));
            }
            out
        }))
        .await;

        let mut flat: Vec<(usize, IntentOutcome)> = results.into_iter().flatten().collect();
        flat.sort_by_key(|(idx, _)| *idx);
        flat.into_iter().map(|(_, outcome)| outcome).collect()
    }

    fn prepare<'a>(
        &'a self,
        intent: &TradeIntent,
        symbol: &str,
    ) -> Result<Prepared<'a>, HypercopyError> {
        let account = self.registry.resolve(&intent.trader)?;
        intent.validate()?;
        if !account.gateway.is_listed(symbol) {
            return Err(HypercopyError::SymbolUnavailable(symbol.to_string()));
        }

        let plan = match intent.effective_action() {
            IntentAction::Close => Vec::new(),
            _ => {
                let sizer = match intent.risk_per_trade {
                    Some(risk) => self.sizer.with_risk(risk),
                    None => self.sizer.clone(),
                };
                sizer.size_entries(&intent.entries, intent.stop_loss)?
            }
        };
        Ok(Prepared { account, plan })
    }

    async fn apply_create(
        &self,
        account: &TraderAccount,
        symbol: &str,
        intent: &TradeIntent,
        plan: &[SizedEntry],
        report: &mut ExecutionReport,
    ) {
        let placements = self
            .executor
            .place_orders(account, symbol, intent.side, plan, self.entry_tif)
            .await;
        for placement in &placements {
            report.push_result(
                Step::Entry {
                    price: placement.entry.price,
                    size: placement.entry.size,
                },
                &placement.result,
            );
        }

        // Protect only what the venue accepted.
        self.place_protection(account, symbol, intent, placed_size(&placements), report)
            .await;
    }

    async fn apply_update(
        &self,
        account: &TraderAccount,
        symbol: &str,
        intent: &TradeIntent,
        plan: &[SizedEntry],
        report: &mut ExecutionReport,
    ) {
        // Stale orders are fully swept before anything new is placed.
        match self.executor.cancel_all(account, symbol, None).await {
            Ok(summary) if summary.is_clean() => {
                report.push(Step::CancelOpenOrders, StepStatus::Done(summary.to_string()))
            }
            Ok(summary) => {
                report.push(Step::CancelOpenOrders, StepStatus::Failed(summary.to_string()))
            }
            Err(e) => {
                // Without a fresh view of what rests, placing more would stack orders.
                report.push(Step::CancelOpenOrders, StepStatus::Failed(e.to_string()));
                return;
            }
        }

        if !plan.is_empty() {
            self.apply_create(account, symbol, intent, plan, report).await;
            return;
        }

        if !intent.has_protection() {
            return;
        }

        // Stops only: protect whatever is held right now.
        let size = match self
            .reader
            .fetch_position(account.subaccount_address, symbol)
            .await
        {
            Ok(Some(position)) => {
                report.push(
                    Step::ReadPosition,
                    StepStatus::Done(format!("{} {}", position.side, position.size)),
                );
                position.size
            }
            Ok(None) => {
                report.push(Step::ReadPosition, StepStatus::Done("flat".to_string()));
                Decimal::ZERO
            }
            Err(e) => {
                report.push(Step::ReadPosition, StepStatus::Failed(e.to_string()));
                return;
            }
        };
        self.place_protection(account, symbol, intent, size, report)
            .await;
    }

    async fn apply_close(&self, account: &TraderAccount, symbol: &str, report: &mut ExecutionReport) {
        match self.executor.close_position(account, symbol).await {
            Ok(summary) => {
                let status = if summary.canceled.is_clean() {
                    StepStatus::Done(summary.canceled.to_string())
                } else {
                    StepStatus::Failed(summary.canceled.to_string())
                };
                report.push(Step::CancelOpenOrders, status);
                match summary.flatten {
                    Some(flatten) => report.push_result(Step::Flatten, &flatten.result),
                    None => report.push(
                        Step::Flatten,
                        StepStatus::Skipped("no open position".to_string()),
                    ),
                }
            }
            Err(e) => report.push(Step::Flatten, StepStatus::Failed(e.to_string())),
        }
    }

    /// Place the stop loss for `size` and the take profits concurrently,
    /// splitting `size` across the targets.
    async fn place_protection(
        &self,
        account: &TraderAccount,
        symbol: &str,
        intent: &TradeIntent,
        size: Decimal,
        report: &mut ExecutionReport,
    ) {
        let targets = intent.take_profits();
        let size = size.max(Decimal::ZERO);
        let mut wanted: Vec<(TriggerKind, Decimal, Decimal)> = Vec::new();
        if let Some(stop) = intent.stop_loss {
            wanted.push((TriggerKind::StopLoss, stop, size));
        }
        for (price, slice) in targets.iter().zip(split_size(size, targets.len())) {
            wanted.push((TriggerKind::TakeProfit, *price, slice));
        }

        let step_for = |kind: TriggerKind, trigger_price: Decimal, size: Decimal| match kind {
            TriggerKind::TakeProfit => Step::TakeProfit {
                trigger_price,
                size,
            },
            _ => Step::StopLoss {
                trigger_price,
                size,
            },
        };

        if size.is_zero() {
            for (kind, price, slice) in wanted {
                report.push(
                    step_for(kind, price, slice),
                    StepStatus::Skipped("no position to protect".to_string()),
                );
            }
            return;
        }

        let results = join_all(wanted.iter().map(|&(kind, price, slice)| async move {
            self.executor
                .place_trigger_order(account, symbol, intent.side, price, kind, slice)
                .await
        }))
        .await;

        for ((kind, price, slice), result) in wanted.into_iter().zip(results) {
            report.push_result(step_for(kind, price, slice), &result);
        }
    }
}
