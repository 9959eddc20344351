use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

use crate::domain::IntentAction;
use crate::execution::IntentOutcome;

/// Outcome counters for processed intents
#[derive(Debug, Default)]
pub struct EventCounter {
    /// CREATE intents fully applied
    pub new_trades: AtomicU64,
    /// UPDATE intents fully applied
    pub updates: AtomicU64,
    /// CLOSE intents fully applied
    pub closes: AtomicU64,
    /// Intents with at least one failed step
    pub partial: AtomicU64,
    /// Intents skipped before any venue mutation
    pub skipped: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EventSnapshot {
    pub new_trades: u64,
    pub updates: u64,
    pub closes: u64,
    pub partial: u64,
    pub skipped: u64,
}

impl EventCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: &IntentOutcome) {
        let counter = match outcome {
            IntentOutcome::Applied(report) => match report.action {
                IntentAction::Create => &self.new_trades,
                IntentAction::Update => &self.updates,
                IntentAction::Close => &self.closes,
            },
            IntentOutcome::PartiallyApplied(_) => &self.partial,
            IntentOutcome::Skipped { .. } => &self.skipped,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> EventSnapshot {
        EventSnapshot {
            new_trades: self.new_trades.load(Ordering::Relaxed),
            updates: self.updates.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            partial: self.partial.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }

    pub fn log_summary(&self) {
        let s = self.snapshot();
        info!(
            new_trades = s.new_trades,
            updates = s.updates,
            closes = s.closes,
            partial = s.partial,
            skipped = s.skipped,
            "Intent totals"
        );
    }
}
