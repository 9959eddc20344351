use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt::Display;

use crate::domain::{IntentAction, Side};
use crate::error::Result;

/// One venue step taken (or deliberately not taken) for an intent
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum Step {
    Entry { price: Decimal, size: Decimal },
    StopLoss { trigger_price: Decimal, size: Decimal },
    TakeProfit { trigger_price: Decimal, size: Decimal },
    CancelOpenOrders,
    ReadPosition,
    Flatten,
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Step::Entry { price, size } => write!(f, "entry {} @ {}", size, price),
            Step::StopLoss {
                trigger_price,
                size,
            } => write!(f, "stop loss {} @ {}", size, trigger_price),
            Step::TakeProfit {
                trigger_price,
                size,
            } => write!(f, "take profit {} @ {}", size, trigger_price),
            Step::CancelOpenOrders => write!(f, "cancel open orders"),
            Step::ReadPosition => write!(f, "read position"),
            Step::Flatten => write!(f, "flatten position"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum StepStatus {
    Done(String),
    /// Nothing to do; not a failure
    Skipped(String),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    #[serde(flatten)]
    pub step: Step,
    pub status: StepStatus,
}

/// Per-intent record of every step and its result
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub trader: String,
    /// Venue-format symbol
    pub symbol: String,
    pub action: IntentAction,
    pub side: Side,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
}

impl ExecutionReport {
    pub fn new(trader: &str, symbol: &str, action: IntentAction, side: Side) -> Self {
        Self {
            trader: trader.to_string(),
            symbol: symbol.to_string(),
            action,
            side,
            steps: Vec::new(),
            started_at: Utc::now(),
            elapsed_ms: 0,
        }
    }

    pub fn push(&mut self, step: Step, status: StepStatus) {
        self.steps.push(StepRecord { step, status });
    }

    pub fn push_result<T: Display>(&mut self, step: Step, result: &Result<T>) {
        let status = match result {
            Ok(value) => StepStatus::Done(value.to_string()),
            Err(e) => StepStatus::Failed(e.to_string()),
        };
        self.push(step, status);
    }

    pub fn failures(&self) -> impl Iterator<Item = &StepRecord> {
        self.steps
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Failed(_)))
    }

    pub fn is_complete(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn count_done(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Done(_)))
            .count()
    }

    pub fn finish(&mut self) {
        self.elapsed_ms = (Utc::now() - self.started_at).num_milliseconds().max(0) as u64;
    }
}

/// Terminal result of one intent
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum IntentOutcome {
    Applied(ExecutionReport),
    PartiallyApplied(ExecutionReport),
    Skipped {
        trader: String,
        symbol: String,
        action: IntentAction,
        reason: String,
    },
}

impl IntentOutcome {
    pub fn from_report(report: ExecutionReport) -> Self {
        if report.is_complete() {
            IntentOutcome::Applied(report)
        } else {
            IntentOutcome::PartiallyApplied(report)
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, IntentOutcome::Applied(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, IntentOutcome::Skipped { .. })
    }

    pub fn report(&self) -> Option<&ExecutionReport> {
        match self {
            IntentOutcome::Applied(r) | IntentOutcome::PartiallyApplied(r) => Some(r),
            IntentOutcome::Skipped { .. } => None,
        }
    }
}
