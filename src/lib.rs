//! Hyperliquid copy-trading execution core.
//!
//! Turns normalized trade intents (CREATE / UPDATE / CLOSE) into order
//! mutations on the sub-account that belongs to each followed trader.

pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod execution;
pub mod registry;
pub mod retry;
pub mod services;
pub mod signing;
pub mod sizing;
pub mod symbol;
pub mod venue;

pub use config::AppConfig;
pub use domain::{EntryLevel, IntentAction, Side, TradeIntent};
pub use error::{HypercopyError, Result};
pub use execution::{ExecutionReport, IntentOutcome, MutationExecutor, Orchestrator};
pub use registry::{AccountRegistry, TraderAccount};
pub use retry::RetryPolicy;
pub use symbol::SymbolNormalizer;
