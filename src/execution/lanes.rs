//! Streaming intake: one worker lane per (trader, venue symbol) key.
//!
//! Intents for the same key queue on their lane and run in arrival order.
//! Lanes for different keys run at the same time. Outcomes are reported on
//! a shared channel as each intent completes.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::domain::{IntentKey, TradeIntent};
use crate::execution::orchestrator::Orchestrator;
use crate::execution::report::IntentOutcome;

const LANE_CAPACITY: usize = 64;

pub struct IntentLanes {
    orchestrator: Arc<Orchestrator>,
    lanes: HashMap<IntentKey, mpsc::Sender<TradeIntent>>,
    outcomes: mpsc::UnboundedSender<IntentOutcome>,
    workers: JoinSet<()>,
}

impl IntentLanes {
    /// Build the lanes and the receiver that yields every outcome.
    pub fn new(orchestrator: Arc<Orchestrator>) -> (Self, mpsc::UnboundedReceiver<IntentOutcome>) {
        let (outcomes, rx) = mpsc::unbounded_channel();
        (
            Self {
                orchestrator,
                lanes: HashMap::new(),
                outcomes,
                workers: JoinSet::new(),
            },
            rx,
        )
    }

    /// Number of keys seen so far
    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    /// Queue `intent` on its key's lane, opening the lane on first use.
    /// Waits only when that lane's queue is full.
    pub async fn submit(&mut self, intent: TradeIntent) {
        let key = self.orchestrator.key_for(&intent);
        let lane = match self.lanes.get(&key) {
            Some(lane) if !lane.is_closed() => lane.clone(),
            _ => self.open_lane(key.clone()),
        };
        if lane.send(intent).await.is_err() {
            warn!("Lane for {} {} closed, intent dropped", key.trader, key.symbol);
            self.lanes.remove(&key);
        }
    }

    fn open_lane(&mut self, key: IntentKey) -> mpsc::Sender<TradeIntent> {
        debug!("Opening lane for {} {}", key.trader, key.symbol);
        let (tx, mut rx) = mpsc::channel::<TradeIntent>(LANE_CAPACITY);
        let orchestrator = self.orchestrator.clone();
        let outcomes = self.outcomes.clone();
        self.workers.spawn(async move {
            while let Some(intent) = rx.recv().await {
                let outcome = orchestrator.handle(&intent).await;
                if outcomes.send(outcome).is_err() {
                    break;
                }
            }
        });
        self.lanes.insert(key, tx.clone());
        tx
    }

    /// Stop accepting intents and wait for every queued one to finish.
    pub async fn drain(mut self) {
        self.lanes.clear();
        while let Some(joined) = self.workers.join_next().await {
            if let Err(e) = joined {
                warn!("Intent lane ended abnormally: {}", e);
            }
        }
    }
}
