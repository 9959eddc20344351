use chrono::Utc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Nonce source for exchange actions
///
/// The venue expects millisecond timestamps and rejects a nonce it has
/// already seen for the signer. Concurrent placements in the same
/// millisecond get distinct values by bumping past the last allocation.
///
/// # Example
/// ```rust,ignore
/// let nonces = NonceClock::new();
/// let nonce = nonces.next();
/// let signature = sign_l1_action(&wallet, &action, nonce, Some(vault))?;
/// ```
#[derive(Debug, Default)]
pub struct NonceClock {
    last: AtomicU64,
}

impl NonceClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next nonce: `max(now_ms, last + 1)`
    pub fn next(&self) -> u64 {
        let now = Utc::now().timestamp_millis().max(0) as u64;
        let mut prev = self.last.load(Ordering::Relaxed);
        loop {
            let candidate = now.max(prev + 1);
            match self
                .last
                .compare_exchange_weak(prev, candidate, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => {
                    trace!("Allocated nonce {}", candidate);
                    return candidate;
                }
                Err(actual) => prev = actual,
            }
        }
    }
}
