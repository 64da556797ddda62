//! Deterministic effect handlers for tests
//!
//! These mirror the production handlers in [`crate::effects`] but are fully
//! scriptable: a clock that only moves when told to, entropy that replays a
//! fixed sequence, and a ledger that fails on command to exercise
//! upstream-unavailable paths.

use crate::effects::{ClockEffects, EntropyEffects, LedgerFact, TransitionLedger};
use crate::errors::{Result, VeilError};
use crate::time::PhysicalTime;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// A clock that advances only under test control.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    /// Start at epoch millisecond `start_ms`.
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    /// Move the clock forward by `ms`.
    pub fn advance_ms(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute time.
    pub fn set_ms(&self, ms: u64) {
        self.now_ms.store(ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl ClockEffects for ManualClock {
    async fn now(&self) -> PhysicalTime {
        PhysicalTime::from_ms(self.now_ms.load(Ordering::SeqCst))
    }
}

/// Entropy that emits a deterministic counter sequence.
///
/// Successive draws differ, so tokens issued in one test never collide,
/// but a reseeded handler replays the same sequence.
#[derive(Debug, Default)]
pub struct FixedEntropy {
    counter: AtomicU64,
}

impl FixedEntropy {
    /// Start the sequence at `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            counter: AtomicU64::new(seed),
        }
    }
}

#[async_trait]
impl EntropyEffects for FixedEntropy {
    async fn fill_bytes(&self, buf: &mut [u8]) {
        let draw = self.counter.fetch_add(1, Ordering::SeqCst);
        for (i, byte) in buf.iter_mut().enumerate() {
            *byte = draw.to_le_bytes()[i % 8].wrapping_add(i as u8);
        }
    }
}

/// A ledger that can be toggled into a failing state.
#[derive(Debug, Default)]
pub struct FlakyLedger {
    facts: Mutex<Vec<LedgerFact>>,
    failing: AtomicBool,
}

impl FlakyLedger {
    /// Create a healthy ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `UpstreamUnavailable`.
    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Restore normal operation.
    pub fn recover(&self) {
        self.failing.store(false, Ordering::SeqCst);
    }

    /// Facts committed so far.
    pub fn committed(&self) -> Vec<LedgerFact> {
        self.facts.lock().clone()
    }
}

#[async_trait]
impl TransitionLedger for FlakyLedger {
    async fn apply(&self, fact: LedgerFact) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VeilError::upstream_unavailable("ledger offline"));
        }
        self.facts.lock().push(fact);
        Ok(())
    }

    async fn read(&self, type_id: &str) -> Result<Vec<LedgerFact>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(VeilError::upstream_unavailable("ledger offline"));
        }
        Ok(self
            .facts
            .lock()
            .iter()
            .filter(|f| f.type_id == type_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_advances_only_on_demand() {
        let clock = ManualClock::new(1_000);
        assert_eq!(clock.now().await.ts_ms, 1_000);
        clock.advance_ms(500);
        assert_eq!(clock.now().await.ts_ms, 1_500);
    }

    #[tokio::test]
    async fn test_fixed_entropy_draws_differ() {
        let entropy = FixedEntropy::new(0);
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        entropy.fill_bytes(&mut a).await;
        entropy.fill_bytes(&mut b).await;
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn test_flaky_ledger_toggles() {
        let ledger = FlakyLedger::new();
        let fact = LedgerFact {
            type_id: "t".into(),
            payload: serde_json::Value::Null,
        };
        assert!(ledger.apply(fact.clone()).await.is_ok());
        ledger.fail();
        assert!(matches!(
            ledger.apply(fact).await,
            Err(VeilError::UpstreamUnavailable { .. })
        ));
        ledger.recover();
        assert_eq!(ledger.committed().len(), 1);
    }
}
