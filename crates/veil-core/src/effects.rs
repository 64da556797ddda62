//! Effect interfaces and default handlers
//!
//! # Effect Classification
//!
//! - `ClockEffects` — physical time for expiry and deadline math
//! - `EntropyEffects` — random bytes for token and id generation
//! - `TransitionLedger` — the external durable ledger that atomically
//!   applies a single state transition and serves read-only queries
//!
//! Components receive these as `Arc` handles at construction time
//! (dependency injection); there is no ambient global clock, RNG, or store.
//! Production handlers (`SystemClock`, `OsEntropy`) live here; deterministic
//! test handlers live in [`crate::testkit`].
//!
//! The ledger is atomic *per call only*. A flow that applies two transitions
//! (e.g. redeem a token, then grant a relationship) must tolerate the second
//! call failing after the first has committed; see `veil-claim`.

use crate::errors::{Result, VeilError};
use crate::time::PhysicalTime;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Physical wall-clock access.
#[async_trait]
pub trait ClockEffects: Send + Sync {
    /// Current physical time.
    async fn now(&self) -> PhysicalTime;
}

/// Cryptographically secure random bytes.
#[async_trait]
pub trait EntropyEffects: Send + Sync {
    /// Fill `buf` with random bytes.
    async fn fill_bytes(&self, buf: &mut [u8]);
}

/// A single durable state transition, as stored by the external ledger.
///
/// Transitions are carried as a type id plus an opaque JSON payload so the
/// ledger stays generic over the domain fact types defined in the component
/// crates (`RelationshipFact`, `TokenFact`, `TallyFact`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFact {
    /// Registered fact type id (e.g. `"relationship"`, `"token"`)
    pub type_id: String,
    /// Serialized domain fact
    pub payload: serde_json::Value,
}

impl LedgerFact {
    /// Serialize a domain fact under its type id.
    pub fn encode<T: Serialize>(type_id: &str, fact: &T) -> Result<Self> {
        let payload = serde_json::to_value(fact)
            .map_err(|e| VeilError::invalid(format!("fact serialization: {e}")))?;
        Ok(Self {
            type_id: type_id.to_string(),
            payload,
        })
    }

    /// Deserialize the payload back into a domain fact.
    pub fn decode<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| VeilError::invalid(format!("fact deserialization: {e}")))
    }
}

/// The external durable ledger boundary.
///
/// Assumed atomic and durable per call; never atomic across calls. Failures
/// surface as [`VeilError::UpstreamUnavailable`] and are not retried here —
/// retry policy belongs to the caller, who must re-check state before
/// re-attempting any redemption-class operation.
#[async_trait]
pub trait TransitionLedger: Send + Sync {
    /// Durably apply a single state transition.
    async fn apply(&self, fact: LedgerFact) -> Result<()>;

    /// Read back all committed facts of one type, in commit order.
    async fn read(&self, type_id: &str) -> Result<Vec<LedgerFact>>;
}

// =============================================================================
// Production handlers
// =============================================================================

/// Wall-clock handler backed by `SystemTime`.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

#[async_trait]
impl ClockEffects for SystemClock {
    async fn now(&self) -> PhysicalTime {
        let ts_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        PhysicalTime { ts_ms }
    }
}

/// Entropy handler backed by the operating system RNG.
#[derive(Debug, Clone, Default)]
pub struct OsEntropy;

#[async_trait]
impl EntropyEffects for OsEntropy {
    async fn fill_bytes(&self, buf: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(buf);
    }
}

/// In-memory, non-durable ledger.
///
/// The stand-in for the external ledger in tests and embedded use. This is
/// deliberately the *only* in-memory path: it implements the same trait the
/// durable ledger does rather than existing as a parallel token/relationship
/// implementation.
#[derive(Debug, Default)]
pub struct MemoryLedger {
    facts: Mutex<Vec<LedgerFact>>,
}

impl MemoryLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of committed facts, across all types.
    pub fn len(&self) -> usize {
        self.facts.lock().len()
    }

    /// Whether any fact has been committed.
    pub fn is_empty(&self) -> bool {
        self.facts.lock().is_empty()
    }
}

#[async_trait]
impl TransitionLedger for MemoryLedger {
    async fn apply(&self, fact: LedgerFact) -> Result<()> {
        self.facts.lock().push(fact);
        Ok(())
    }

    async fn read(&self, type_id: &str) -> Result<Vec<LedgerFact>> {
        Ok(self
            .facts
            .lock()
            .iter()
            .filter(|f| f.type_id == type_id)
            .cloned()
            .collect())
    }
}

// =============================================================================
// Arc blanket implementations
// =============================================================================

#[async_trait]
impl<T: ClockEffects + ?Sized> ClockEffects for Arc<T> {
    async fn now(&self) -> PhysicalTime {
        (**self).now().await
    }
}

#[async_trait]
impl<T: EntropyEffects + ?Sized> EntropyEffects for Arc<T> {
    async fn fill_bytes(&self, buf: &mut [u8]) {
        (**self).fill_bytes(buf).await
    }
}

#[async_trait]
impl<T: TransitionLedger + ?Sized> TransitionLedger for Arc<T> {
    async fn apply(&self, fact: LedgerFact) -> Result<()> {
        (**self).apply(fact).await
    }

    async fn read(&self, type_id: &str) -> Result<Vec<LedgerFact>> {
        (**self).read(type_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct SampleFact {
        n: u32,
    }

    #[tokio::test]
    async fn test_memory_ledger_read_filters_by_type() {
        let ledger = MemoryLedger::new();
        ledger
            .apply(LedgerFact::encode("a", &SampleFact { n: 1 }).unwrap())
            .await
            .unwrap();
        ledger
            .apply(LedgerFact::encode("b", &SampleFact { n: 2 }).unwrap())
            .await
            .unwrap();

        let facts = ledger.read("a").await.unwrap();
        assert_eq!(facts.len(), 1);
        assert_eq!(facts[0].decode::<SampleFact>().unwrap(), SampleFact { n: 1 });
    }

    #[tokio::test]
    async fn test_os_entropy_fills_buffer() {
        let entropy = OsEntropy;
        let mut a = [0u8; 32];
        let mut b = [0u8; 32];
        entropy.fill_bytes(&mut a).await;
        entropy.fill_bytes(&mut b).await;
        assert_ne!(a, b);
    }
}
