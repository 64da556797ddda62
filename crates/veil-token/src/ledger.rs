//! Token ledger service
//!
//! Issuance draws entropy through the injected effect handle and returns the
//! raw token exactly once. Redemption does its full check-and-set inside one
//! critical section: lookup, used/expired checks, and the `used_at` write
//! happen under the write lock, so two redeemers racing the same instant
//! cannot both succeed.

use crate::record::{RawToken, TokenFact, TokenPurpose, TokenRecord, TOKEN_FACT_TYPE_ID};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use veil_core::{hash, ClockEffects, EntropyEffects, Result, TransitionLedger, VeilError};

/// Bytes of entropy per token; rendered as 64 hex characters.
const TOKEN_ENTROPY_BYTES: usize = 32;

type TokenKey = (String, TokenPurpose);

/// The token ledger.
///
/// Owns token records exclusively. Callers gate issuance with their own
/// rate-limit policy before calling [`TokenLedger::issue`].
pub struct TokenLedger {
    clock: Arc<dyn ClockEffects>,
    entropy: Arc<dyn EntropyEffects>,
    ledger: Arc<dyn TransitionLedger>,
    tokens: RwLock<HashMap<TokenKey, TokenRecord>>,
}

impl TokenLedger {
    /// Create an empty token ledger over the given effect handles.
    pub fn new(
        clock: Arc<dyn ClockEffects>,
        entropy: Arc<dyn EntropyEffects>,
        ledger: Arc<dyn TransitionLedger>,
    ) -> Self {
        Self {
            clock,
            entropy,
            ledger,
            tokens: RwLock::new(HashMap::new()),
        }
    }

    /// Rebuild token state from the ledger's committed facts.
    pub async fn replay(&self) -> Result<()> {
        let facts = self.ledger.read(TOKEN_FACT_TYPE_ID).await?;
        let mut tokens = self.tokens.write();
        tokens.clear();
        for raw in facts {
            match raw.decode::<TokenFact>()? {
                TokenFact::Issued {
                    token_hash,
                    subject_hash,
                    purpose,
                    issued_at,
                    expires_at,
                } => {
                    tokens.insert(
                        (token_hash.clone(), purpose),
                        TokenRecord {
                            token_hash,
                            subject_hash,
                            purpose,
                            issued_at,
                            expires_at,
                            used_at: None,
                        },
                    );
                }
                TokenFact::Redeemed {
                    token_hash,
                    purpose,
                    used_at,
                } => {
                    if let Some(record) = tokens.get_mut(&(token_hash, purpose)) {
                        record.used_at.get_or_insert(used_at);
                    }
                }
            }
        }
        Ok(())
    }

    /// Issue a single-use token for `subject_hash` with the given TTL.
    ///
    /// `subject_hash` must already be opaque (a salted digest for anything
    /// PII-derived); it is stored verbatim and returned by redemption. The
    /// returned [`RawToken`] is the only copy of the secret — it is never
    /// retrievable again.
    pub async fn issue(
        &self,
        subject_hash: impl Into<String>,
        purpose: TokenPurpose,
        ttl_ms: u64,
    ) -> Result<RawToken> {
        if ttl_ms == 0 {
            return Err(VeilError::invalid("token ttl must be positive"));
        }

        let now = self.clock.now().await;
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        self.entropy.fill_bytes(&mut bytes).await;
        let raw = hex::encode(bytes);

        let record = TokenRecord {
            token_hash: hash::token_hash(&raw),
            subject_hash: subject_hash.into(),
            purpose,
            issued_at: now,
            expires_at: now.add_ms(ttl_ms),
            used_at: None,
        };

        self.tokens
            .write()
            .insert((record.token_hash.clone(), purpose), record.clone());

        tracing::debug!(?purpose, expires_at = %record.expires_at, "token issued");
        self.ledger
            .apply(
                TokenFact::Issued {
                    token_hash: record.token_hash,
                    subject_hash: record.subject_hash,
                    purpose,
                    issued_at: record.issued_at,
                    expires_at: record.expires_at,
                }
                .to_ledger_fact()?,
            )
            .await?;

        Ok(RawToken::new(raw))
    }

    /// Redeem a raw token, consuming its single use.
    ///
    /// Outcomes stay distinct: `NotFound` (no record for this hash and
    /// purpose), `AlreadyUsed` (checked before expiry, so a used-then-expired
    /// token still reports the redemption), `Expired`. On success `used_at`
    /// is set atomically and the stored subject is returned.
    ///
    /// If the durable append fails after the in-memory set, the redemption
    /// stands and `UpstreamUnavailable` surfaces; callers must re-check via
    /// [`TokenLedger::peek`] rather than blindly retrying.
    pub async fn redeem(&self, raw_token: &str, purpose: TokenPurpose) -> Result<String> {
        let now = self.clock.now().await;
        let token_hash = hash::token_hash(raw_token);

        let (subject, used_at) = {
            let mut tokens = self.tokens.write();
            let record = tokens
                .get_mut(&(token_hash.clone(), purpose))
                .ok_or_else(|| VeilError::not_found("no token for presented secret"))?;

            if record.used_at.is_some() {
                return Err(VeilError::already_used("token was already redeemed"));
            }
            if record.is_expired(now) {
                return Err(VeilError::expired("token validity window has passed"));
            }

            record.used_at = Some(now);
            (record.subject_hash.clone(), now)
        };

        tracing::debug!(?purpose, "token redeemed");
        self.ledger
            .apply(
                TokenFact::Redeemed {
                    token_hash,
                    purpose,
                    used_at,
                }
                .to_ledger_fact()?,
            )
            .await?;

        Ok(subject)
    }

    /// Non-mutating validity probe, for UI "is this link still good" checks.
    ///
    /// Never use this to gate a redemption — the answer can be stale by the
    /// time it is acted on. Redemption re-checks atomically.
    pub async fn peek(&self, raw_token: &str, purpose: TokenPurpose) -> bool {
        let now = self.clock.now().await;
        let token_hash = hash::token_hash(raw_token);
        self.tokens
            .read()
            .get(&(token_hash, purpose))
            .map(|record| record.is_valid(now))
            .unwrap_or(false)
    }

    /// Drop records that are used or expired. Optional compaction only;
    /// validity is always computed at read time.
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now().await;
        let mut tokens = self.tokens.write();
        let before = tokens.len();
        tokens.retain(|_, record| record.used_at.is_none() && !record.is_expired(now));
        before - tokens.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use veil_core::testkit::{FixedEntropy, FlakyLedger, ManualClock};
    use veil_core::time::durations;
    use veil_core::MemoryLedger;

    struct Fixture {
        clock: Arc<ManualClock>,
        ledger: TokenLedger,
    }

    fn fixture() -> Fixture {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let ledger = TokenLedger::new(
            clock.clone(),
            Arc::new(FixedEntropy::new(7)),
            Arc::new(MemoryLedger::new()),
        );
        Fixture { clock, ledger }
    }

    #[tokio::test]
    async fn test_issue_returns_64_hex_chars() {
        let f = fixture();
        let raw = f
            .ledger
            .issue("subject", TokenPurpose::MagicLink, durations::MINUTE_MS)
            .await
            .unwrap();
        assert_eq!(raw.expose().len(), 64);
        assert!(raw.expose().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_redeem_succeeds_once_then_already_used() {
        let f = fixture();
        let raw = f
            .ledger
            .issue("subject", TokenPurpose::MagicLink, durations::MINUTE_MS)
            .await
            .unwrap();

        let subject = f
            .ledger
            .redeem(raw.expose(), TokenPurpose::MagicLink)
            .await
            .unwrap();
        assert_eq!(subject, "subject");

        assert_matches!(
            f.ledger.redeem(raw.expose(), TokenPurpose::MagicLink).await,
            Err(VeilError::AlreadyUsed { .. })
        );
    }

    #[tokio::test]
    async fn test_redeem_after_ttl_is_expired() {
        let f = fixture();
        let raw = f
            .ledger
            .issue("subject", TokenPurpose::MagicLink, 10 * durations::MINUTE_MS)
            .await
            .unwrap();

        f.clock.advance_ms(10 * durations::MINUTE_MS);
        assert_matches!(
            f.ledger.redeem(raw.expose(), TokenPurpose::MagicLink).await,
            Err(VeilError::Expired { .. })
        );
    }

    #[tokio::test]
    async fn test_redeem_unknown_token_is_not_found() {
        let f = fixture();
        assert_matches!(
            f.ledger.redeem("ffff", TokenPurpose::MagicLink).await,
            Err(VeilError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_purpose_mismatch_is_not_found() {
        let f = fixture();
        let raw = f
            .ledger
            .issue("subject", TokenPurpose::Claim, durations::MINUTE_MS)
            .await
            .unwrap();

        assert_matches!(
            f.ledger.redeem(raw.expose(), TokenPurpose::MagicLink).await,
            Err(VeilError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn test_peek_does_not_consume() {
        let f = fixture();
        let raw = f
            .ledger
            .issue("subject", TokenPurpose::MagicLink, durations::MINUTE_MS)
            .await
            .unwrap();

        assert!(f.ledger.peek(raw.expose(), TokenPurpose::MagicLink).await);
        assert!(f.ledger.peek(raw.expose(), TokenPurpose::MagicLink).await);
        assert!(f
            .ledger
            .redeem(raw.expose(), TokenPurpose::MagicLink)
            .await
            .is_ok());
        assert!(!f.ledger.peek(raw.expose(), TokenPurpose::MagicLink).await);
    }

    #[tokio::test]
    async fn test_zero_ttl_is_rejected() {
        let f = fixture();
        assert_matches!(
            f.ledger.issue("subject", TokenPurpose::MagicLink, 0).await,
            Err(VeilError::Invalid { .. })
        );
    }

    #[tokio::test]
    async fn test_concurrent_redeems_have_single_winner() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let ledger = Arc::new(TokenLedger::new(
            clock,
            Arc::new(FixedEntropy::new(3)),
            Arc::new(MemoryLedger::new()),
        ));
        let raw = ledger
            .issue("subject", TokenPurpose::MagicLink, durations::MINUTE_MS)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for _ in 0..16 {
            let ledger = Arc::clone(&ledger);
            let raw = raw.clone();
            handles.push(tokio::spawn(async move {
                ledger.redeem(raw.expose(), TokenPurpose::MagicLink).await
            }));
        }

        let mut winners = 0;
        let mut already_used = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => winners += 1,
                Err(VeilError::AlreadyUsed { .. }) => already_used += 1,
                Err(other) => panic!("unexpected outcome: {other}"),
            }
        }
        assert_eq!(winners, 1);
        assert_eq!(already_used, 15);
    }

    #[tokio::test]
    async fn test_purge_drops_used_and_expired_only() {
        let f = fixture();
        let used = f
            .ledger
            .issue("a", TokenPurpose::MagicLink, durations::HOUR_MS)
            .await
            .unwrap();
        f.ledger
            .issue("b", TokenPurpose::MagicLink, durations::MINUTE_MS)
            .await
            .unwrap();
        let live = f
            .ledger
            .issue("c", TokenPurpose::MagicLink, durations::HOUR_MS)
            .await
            .unwrap();

        f.ledger
            .redeem(used.expose(), TokenPurpose::MagicLink)
            .await
            .unwrap();
        f.clock.advance_ms(2 * durations::MINUTE_MS);

        assert_eq!(f.ledger.purge_expired().await, 2);
        assert!(f.ledger.peek(live.expose(), TokenPurpose::MagicLink).await);
    }

    #[tokio::test]
    async fn test_redemption_stands_when_durable_append_fails() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let flaky = Arc::new(FlakyLedger::new());
        let ledger = TokenLedger::new(clock, Arc::new(FixedEntropy::new(9)), flaky.clone());

        let raw = ledger
            .issue("subject", TokenPurpose::MagicLink, durations::MINUTE_MS)
            .await
            .unwrap();

        flaky.fail();
        assert_matches!(
            ledger.redeem(raw.expose(), TokenPurpose::MagicLink).await,
            Err(VeilError::UpstreamUnavailable { .. })
        );

        // The single use was consumed; a retry must not succeed, and peek
        // reports the token as no longer valid.
        flaky.recover();
        assert!(!ledger.peek(raw.expose(), TokenPurpose::MagicLink).await);
        assert_matches!(
            ledger.redeem(raw.expose(), TokenPurpose::MagicLink).await,
            Err(VeilError::AlreadyUsed { .. })
        );
    }

    #[tokio::test]
    async fn test_replay_restores_redeemed_state() {
        let clock = Arc::new(ManualClock::new(1_000_000));
        let durable = Arc::new(MemoryLedger::new());
        let entropy = Arc::new(FixedEntropy::new(11));

        let raw = {
            let ledger = TokenLedger::new(clock.clone(), entropy.clone(), durable.clone());
            let raw = ledger
                .issue("subject", TokenPurpose::MagicLink, durations::HOUR_MS)
                .await
                .unwrap();
            ledger
                .redeem(raw.expose(), TokenPurpose::MagicLink)
                .await
                .unwrap();
            raw
        };

        let rebuilt = TokenLedger::new(clock, entropy, durable);
        rebuilt.replay().await.unwrap();
        assert_matches!(
            rebuilt.redeem(raw.expose(), TokenPurpose::MagicLink).await,
            Err(VeilError::AlreadyUsed { .. })
        );
    }
}
