//! Claim verifier service
//!
//! The ceremony that finalizes an external-identity claim. Verification is
//! two durable transitions — redeem the token, then grant the `Verified`
//! relationship — and the ledger is only atomic per call: if the grant
//! fails after a successful redeem, the redemption stands and the failure
//! surfaces as `UpstreamUnavailable` for the caller to resolve (the claim
//! can be re-issued; the consumed token cannot be double-spent).

use crate::lookup::{LookupConfig, SocialLookup};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use veil_core::{hash, PrincipalId, ResourceId, Result, VeilError};
use veil_relational::{RelationKind, RelationshipStore};
use veil_token::{RawToken, TokenLedger, TokenPurpose};

/// Claim ceremony parameters.
#[derive(Debug, Clone, Copy)]
pub struct ClaimConfig {
    /// Claim token TTL in milliseconds
    pub ttl_ms: u64,
    /// Length of the derived verification code (≤ 12 characters)
    pub code_len: usize,
    /// Bounds applied to the social lookup
    pub lookup: LookupConfig,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 24 * veil_core::time::durations::HOUR_MS,
            code_len: 10,
            lookup: LookupConfig::default(),
        }
    }
}

/// What issuance hands back to the claimant.
#[derive(Debug)]
pub struct ClaimIssuance {
    /// The redeemable secret, presented back through the authenticated flow
    pub claim_token: RawToken,
    /// Short, human-postable code derived one-way from the token
    pub verification_code: String,
}

/// Subject payload carried inside the claim token.
#[derive(Debug, Serialize, Deserialize)]
struct ClaimSubject {
    claimant: PrincipalId,
    resource: ResourceId,
}

/// The claim verifier.
pub struct ClaimVerifier {
    tokens: Arc<TokenLedger>,
    relationships: Arc<RelationshipStore>,
    lookup: Arc<dyn SocialLookup>,
    config: ClaimConfig,
}

impl ClaimVerifier {
    /// Create a verifier over the given collaborators.
    pub fn new(
        tokens: Arc<TokenLedger>,
        relationships: Arc<RelationshipStore>,
        lookup: Arc<dyn SocialLookup>,
        config: ClaimConfig,
    ) -> Self {
        Self {
            tokens,
            relationships,
            lookup,
            config,
        }
    }

    /// Issue a claim for `claimant` on `resource`.
    ///
    /// The caller gates this with its rate-limit policy. The returned
    /// verification code is safe to post publicly; the claim token is not.
    pub async fn issue_claim(
        &self,
        resource: &ResourceId,
        claimant: &PrincipalId,
    ) -> Result<ClaimIssuance> {
        let subject = serde_json::to_string(&ClaimSubject {
            claimant: claimant.clone(),
            resource: resource.clone(),
        })
        .map_err(|e| VeilError::invalid(format!("claim subject encoding: {e}")))?;

        let claim_token = self
            .tokens
            .issue(subject, TokenPurpose::Claim, self.config.ttl_ms)
            .await?;
        let verification_code = hash::claim_code(claim_token.expose(), self.config.code_len);

        tracing::debug!(%resource, %claimant, "claim issued");
        Ok(ClaimIssuance {
            claim_token,
            verification_code,
        })
    }

    /// Verify a claim against a social post and record the relationship.
    ///
    /// Fails closed on the lookup (`LookupFailed` for any error, timeout, or
    /// oversized response), `CodeMismatch` if the post lacks the derived
    /// code, and propagates the token ledger's `NotFound`/`Expired`/
    /// `AlreadyUsed` from redemption. On success the claimant holds a
    /// `Verified` relationship on the resource.
    pub async fn verify_claim(
        &self,
        claim_token: &str,
        social_post_url: &str,
    ) -> Result<PrincipalId> {
        let content = self.fetch_bounded(social_post_url).await?;

        let expected_code = hash::claim_code(claim_token, self.config.code_len);
        if !content.contains(&expected_code) {
            tracing::debug!(url = social_post_url, "claim post lacks verification code");
            return Err(VeilError::code_mismatch(
                "social post does not contain the verification code",
            ));
        }

        let subject = self.tokens.redeem(claim_token, TokenPurpose::Claim).await?;
        let ClaimSubject { claimant, resource } = serde_json::from_str(&subject)
            .map_err(|e| VeilError::invalid(format!("claim subject decoding: {e}")))?;

        // Second durable transition; may fail after the redeem committed.
        self.relationships
            .grant(&claimant, &resource, RelationKind::Verified)
            .await?;

        tracing::debug!(%resource, %claimant, "claim verified");
        Ok(claimant)
    }

    /// Fetch the post under the configured time and size bounds.
    async fn fetch_bounded(&self, url: &str) -> Result<String> {
        let deadline = Duration::from_millis(self.config.lookup.timeout_ms);
        let fetched = tokio::time::timeout(deadline, self.lookup.fetch_post(url)).await;

        let content = match fetched {
            Err(_) => {
                return Err(VeilError::lookup_failed("social lookup timed out"));
            }
            Ok(Err(err)) => {
                tracing::debug!(url, %err, "social lookup error");
                return Err(VeilError::lookup_failed("social lookup failed"));
            }
            Ok(Ok(content)) => content,
        };

        if content.len() > self.config.lookup.max_bytes {
            return Err(VeilError::lookup_failed("social post exceeds size bound"));
        }
        Ok(content)
    }
}
