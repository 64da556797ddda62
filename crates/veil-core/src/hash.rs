//! Domain-separated hashing helpers
//!
//! Every digest in Veil is prefixed with a domain label so that a hash
//! computed for one purpose can never collide with a hash computed for
//! another (a token hash is not a subject digest is not a verification
//! code, even over identical input bytes).

use sha2::{Digest, Sha256};

/// Domain label for bearer-token hashes.
pub const TOKEN_DOMAIN: &[u8] = b"veil-token";

/// Domain label for salted subject (email) digests.
pub const SUBJECT_DOMAIN: &[u8] = b"veil-subject";

/// Domain label for human-postable claim verification codes.
pub const CLAIM_CODE_DOMAIN: &[u8] = b"veil-claim-code";

/// Compute a domain-separated SHA-256 digest.
pub fn digest(domain: &[u8], payload: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(domain);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Compute a domain-separated digest and render it as lowercase hex.
pub fn digest_hex(domain: &[u8], payload: &[u8]) -> String {
    hex::encode(digest(domain, payload))
}

/// Hash a raw bearer token for storage. The raw value is never persisted;
/// lookups re-hash the presented token and compare digests.
pub fn token_hash(raw_token: &str) -> String {
    digest_hex(TOKEN_DOMAIN, raw_token.as_bytes())
}

/// Hash a subject (e.g. an email address) with a deployment salt so no
/// cleartext PII is ever stored. Input is lowercased first so that
/// `A@B.com` and `a@b.com` map to the same principal.
pub fn subject_hash(salt: &str, subject: &str) -> String {
    let normalized = subject.trim().to_lowercase();
    let mut payload = Vec::with_capacity(salt.len() + normalized.len());
    payload.extend_from_slice(salt.as_bytes());
    payload.extend_from_slice(normalized.as_bytes());
    digest_hex(SUBJECT_DOMAIN, &payload)
}

/// Derive the short, human-postable verification code for a claim token.
///
/// The code is a one-way truncated digest of the raw token: safe to post
/// publicly because it cannot be reversed into the redeemable secret.
pub fn claim_code(raw_token: &str, len: usize) -> String {
    let mut code = digest_hex(CLAIM_CODE_DOMAIN, raw_token.as_bytes());
    code.truncate(len);
    code
}
