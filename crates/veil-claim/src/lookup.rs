//! Social lookup boundary
//!
//! The social network is an external collaborator exposed as an effect
//! trait. The verifier — not the collaborator — enforces the response
//! bounds: a byte cap on content and a timeout on the call. Anything
//! outside those bounds is a verification failure, never a success.

use async_trait::async_trait;
use std::sync::Arc;
use veil_core::time::durations;
use veil_core::Result;

/// Bounds the verifier applies to every lookup.
#[derive(Debug, Clone, Copy)]
pub struct LookupConfig {
    /// Maximum accepted post content size in bytes
    pub max_bytes: usize,
    /// Lookup deadline in milliseconds
    pub timeout_ms: u64,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_bytes: 64 * 1024,
            timeout_ms: 10 * durations::SECOND_MS,
        }
    }
}

/// Fetches the text content of a social post by URL.
#[async_trait]
pub trait SocialLookup: Send + Sync {
    /// Fetch the post's text content. Implementations surface transport
    /// and not-found failures as errors; the verifier treats every error
    /// identically (fail closed).
    async fn fetch_post(&self, url: &str) -> Result<String>;
}

#[async_trait]
impl<T: SocialLookup + ?Sized> SocialLookup for Arc<T> {
    async fn fetch_post(&self, url: &str) -> Result<String> {
        (**self).fetch_post(url).await
    }
}
