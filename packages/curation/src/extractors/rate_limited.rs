//! Rate-limited extractor wrapper.
//!
//! Wraps any PageExtractor with a hard requests-per-second ceiling using
//! the governor crate. This complements the orchestrator's randomized
//! politeness delays: the delay spaces requests within one worker, the
//! quota bounds the whole process.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};

use crate::error::FetchResult;
use crate::traits::extractor::{CandidateReference, ListLocator, PageExtractor, RawDetailRecord};

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// An extractor wrapper that enforces rate limits.
pub struct RateLimitedExtractor<E: PageExtractor> {
    inner: E,
    limiter: Arc<DefaultRateLimiter>,
}

impl<E: PageExtractor> RateLimitedExtractor<E> {
    /// Create a new rate-limited extractor.
    ///
    /// # Arguments
    /// * `extractor` - The underlying extractor to wrap
    /// * `requests_per_second` - Maximum requests per second
    pub fn new(extractor: E, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self {
            inner: extractor,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Create with a custom quota.
    pub fn with_quota(extractor: E, quota: Quota) -> Self {
        Self {
            inner: extractor,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

#[async_trait]
impl<E: PageExtractor> PageExtractor for RateLimitedExtractor<E> {
    async fn fetch_list(&self, locator: &ListLocator) -> FetchResult<Vec<CandidateReference>> {
        self.wait_for_permit().await;
        self.inner.fetch_list(locator).await
    }

    async fn fetch_detail(&self, reference: &CandidateReference) -> FetchResult<RawDetailRecord> {
        self.wait_for_permit().await;
        self.inner.fetch_detail(reference).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Extension trait for easy rate limiting.
pub trait ExtractorExt: PageExtractor + Sized {
    /// Wrap this extractor with rate limiting.
    fn rate_limited(self, requests_per_second: u32) -> RateLimitedExtractor<Self> {
        RateLimitedExtractor::new(self, requests_per_second)
    }
}

impl<E: PageExtractor + Sized> ExtractorExt for E {}
