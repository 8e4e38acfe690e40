//! Test doubles.
//!
//! [`MockExtractor`] is scripted per URL: listing pages, detail records,
//! and a queue of failures that is drained before the scripted success is
//! returned (so retry paths can be exercised deterministically).
//! [`FlakyStore`] wraps any store and fails the first N upserts with a
//! transient storage error.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{FetchError, IngestError, Result};
use crate::read::{ReviewPage, ReviewQuery};
use crate::traits::extractor::{CandidateReference, ListLocator, PageExtractor, RawDetailRecord};
use crate::traits::store::{ReviewStore, UpsertOutcome};
use crate::types::review::{NewReview, PoolFilter, StoredReview, WindowSpec};

/// A recorded call made against a [`MockExtractor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    FetchList { url: String },
    FetchDetail { url: String },
}

/// Scripted extractor for tests.
///
/// Unknown listing URLs return an empty candidate list; unknown detail
/// URLs fail fatally so a mis-scripted test surfaces immediately.
#[derive(Default)]
pub struct MockExtractor {
    lists: HashMap<String, Vec<CandidateReference>>,
    details: HashMap<String, RawDetailRecord>,
    failures: Mutex<HashMap<String, VecDeque<FetchError>>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockExtractor {
    /// Create an empty mock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the candidates returned for a listing URL.
    pub fn with_listing(
        mut self,
        url: impl Into<String>,
        candidates: Vec<CandidateReference>,
    ) -> Self {
        self.lists.insert(url.into(), candidates);
        self
    }

    /// Script a detail record, keyed by its own URL.
    pub fn with_detail(mut self, record: RawDetailRecord) -> Self {
        self.details.insert(record.url.clone(), record);
        self
    }

    /// Queue failures for a URL. Each fetch of that URL pops one failure
    /// until the queue is empty, then the scripted success applies.
    pub fn with_failures(self, url: impl Into<String>, failures: Vec<FetchError>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .entry(url.into())
            .or_default()
            .extend(failures);
        self
    }

    /// Calls recorded so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of fetches (list + detail) made against a URL.
    pub fn fetch_count(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| match c {
                MockCall::FetchList { url: u } | MockCall::FetchDetail { url: u } => u == url,
            })
            .count()
    }

    fn take_failure(&self, url: &str) -> Option<FetchError> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl PageExtractor for MockExtractor {
    async fn fetch_list(
        &self,
        locator: &ListLocator,
    ) -> std::result::Result<Vec<CandidateReference>, FetchError> {
        self.calls.lock().unwrap().push(MockCall::FetchList {
            url: locator.url.clone(),
        });

        if let Some(failure) = self.take_failure(&locator.url) {
            return Err(failure);
        }

        Ok(self.lists.get(&locator.url).cloned().unwrap_or_default())
    }

    async fn fetch_detail(
        &self,
        reference: &CandidateReference,
    ) -> std::result::Result<RawDetailRecord, FetchError> {
        self.calls.lock().unwrap().push(MockCall::FetchDetail {
            url: reference.url.clone(),
        });

        if let Some(failure) = self.take_failure(&reference.url) {
            return Err(failure);
        }

        self.details
            .get(&reference.url)
            .cloned()
            .ok_or_else(|| FetchError::Fatal(format!("no scripted detail for {}", reference.url)))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Store wrapper that fails the first N upserts transiently, then
/// delegates.
pub struct FlakyStore<S> {
    inner: S,
    remaining_failures: AtomicU32,
}

impl<S> FlakyStore<S> {
    /// Wrap a store so its first `failures` upserts fail transiently.
    pub fn new(inner: S, failures: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(failures),
        }
    }

    /// Access the wrapped store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn should_fail(&self) -> bool {
        self.remaining_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl<S: ReviewStore> ReviewStore for FlakyStore<S> {
    async fn upsert_review(&self, identity: &str, review: &NewReview) -> Result<UpsertOutcome> {
        if self.should_fail() {
            return Err(IngestError::TransientStorage("injected failure".into()));
        }
        self.inner.upsert_review(identity, review).await
    }

    async fn query_pool_candidates(
        &self,
        filter: &PoolFilter,
        window: &WindowSpec,
    ) -> Result<Vec<StoredReview>> {
        self.inner.query_pool_candidates(filter, window).await
    }

    async fn count_pool_candidates(&self, filter: &PoolFilter) -> Result<u64> {
        self.inner.count_pool_candidates(filter).await
    }

    async fn query_reviews(&self, query: &ReviewQuery) -> Result<ReviewPage> {
        self.inner.query_reviews(query).await
    }

    async fn delete_review(&self, id: i64) -> Result<()> {
        self.inner.delete_review(id).await
    }
}
