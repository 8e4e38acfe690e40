//! Storage trait for persisted reviews.
//!
//! The relational schema and transaction manager live outside the library;
//! the pipeline only needs an idempotent key-value upsert plus the two
//! window queries the pool sampler runs. Everything is keyed by content
//! identity, so re-runs and at-least-once delivery are safe without
//! cross-worker locking.

use async_trait::async_trait;

use crate::error::Result;
use crate::read::{ReviewPage, ReviewQuery};
use crate::types::review::{NewReview, PoolFilter, StoredReview, WindowSpec};

/// Outcome of an idempotent upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new row was created.
    Created,
    /// A row with this identity already existed; nothing was written.
    Existed,
}

/// Durable store for reviews.
///
/// All mutations are create-if-absent at the identity level; a stored row
/// is never overwritten by re-ingestion, so curator edits survive
/// re-scrapes.
#[async_trait]
pub trait ReviewStore: Send + Sync {
    /// Idempotently persist a review under its content identity.
    ///
    /// Returns `Created` on first insert, `Existed` (no write) on every
    /// subsequent call with the same identity.
    async fn upsert_review(&self, identity: &str, review: &NewReview) -> Result<UpsertOutcome>;

    /// Load a window of pool candidates matching the filter, ordered by
    /// review date descending, then ingestion time descending.
    async fn query_pool_candidates(
        &self,
        filter: &PoolFilter,
        window: &WindowSpec,
    ) -> Result<Vec<StoredReview>>;

    /// Count rows matching the pool filter.
    async fn count_pool_candidates(&self, filter: &PoolFilter) -> Result<u64>;

    /// Paginated read surface for presentation layers.
    async fn query_reviews(&self, query: &ReviewQuery) -> Result<ReviewPage>;

    /// Remove a review (external moderation action). Deleting an unknown
    /// id is a no-op.
    async fn delete_review(&self, id: i64) -> Result<()>;
}
