//! In-memory storage implementation for testing and development.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::error::Result;
use crate::read::{ReviewItem, ReviewPage, ReviewQuery, Scope};
use crate::traits::store::{ReviewStore, UpsertOutcome};
use crate::types::review::{NewReview, PoolFilter, ReviewKind, StoredReview, WindowSpec};

/// In-memory review store keyed by content identity.
///
/// Useful for testing and development. Not suitable for production as
/// data is lost on restart.
pub struct MemoryStore {
    rows: RwLock<HashMap<String, StoredReview>>,
    next_id: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
        }
    }

    /// Clear all stored data.
    pub fn clear(&self) {
        self.rows.write().unwrap().clear();
    }

    /// Number of stored reviews.
    pub fn review_count(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Insert a first-party review directly (curator/dashboard path).
    pub fn insert_manual(
        &self,
        listing_ref: impl Into<String>,
        text: impl Into<String>,
        rating: Option<f32>,
    ) -> i64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let identity = format!("manual-{id}");
        let row = StoredReview {
            id,
            identity: identity.clone(),
            kind: ReviewKind::Manual,
            listing_ref: Some(listing_ref.into()),
            source_url: String::new(),
            reviewer: None,
            rating,
            text: text.into(),
            review_date: None,
            category: String::new(),
            city: String::new(),
            created_at: Utc::now(),
        };
        self.rows.write().unwrap().insert(identity, row);
        id
    }

    /// Snapshot of all rows, for assertions.
    pub fn all_rows(&self) -> Vec<StoredReview> {
        self.rows.read().unwrap().values().cloned().collect()
    }

    fn pool_rows(&self, filter: &PoolFilter) -> Vec<StoredReview> {
        let rows = self.rows.read().unwrap();
        let mut matching: Vec<StoredReview> = rows
            .values()
            .filter(|r| r.kind == ReviewKind::Imported && filter.matches(r))
            .cloned()
            .collect();

        // Recency order: review date desc (undated last), then ingestion
        // order desc.
        matching.sort_by(|a, b| {
            b.review_date
                .cmp(&a.review_date)
                .then(b.created_at.cmp(&a.created_at))
                .then(b.id.cmp(&a.id))
        });
        matching
    }
}

#[async_trait]
impl ReviewStore for MemoryStore {
    async fn upsert_review(&self, identity: &str, review: &NewReview) -> Result<UpsertOutcome> {
        let mut rows = self.rows.write().unwrap();
        if rows.contains_key(identity) {
            return Ok(UpsertOutcome::Existed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        rows.insert(
            identity.to_string(),
            StoredReview {
                id,
                identity: identity.to_string(),
                kind: ReviewKind::Imported,
                listing_ref: review.listing_ref.clone(),
                source_url: review.source_url.clone(),
                reviewer: review.reviewer.clone(),
                rating: review.rating,
                text: review.text.clone(),
                review_date: review.review_date,
                category: review.category.clone(),
                city: review.city.clone(),
                created_at: Utc::now(),
            },
        );
        Ok(UpsertOutcome::Created)
    }

    async fn query_pool_candidates(
        &self,
        filter: &PoolFilter,
        window: &WindowSpec,
    ) -> Result<Vec<StoredReview>> {
        Ok(self
            .pool_rows(filter)
            .into_iter()
            .skip(window.offset)
            .take(window.limit)
            .collect())
    }

    async fn count_pool_candidates(&self, filter: &PoolFilter) -> Result<u64> {
        Ok(self.pool_rows(filter).len() as u64)
    }

    async fn query_reviews(&self, query: &ReviewQuery) -> Result<ReviewPage> {
        let query = query.clone().clamped();
        let rows = self.rows.read().unwrap();

        let mut matching: Vec<&StoredReview> = rows
            .values()
            .filter(|r| match query.scope {
                Scope::Pending => r.kind == ReviewKind::Imported,
                Scope::All => true,
            })
            .filter(|r| !query.pool_only || r.kind == ReviewKind::Imported)
            .filter(|r| {
                query
                    .listing_id
                    .as_ref()
                    .map_or(true, |id| r.listing_ref.as_ref() == Some(id))
            })
            .filter(|r| {
                query.search_text.as_ref().map_or(true, |needle| {
                    let needle = needle.to_lowercase();
                    r.text.to_lowercase().contains(&needle)
                        || r.reviewer
                            .as_ref()
                            .is_some_and(|name| name.to_lowercase().contains(&needle))
                })
            })
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(query.skip)
            .take(query.take)
            .map(|r| ReviewItem {
                kind: if query.pool_only && r.kind == ReviewKind::Imported {
                    ReviewKind::ImportedPool
                } else {
                    r.kind
                },
                id: r.id,
                title: None,
                rating: r.rating,
                text: r.text.clone(),
                created_at: r.created_at,
                listing_ref: r.listing_ref.clone(),
                meta: json!({
                    "source_url": r.source_url,
                    "category": r.category,
                    "city": r.city,
                    "reviewer": r.reviewer,
                    "review_date": r.review_date,
                }),
            })
            .collect();

        Ok(ReviewPage {
            items,
            total,
            take: query.take,
            skip: query.skip,
        })
    }

    async fn delete_review(&self, id: i64) -> Result<()> {
        let mut rows = self.rows.write().unwrap();
        rows.retain(|_, r| r.id != id);
        Ok(())
    }
}
