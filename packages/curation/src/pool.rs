//! Deterministic review pool sampler.
//!
//! Given a large shared corpus of ingested reviews, selects a small,
//! stable-looking, listing-specific subset for display without persisting
//! a per-listing copy. The selection is a pure function of the listing
//! seed and the candidate set: safe to cache, never required to be.
//!
//! The stride walk (`step = 1 + hash mod 7`) avoids the easily-guessable
//! "first N" pattern while staying cheap: no persisted randomness, no
//! shuffle state. The modulus of 7 is an empirically tuned constant, kept
//! as-is.

use tracing::debug;

use crate::classifier::ReviewClassifier;
use crate::error::Result;
use crate::identity::{seed_hash, stable_display_id};
use crate::traits::store::ReviewStore;
use crate::types::review::{PoolFilter, StoredReview, WindowSpec};

/// Pool sizing and display-id knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Target number of reviews per pool. Default: 30.
    pub pool_size: usize,

    /// Cap on the initial candidate window. Default: 400.
    pub window_cap: usize,

    /// Cap on the expanded window used when the first pass starves.
    /// Default: 700.
    pub expanded_window_cap: usize,

    /// Base offset for stable display identifiers.
    pub id_base_offset: i64,

    /// Size of the display identifier range.
    pub id_range: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 30,
            window_cap: 400,
            expanded_window_cap: 700,
            id_base_offset: 100_000,
            id_range: 900_000,
        }
    }
}

impl PoolConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the pool size.
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size.max(1);
        self
    }

    /// Set the window caps.
    pub fn with_window_caps(mut self, window: usize, expanded: usize) -> Self {
        self.window_cap = window.max(1);
        self.expanded_window_cap = expanded.max(window);
        self
    }
}

/// One review selected into a pool.
#[derive(Debug, Clone)]
pub struct PooledReview {
    pub review: StoredReview,

    /// Stable externally-visible identifier for this (listing, item) pair.
    pub display_id: i64,

    /// Position within this listing's pool; drives combined ordering.
    pub pool_order: usize,
}

/// The sampler. Stateless apart from configuration; safe for unlimited
/// concurrent use.
pub struct PoolSampler {
    config: PoolConfig,
    classifier: ReviewClassifier,
}

impl PoolSampler {
    /// Create a sampler.
    pub fn new(config: PoolConfig, classifier: ReviewClassifier) -> Self {
        Self { config, classifier }
    }

    /// Sample the pool for one listing.
    ///
    /// An empty corpus is a normal "nothing to show" state and yields an
    /// empty pool, not an error.
    pub async fn sample<S: ReviewStore>(
        &self,
        store: &S,
        filter: &PoolFilter,
        listing_seed: &str,
    ) -> Result<Vec<PooledReview>> {
        let total = store.count_pool_candidates(filter).await? as usize;
        if total == 0 {
            return Ok(Vec::new());
        }

        let hash = seed_hash(listing_seed);

        // First window pass.
        let window = self.config.pool_size.max(self.config.window_cap.min(total));
        let mut survivors = self
            .load_window(store, filter, hash, total, window)
            .await?;

        // Starved and there is more corpus to look at: one bounded
        // expanded reload before giving up.
        if survivors.len() < self.config.pool_size && total > window {
            let expanded = self.config.expanded_window_cap.min(total);
            if expanded > window {
                debug!(
                    listing_seed,
                    survivors = survivors.len(),
                    expanded, "pool starved, reloading expanded window"
                );
                survivors = self
                    .load_window(store, filter, hash, total, expanded)
                    .await?;
            }
        }

        let selected = if survivors.len() <= self.config.pool_size {
            survivors
        } else {
            stride_walk(survivors, hash, self.config.pool_size)
        };

        Ok(selected
            .into_iter()
            .enumerate()
            .map(|(pool_order, review)| {
                let display_id = stable_display_id(
                    listing_seed,
                    review.id,
                    self.config.id_base_offset,
                    self.config.id_range,
                );
                PooledReview {
                    review,
                    display_id,
                    pool_order,
                }
            })
            .collect())
    }

    /// Load one recency-ordered window and re-run the classifier over it
    /// (defense in depth against corpus drift since ingestion).
    async fn load_window<S: ReviewStore>(
        &self,
        store: &S,
        filter: &PoolFilter,
        hash: u64,
        total: usize,
        window: usize,
    ) -> Result<Vec<StoredReview>> {
        // Spread different listings across different slices of the shared
        // corpus while staying deterministic for a fixed seed.
        let offset = if total > window {
            (hash % (total - window + 1) as u64) as usize
        } else {
            0
        };

        let loaded = store
            .query_pool_candidates(
                filter,
                &WindowSpec {
                    offset,
                    limit: window,
                },
            )
            .await?;

        Ok(loaded
            .into_iter()
            .filter(|r| self.classifier.classify(&r.text).kept)
            .collect())
    }
}

/// Deterministic stride walk over the surviving candidates.
///
/// Takes the item at the current index, skipping indices already used,
/// advancing by a seed-derived step, until `count` distinct items are
/// collected.
fn stride_walk(pool: Vec<StoredReview>, hash: u64, count: usize) -> Vec<StoredReview> {
    let len = pool.len();
    let count = count.min(len);
    let step = 1 + (hash % 7) as usize;
    let mut index = (hash % len as u64) as usize;

    let mut used = vec![false; len];
    let mut picks = Vec::with_capacity(count);

    while picks.len() < count {
        // Probe forward to the next unused slot.
        while used[index] {
            index = (index + 1) % len;
        }
        used[index] = true;
        picks.push(index);
        index = (index + step) % len;
    }

    let mut items: Vec<Option<StoredReview>> = pool.into_iter().map(Some).collect();
    picks
        .into_iter()
        .map(|i| items[i].take().expect("stride walk picks are distinct"))
        .collect()
}

/// Concatenate several listings' pools, keeping each listing's slice
/// contiguous and stable: ordered by `(listing_id, pool_order)`.
pub fn combine_pools(pools: Vec<(String, Vec<PooledReview>)>) -> Vec<(String, PooledReview)> {
    let mut combined: Vec<(String, PooledReview)> = pools
        .into_iter()
        .flat_map(|(listing_id, pool)| {
            pool.into_iter().map(move |item| (listing_id.clone(), item))
        })
        .collect();

    combined.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.pool_order.cmp(&b.1.pool_order)));
    combined
}
