//! Read API surface consumed by presentation layers.
//!
//! Offset pagination with a `{ items, total, take, skip }` envelope. The
//! query is executed by the store ([`crate::traits::store::ReviewStore`]);
//! this module owns the request/response contract and input clamping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::review::ReviewKind;

/// Maximum page size served to presentation layers.
pub const MAX_TAKE: usize = 100;

/// Default page size.
pub const DEFAULT_TAKE: usize = 20;

/// Curation scope of a review query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Imported reviews awaiting curation.
    Pending,
    /// Everything.
    All,
}

/// A paginated review query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewQuery {
    pub scope: Scope,

    /// Restrict to one listing.
    pub listing_id: Option<String>,

    /// Case-insensitive substring match against title, text, and reviewer.
    pub search_text: Option<String>,

    pub take: usize,
    pub skip: usize,

    /// Only reviews eligible for pool display; items are reported with
    /// kind `imported_pool`.
    pub pool_only: bool,
}

impl Default for ReviewQuery {
    fn default() -> Self {
        Self {
            scope: Scope::All,
            listing_id: None,
            search_text: None,
            take: DEFAULT_TAKE,
            skip: 0,
            pool_only: false,
        }
    }
}

impl ReviewQuery {
    /// Create a query over everything with default pagination.
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a query over imported reviews awaiting curation.
    pub fn pending() -> Self {
        Self {
            scope: Scope::Pending,
            ..Self::default()
        }
    }

    /// Restrict to one listing.
    pub fn for_listing(mut self, listing_id: impl Into<String>) -> Self {
        self.listing_id = Some(listing_id.into());
        self
    }

    /// Set a search string.
    pub fn with_search(mut self, text: impl Into<String>) -> Self {
        self.search_text = Some(text.into());
        self
    }

    /// Set pagination.
    pub fn paginate(mut self, take: usize, skip: usize) -> Self {
        self.take = take;
        self.skip = skip;
        self
    }

    /// Only pool-eligible reviews.
    pub fn pool_only(mut self) -> Self {
        self.pool_only = true;
        self
    }

    /// Clamp pagination inputs to sane bounds.
    pub fn clamped(mut self) -> Self {
        if self.take == 0 {
            self.take = DEFAULT_TAKE;
        }
        self.take = self.take.min(MAX_TAKE);
        self
    }
}

/// One review as served to presentation layers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewItem {
    pub kind: ReviewKind,
    pub id: i64,
    pub title: Option<String>,
    pub rating: Option<f32>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub listing_ref: Option<String>,

    /// Source metadata (source URL, category, city).
    pub meta: serde_json::Value,
}

/// Paginated query result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewPage {
    pub items: Vec<ReviewItem>,
    pub total: u64,
    pub take: usize,
    pub skip: usize,
}

impl ReviewPage {
    /// An empty page echoing the query's pagination.
    pub fn empty(query: &ReviewQuery) -> Self {
        Self {
            items: Vec::new(),
            total: 0,
            take: query.take,
            skip: query.skip,
        }
    }
}
