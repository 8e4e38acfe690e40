//! Review records as they move through the pipeline.
//!
//! A review enters as part of a [`crate::traits::extractor::RawDetailRecord`],
//! survives classification, gets a content identity, and is persisted as a
//! [`StoredReview`] keyed by that identity. Stored rows are create-once:
//! re-ingesting the same content is a no-op.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Origin of a stored review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewKind {
    /// Entered by a first-party user or curator.
    Manual,
    /// Ingested from a third-party site.
    Imported,
    /// Imported review served through the pool sampler.
    ImportedPool,
}

impl ReviewKind {
    /// Wire name used by the read API.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Imported => "imported",
            Self::ImportedPool => "imported_pool",
        }
    }
}

/// A review that passed classification and is ready to persist.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewReview {
    /// First-party listing this review is attached to, if resolved.
    pub listing_ref: Option<String>,

    /// Detail page the review was extracted from.
    pub source_url: String,

    /// Reviewer display name, if the source exposed one.
    pub reviewer: Option<String>,

    /// Numeric rating, if the source exposed one. Never mutated by the
    /// classifier.
    pub rating: Option<f32>,

    /// Cleaned review text (reply-stripped, whitespace-normalized).
    pub text: String,

    /// Review date as published by the source.
    pub review_date: Option<NaiveDate>,

    /// Source category the review was found under.
    pub category: String,

    /// Source city/section the review was found under.
    pub city: String,
}

/// A durable review row owned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredReview {
    /// Store-assigned row id.
    pub id: i64,

    /// Content identity; the idempotency key for upserts.
    pub identity: String,

    pub kind: ReviewKind,
    pub listing_ref: Option<String>,
    pub source_url: String,
    pub reviewer: Option<String>,
    pub rating: Option<f32>,
    pub text: String,
    pub review_date: Option<NaiveDate>,
    pub category: String,
    pub city: String,

    /// When this row was first ingested.
    pub created_at: DateTime<Utc>,
}

/// Storage-level filter for pool candidate queries.
///
/// The store applies the cheap checks (category/city match, non-empty text,
/// minimum length, banned-phrase substring filter); the sampler re-runs the
/// full classifier on whatever comes back.
#[derive(Debug, Clone, Default)]
pub struct PoolFilter {
    /// Only reviews found under this category (None = any).
    pub category: Option<String>,

    /// Only reviews found under this city/section (None = any).
    pub city: Option<String>,

    /// Minimum text length in characters.
    pub min_len: usize,

    /// Case-insensitive substrings that disqualify a row at query level.
    pub banned_phrases: Vec<String>,
}

impl PoolFilter {
    /// Filter scoped to a category and city.
    pub fn for_section(category: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            category: Some(category.into()),
            city: Some(city.into()),
            ..Default::default()
        }
    }

    /// Set the minimum length.
    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    /// Set the banned-phrase prefilter.
    pub fn with_banned_phrases(mut self, phrases: Vec<String>) -> Self {
        self.banned_phrases = phrases;
        self
    }

    /// Check a stored row against this filter.
    pub fn matches(&self, review: &StoredReview) -> bool {
        if let Some(category) = &self.category {
            if &review.category != category {
                return false;
            }
        }
        if let Some(city) = &self.city {
            if &review.city != city {
                return false;
            }
        }
        let text = review.text.trim();
        if text.is_empty() || text.chars().count() < self.min_len {
            return false;
        }
        let lower = text.to_lowercase();
        if self.banned_phrases.iter().any(|p| lower.contains(&p.to_lowercase())) {
            return false;
        }
        true
    }
}

/// Offset/limit window into the candidate corpus, ordered by recency.
#[derive(Debug, Clone, Copy)]
pub struct WindowSpec {
    pub offset: usize,
    pub limit: usize,
}
