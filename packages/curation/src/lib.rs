//! Third-Party Review Ingestion and Curation Library
//!
//! Ingests published reviews from third-party listing sites, normalizes
//! contacts, filters out templated/self-promotional text with a heuristic
//! classifier, deduplicates by content identity, and serves deterministic
//! per-listing review pools to a read API.
//!
//! # Design Philosophy
//!
//! - Pluggable seams: page extraction and storage are traits; the pipeline
//!   only sees extracted field contracts
//! - Idempotent by construction: every ingested review is keyed by a
//!   content identity hash, so re-runs are safe
//! - Polite by default: bounded concurrency, randomized delays, hard rate
//!   limits, and challenge-aware retries
//! - Deterministic presentation: pool sampling is a pure function of the
//!   listing seed and corpus, stable across requests
//!
//! # Usage
//!
//! ```rust,ignore
//! use curation::{ingest, IngestConfig, MemoryStore, ReviewClassifier, WorkUnit};
//! use curation::testing::MockExtractor;
//! use curation::traits::extractor::ListLocator;
//! use curation::types::config::ContactConfig;
//!
//! let extractor = MockExtractor::new();
//! let store = MemoryStore::new();
//! let classifier = ReviewClassifier::default();
//!
//! let units = vec![WorkUnit::new(ListLocator::new(
//!     "https://example.com/escort/milano",
//!     "escort",
//!     "milano",
//! ))];
//!
//! let report = ingest(
//!     &extractor,
//!     &store,
//!     &classifier,
//!     &ContactConfig::default(),
//!     &IngestConfig::from_env(),
//!     &units,
//! )
//! .await;
//! ```
//!
//! # Modules
//!
//! - [`traits`] - Core trait abstractions (PageExtractor, ReviewStore)
//! - [`types`] - Review, filter, and configuration types
//! - [`ingest`] - Ingestion orchestrator
//! - [`retry`] - Retry and challenge-handling controller
//! - [`contact`] - Phone/WhatsApp normalization
//! - [`classifier`] - Heuristic review text classifier
//! - [`identity`] - Content identity and seed hashing
//! - [`pool`] - Deterministic per-listing pool sampling
//! - [`read`] - Read-side query types
//! - [`stores`] - Storage implementations (MemoryStore)
//! - [`extractors`] - Extractor wrappers (rate limiting)
//! - [`security`] - SSRF protection for fetched URLs
//! - [`testing`] - Mock implementations for testing

pub mod classifier;
pub mod contact;
pub mod error;
pub mod extractors;
pub mod identity;
pub mod ingest;
pub mod pool;
pub mod read;
pub mod retry;
pub mod security;
pub mod stores;
pub mod testing;
pub mod traits;
pub mod types;

// Re-export core types at crate root
pub use error::{FetchError, IngestError, SecurityError};
pub use traits::{
    extractor::{
        CandidateReference, ChallengeSignatures, ListLocator, PageExtractor, RawDetailRecord,
        RawReviewBlock, ValidatedExtractor,
    },
    store::{ReviewStore, UpsertOutcome},
};
pub use types::{
    config::{ContactConfig, IngestConfig},
    review::{NewReview, PoolFilter, ReviewKind, StoredReview, WindowSpec},
};

// Re-export the pipeline entry points
pub use ingest::{ingest, ingest_unit, RunReport, UnitReport, WorkUnit};

// Re-export pipeline components
pub use classifier::{ClassifiedReview, ClassifierConfig, RejectReason, ReviewClassifier};
pub use contact::NormalizedContact;
pub use identity::{seed_hash, source_identity, stable_display_id};
pub use pool::{PoolConfig, PoolSampler, PooledReview};
pub use read::{ReviewItem, ReviewPage, ReviewQuery, Scope};
pub use retry::{run_with_retry, Attempted, ChallengeMode, RetryPolicy};

// Re-export stores
pub use stores::MemoryStore;

// Re-export extractor wrappers
pub use extractors::{ExtractorExt, RateLimitedExtractor};
pub use security::UrlValidator;

// Re-export testing utilities
pub use testing::{FlakyStore, MockCall, MockExtractor};
