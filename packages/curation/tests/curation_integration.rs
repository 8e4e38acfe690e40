//! Integration tests for the full ingestion-to-pool workflow.
//!
//! These tests run the real pipeline end to end against scripted
//! extractors and the in-memory store:
//! 1. Extract candidates from a listing page
//! 2. Fetch detail records (with retries and challenge handling)
//! 3. Normalize contacts and classify review text
//! 4. Upsert by content identity
//! 5. Sample deterministic per-listing pools from the shared corpus

use curation::testing::MockExtractor;
use curation::{
    contact, ingest, ingest_unit, CandidateReference, ContactConfig, FetchError, IngestConfig,
    ListLocator, MemoryStore, PoolConfig, PoolFilter, PoolSampler, RawDetailRecord, RawReviewBlock,
    RetryPolicy, ReviewClassifier, ReviewQuery, WorkUnit,
};
use proptest::prelude::*;
use std::time::Duration;

const AUTHENTIC_REVIEW: &str = "Ragazza davvero come in foto, appuntamento puntuale e \
    appartamento pulito in zona comoda e tranquilla, esperienza piacevole che ripeterei.";

const REVIEW_WITH_REPLY: &str = "Ragazza splendida e molto educata, appuntamento puntuale, \
    posto pulito e riservato, esperienza che consiglio a tutti senza alcun dubbio. \
    L'inserzionista ha risposto: grazie tesoro, ti aspetto presto!";

const PROMOTIONAL_REVIEW: &str = "Grazie a tutti i miei visitatori per le belle parole, \
    vi aspetto numerosi nel mio appartamento riservato e accogliente.";

fn fast_config() -> IngestConfig {
    IngestConfig::new()
        .with_politeness_ms(0, 1)
        .with_retry(
            RetryPolicy::new()
                .with_max_attempts(4)
                .with_backoff_base(Duration::from_millis(1))
                .with_max_jitter(Duration::ZERO),
        )
}

fn milano_unit() -> WorkUnit {
    WorkUnit::new(ListLocator::new(
        "https://example.com/escort/milano",
        "escort",
        "milano",
    ))
}

fn listing_with(details: Vec<RawDetailRecord>) -> MockExtractor {
    let candidates = details
        .iter()
        .map(|d| CandidateReference::new(d.url.as_str(), "escort", "milano"))
        .collect();
    let mut mock =
        MockExtractor::new().with_listing("https://example.com/escort/milano", candidates);
    for detail in details {
        mock = mock.with_detail(detail);
    }
    mock
}

#[tokio::test]
async fn test_promotional_text_is_rejected() {
    let extractor = listing_with(vec![RawDetailRecord::new(
        "https://example.com/ad/1",
        "Titolo",
    )
    .with_contact("333 1234567")
    .with_review(RawReviewBlock::new(PROMOTIONAL_REVIEW))]);

    let store = MemoryStore::new();
    let report = ingest_unit(
        &extractor,
        &store,
        &ReviewClassifier::default(),
        &ContactConfig::default(),
        &fast_config(),
        &milano_unit(),
    )
    .await
    .unwrap();

    assert_eq!(report.imported, 0);
    assert_eq!(report.skipped, 1);
    assert_eq!(store.review_count(), 0);
}

#[tokio::test]
async fn test_authentic_text_is_kept_with_reply_stripped() {
    let extractor = listing_with(vec![RawDetailRecord::new(
        "https://example.com/ad/1",
        "Titolo",
    )
    .with_contact("333 1234567")
    .with_review(RawReviewBlock::new(REVIEW_WITH_REPLY).with_rating(5.0))]);

    let store = MemoryStore::new();
    let report = ingest_unit(
        &extractor,
        &store,
        &ReviewClassifier::default(),
        &ContactConfig::default(),
        &fast_config(),
        &milano_unit(),
    )
    .await
    .unwrap();

    assert_eq!(report.imported, 1);
    let rows = store.all_rows();
    assert_eq!(rows.len(), 1);
    assert!(!rows[0].text.contains("ha risposto"));
    assert!(!rows[0].text.contains("ti aspetto"));
    assert_eq!(rows[0].rating, Some(5.0));
}

#[tokio::test]
async fn test_contact_normalization_formats() {
    let config = ContactConfig::default();

    // Domestic mobile with spaces.
    assert_eq!(
        contact::normalize_phone("333 1234567", &config),
        Some("+393331234567".to_string())
    );
    // Already international.
    assert_eq!(
        contact::normalize_phone("+39 333 1234567", &config),
        Some("+393331234567".to_string())
    );
    // Country code without plus.
    assert_eq!(
        contact::normalize_phone("393331234567", &config),
        Some("+393331234567".to_string())
    );
    // WhatsApp deep link from a raw link string.
    assert_eq!(
        contact::normalize_whatsapp("https://wa.me/393331234567", &config),
        Some("https://wa.me/393331234567".to_string())
    );
}

#[tokio::test]
async fn test_transient_failures_recover_with_recorded_retries() {
    let extractor = listing_with(vec![RawDetailRecord::new(
        "https://example.com/ad/1",
        "Titolo",
    )
    .with_contact("333 1234567")
    .with_review(RawReviewBlock::new(AUTHENTIC_REVIEW))])
    .with_failures(
        "https://example.com/ad/1",
        vec![
            FetchError::TransientNetwork("connection reset".into()),
            FetchError::TransientNetwork("connection reset".into()),
            FetchError::Timeout {
                url: "https://example.com/ad/1".into(),
            },
        ],
    );

    let store = MemoryStore::new();
    let report = ingest_unit(
        &extractor,
        &store,
        &ReviewClassifier::default(),
        &ContactConfig::default(),
        &fast_config(),
        &milano_unit(),
    )
    .await
    .unwrap();

    assert_eq!(report.imported, 1);
    assert_eq!(report.retries, 3);
    // Initial attempt plus three retries.
    assert_eq!(extractor.fetch_count("https://example.com/ad/1"), 4);
}

#[tokio::test]
async fn test_reingestion_creates_no_duplicates() {
    let extractor = listing_with(vec![RawDetailRecord::new(
        "https://example.com/ad/1",
        "Titolo",
    )
    .with_contact("333 1234567")
    .with_review(
        RawReviewBlock::new(AUTHENTIC_REVIEW)
            .with_reviewer("marco")
            .with_rating(5.0),
    )]);

    let store = MemoryStore::new();
    let classifier = ReviewClassifier::default();
    let contact_config = ContactConfig::default();
    let config = fast_config();

    for _ in 0..3 {
        ingest_unit(
            &extractor,
            &store,
            &classifier,
            &contact_config,
            &config,
            &milano_unit(),
        )
        .await
        .unwrap();
    }

    assert_eq!(store.review_count(), 1);
}

#[tokio::test]
async fn test_challenge_skips_unit_without_failing_run() {
    let extractor = listing_with(vec![RawDetailRecord::new(
        "https://example.com/ad/1",
        "Titolo",
    )
    .with_contact("333 1234567")
    .with_review(RawReviewBlock::new(AUTHENTIC_REVIEW))])
    .with_failures(
        "https://example.com/escort/milano",
        vec![FetchError::Challenge {
            url: "https://example.com/escort/milano".into(),
        }],
    );

    let store = MemoryStore::new();
    let run = ingest(
        &extractor,
        &store,
        &ReviewClassifier::default(),
        &ContactConfig::default(),
        &fast_config(),
        &[milano_unit()],
    )
    .await;

    assert_eq!(run.challenge_skipped, 1);
    assert_eq!(run.failed_units, 0);
    assert_eq!(store.review_count(), 0);
}

#[tokio::test]
async fn test_ingested_corpus_feeds_deterministic_pools() {
    // Ingest a corpus of distinct reviews, then sample pools for two
    // listings and check stability and divergence.
    let details: Vec<RawDetailRecord> = (0..40)
        .map(|i| {
            RawDetailRecord::new(format!("https://example.com/ad/{i}"), "Titolo")
                .with_contact("333 1234567")
                .with_review(RawReviewBlock::new(format!(
                    "{AUTHENTIC_REVIEW} Visita numero {i}."
                )))
        })
        .collect();
    let extractor = listing_with(details);

    let store = MemoryStore::new();
    ingest_unit(
        &extractor,
        &store,
        &ReviewClassifier::default(),
        &ContactConfig::default(),
        &fast_config(),
        &milano_unit(),
    )
    .await
    .unwrap();
    assert_eq!(store.review_count(), 40);

    let sampler = PoolSampler::new(
        PoolConfig::new().with_pool_size(10),
        ReviewClassifier::default(),
    );
    let filter = PoolFilter::for_section("escort", "milano");

    let first = sampler.sample(&store, &filter, "listing-a").await.unwrap();
    let again = sampler.sample(&store, &filter, "listing-a").await.unwrap();
    let other = sampler.sample(&store, &filter, "listing-b").await.unwrap();

    assert_eq!(first.len(), 10);
    let ids = |pool: &[curation::PooledReview]| -> Vec<i64> {
        pool.iter().map(|p| p.review.id).collect()
    };
    assert_eq!(ids(&first), ids(&again));
    assert_ne!(ids(&first), ids(&other));
}

#[tokio::test]
async fn test_read_surface_over_ingested_rows() {
    let extractor = listing_with(vec![RawDetailRecord::new(
        "https://example.com/ad/1",
        "Titolo",
    )
    .with_contact("333 1234567")
    .with_review(RawReviewBlock::new(AUTHENTIC_REVIEW).with_reviewer("marco"))]);

    let store = MemoryStore::new();
    ingest_unit(
        &extractor,
        &store,
        &ReviewClassifier::default(),
        &ContactConfig::default(),
        &fast_config(),
        &milano_unit(),
    )
    .await
    .unwrap();

    use curation::ReviewStore;
    let page = store.query_reviews(&ReviewQuery::pending()).await.unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].meta["city"], "milano");
    assert_eq!(page.items[0].meta["reviewer"], "marco");
}

proptest! {
    /// Normalization is idempotent: feeding an output back in is a no-op.
    #[test]
    fn prop_phone_normalization_idempotent(digits in "[0-9]{6,14}") {
        let config = ContactConfig::default();
        if let Some(normalized) = contact::normalize_phone(&digits, &config) {
            prop_assert_eq!(
                contact::normalize_phone(&normalized, &config),
                Some(normalized)
            );
        }
    }

    /// Normalized output is always `+` followed by digits only.
    #[test]
    fn prop_phone_shape(raw in "[0-9 ().+-]{0,20}") {
        let config = ContactConfig::default();
        if let Some(normalized) = contact::normalize_phone(&raw, &config) {
            prop_assert!(normalized.starts_with('+'));
            prop_assert!(normalized[1..].chars().all(|c| c.is_ascii_digit()));
        }
    }
}
