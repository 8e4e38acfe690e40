//! Ingestion orchestrator.
//!
//! Drives one run: listing pages to candidate references to detail
//! records, through contact normalization and review classification, into
//! idempotent storage upserts keyed by content identity. Work units (one
//! source/category/city combination) run sequentially inside and in
//! parallel across, bounded by a semaphore; a failure in one unit never
//! aborts its siblings.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::classifier::ReviewClassifier;
use crate::contact::NormalizedContact;
use crate::error::{IngestError, Result};
use crate::identity::source_identity;
use crate::retry::run_with_retry;
use crate::traits::extractor::{ListLocator, PageExtractor, RawDetailRecord};
use crate::traits::store::{ReviewStore, UpsertOutcome};
use crate::types::config::{ContactConfig, IngestConfig};
use crate::types::review::NewReview;

/// Cap on sampled error messages carried in a report.
const MAX_SAMPLED_ERRORS: usize = 8;

/// One unit of work: a listing page for a source/category/city combination.
#[derive(Debug, Clone)]
pub struct WorkUnit {
    pub locator: ListLocator,
}

impl WorkUnit {
    /// Create a work unit from a listing locator.
    pub fn new(locator: ListLocator) -> Self {
        Self { locator }
    }

    /// Diagnostic label for this unit.
    pub fn label(&self) -> String {
        format!("{}/{} {}", self.locator.category, self.locator.city, self.locator.url)
    }
}

/// Per-unit outcome counts.
#[derive(Debug, Clone, Default)]
pub struct UnitReport {
    /// Reviews stored for the first time.
    pub imported: usize,

    /// Reviews whose identity already existed (no write).
    pub existed: usize,

    /// Candidates or reviews dropped by validation/classification.
    pub skipped: usize,

    /// Pages abandoned on a challenge under skip policy.
    pub challenge_skipped: usize,

    /// Retries performed across all fetch and store calls.
    pub retries: u32,

    /// First few error messages (per-candidate failures that did not abort
    /// the unit).
    pub errors: Vec<String>,
}

impl UnitReport {
    fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_SAMPLED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Aggregate outcome of one run.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub imported: usize,
    pub existed: usize,
    pub skipped: usize,
    pub challenge_skipped: usize,

    /// Units that failed outright (after per-candidate isolation).
    pub failed_units: usize,

    /// Sampled error messages across the run.
    pub errors: Vec<String>,
}

impl RunReport {
    fn merge_unit(&mut self, report: &UnitReport) {
        self.imported += report.imported;
        self.existed += report.existed;
        self.skipped += report.skipped;
        self.challenge_skipped += report.challenge_skipped;
        for e in &report.errors {
            self.push_error(e.clone());
        }
    }

    fn push_error(&mut self, message: String) {
        if self.errors.len() < MAX_SAMPLED_ERRORS {
            self.errors.push(message);
        }
    }
}

/// Ingest a batch of work units under the configured concurrency bound.
///
/// Never fails as a whole: per-unit failures are counted and sampled into
/// the report.
pub async fn ingest<E, S>(
    extractor: &E,
    store: &S,
    classifier: &ReviewClassifier,
    contact_config: &ContactConfig,
    config: &IngestConfig,
    units: &[WorkUnit],
) -> RunReport
where
    E: PageExtractor,
    S: ReviewStore,
{
    let semaphore = Arc::new(Semaphore::new(config.concurrency.max(1)));

    let outcomes = futures::future::join_all(units.iter().map(|unit| {
        let semaphore = semaphore.clone();
        async move {
            let _permit = semaphore.acquire().await.unwrap();
            (
                unit,
                ingest_unit(extractor, store, classifier, contact_config, config, unit).await,
            )
        }
    }))
    .await;

    let mut run = RunReport::default();
    for (unit, outcome) in outcomes {
        match outcome {
            Ok(report) => run.merge_unit(&report),
            Err(e) => {
                warn!(unit = unit.label(), error = %e, "work unit failed");
                run.failed_units += 1;
                run.push_error(format!("{}: {}", unit.label(), e));
            }
        }
    }

    info!(
        imported = run.imported,
        existed = run.existed,
        skipped = run.skipped,
        challenge_skipped = run.challenge_skipped,
        failed_units = run.failed_units,
        "ingest run complete"
    );

    run
}

/// Ingest one work unit: one listing page and its detail pages, in
/// listing order.
pub async fn ingest_unit<E, S>(
    extractor: &E,
    store: &S,
    classifier: &ReviewClassifier,
    contact_config: &ContactConfig,
    config: &IngestConfig,
    unit: &WorkUnit,
) -> Result<UnitReport>
where
    E: PageExtractor,
    S: ReviewStore,
{
    let mut report = UnitReport::default();

    let listed = run_with_retry(&config.retry, &unit.locator.url, || async move {
        extractor
            .fetch_list(&unit.locator)
            .await
            .map_err(IngestError::from)
    })
    .await?;

    if listed.is_challenge_skipped() {
        report.challenge_skipped += 1;
        return Ok(report);
    }
    report.retries += listed.retries().unwrap_or(0);
    let candidates = listed.into_value().unwrap_or_default();

    info!(
        unit = unit.label(),
        candidates = candidates.len(),
        "listing page extracted"
    );

    for (position, candidate) in candidates.iter().enumerate() {
        if position > 0 {
            politeness_pause(config).await;
        }

        let fetched = run_with_retry(&config.retry, &candidate.url, || async move {
            extractor
                .fetch_detail(candidate)
                .await
                .map_err(IngestError::from)
        })
        .await;

        let detail = match fetched {
            Ok(attempted) if attempted.is_challenge_skipped() => {
                report.challenge_skipped += 1;
                continue;
            }
            Ok(attempted) => {
                report.retries += attempted.retries().unwrap_or(0);
                match attempted.into_value() {
                    Some(detail) => detail,
                    None => continue,
                }
            }
            // Isolation boundary: one detail page failing (even fatally)
            // must not abort the sibling candidates.
            Err(e) => {
                warn!(url = candidate.url.as_str(), error = %e, "detail page failed");
                report.push_error(format!("{}: {}", candidate.url, e));
                continue;
            }
        };

        let contact = NormalizedContact::from_raw(&detail.contacts, contact_config);
        if let Err(e) = validate_detail(&detail, &contact, config) {
            debug!(url = detail.url.as_str(), reason = %e, "detail record skipped");
            report.skipped += 1;
            continue;
        }

        for review in &detail.reviews {
            let classified = classifier.classify(&review.text);
            if !classified.kept {
                report.skipped += 1;
                continue;
            }

            let identity = source_identity(
                &detail.url,
                review.reviewer.as_deref(),
                review.date,
                &classified.text,
            );
            let new_review = NewReview {
                listing_ref: None,
                source_url: detail.url.clone(),
                reviewer: review.reviewer.clone(),
                rating: review.rating,
                text: classified.text,
                review_date: review.date,
                category: candidate.category.clone(),
                city: candidate.city.clone(),
            };

            let identity_ref = identity.as_str();
            let review_ref = &new_review;
            let upserted = run_with_retry(&config.retry, &detail.url, || async move {
                store.upsert_review(identity_ref, review_ref).await
            })
            .await;

            match upserted {
                Ok(attempted) => {
                    report.retries += attempted.retries().unwrap_or(0);
                    match attempted.into_value() {
                        Some(UpsertOutcome::Created) => report.imported += 1,
                        Some(UpsertOutcome::Existed) => report.existed += 1,
                        None => {}
                    }
                }
                Err(e) => {
                    warn!(url = detail.url.as_str(), error = %e, "review upsert failed");
                    report.push_error(format!("{}: {}", detail.url, e));
                }
            }
        }
    }

    Ok(report)
}

/// Gate a detail record on the configured mandatory fields. A record
/// failing a gate is skipped whole; nothing from it is ever written.
fn validate_detail(
    detail: &RawDetailRecord,
    contact: &NormalizedContact,
    config: &IngestConfig,
) -> Result<()> {
    if config.require_contact && !contact.has_any() {
        return Err(IngestError::Validation {
            reason: "no normalizable contact".into(),
        });
    }
    if config.require_photo && detail.photo_count == 0 {
        return Err(IngestError::Validation {
            reason: "no photos".into(),
        });
    }
    Ok(())
}

/// Randomized politeness interval between successive detail fetches.
///
/// Too-fast sequential access measurably increases the challenge/block
/// rate, so this is load-bearing, not an optimization.
async fn politeness_pause(config: &IngestConfig) {
    let (min, max) = (config.politeness_min_ms, config.politeness_max_ms.max(config.politeness_min_ms));
    let delay = rand::rng().random_range(min..=max);
    sleep(Duration::from_millis(delay)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::retry::RetryPolicy;
    use crate::stores::MemoryStore;
    use crate::testing::MockExtractor;
    use crate::traits::extractor::{CandidateReference, RawDetailRecord, RawReviewBlock};

    const GOOD_REVIEW: &str = "Ragazza davvero come in foto, appuntamento puntuale e \
        appartamento pulito in zona comoda, esperienza piacevole e rilassante.";

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

    fn unit() -> WorkUnit {
        WorkUnit::new(ListLocator::new(
            "https://example.com/escort/milano",
            "escort",
            "milano",
        ))
    }

    fn detail(url: &str) -> RawDetailRecord {
        RawDetailRecord::new(url, "Titolo annuncio")
            .with_contact("333 1234567")
            .with_photo_count(4)
            .with_review(RawReviewBlock::new(GOOD_REVIEW).with_reviewer("marco").with_rating(5.0))
    }

    fn scripted_extractor() -> MockExtractor {
        MockExtractor::new()
            .with_listing(
                "https://example.com/escort/milano",
                vec![
                    CandidateReference::new("https://example.com/ad/1", "escort", "milano"),
                    CandidateReference::new("https://example.com/ad/2", "escort", "milano"),
                ],
            )
            .with_detail(detail("https://example.com/ad/1"))
            .with_detail(detail("https://example.com/ad/2"))
    }

    #[tokio::test]
    async fn test_ingest_unit_imports_reviews() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();
        let extractor = scripted_extractor();

        let report = ingest_unit(
            &extractor,
            &store,
            &classifier,
            &ContactConfig::default(),
            &fast_config(),
            &unit(),
        )
        .await
        .unwrap();

        assert_eq!(report.imported, 2);
        assert_eq!(report.existed, 0);
        assert_eq!(store.review_count(), 2);
    }

    #[tokio::test]
    async fn test_reingestion_is_idempotent() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();
        let extractor = scripted_extractor();
        let config = fast_config();
        let contact = ContactConfig::default();

        let first = ingest_unit(&extractor, &store, &classifier, &contact, &config, &unit())
            .await
            .unwrap();
        let second = ingest_unit(&extractor, &store, &classifier, &contact, &config, &unit())
            .await
            .unwrap();

        assert_eq!(first.imported, 2);
        assert_eq!(second.imported, 0);
        assert_eq!(second.existed, 2);
        assert_eq!(store.review_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_contact_skips_candidate() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();

        let no_contact = RawDetailRecord::new("https://example.com/ad/1", "Titolo")
            .with_photo_count(2)
            .with_review(RawReviewBlock::new(GOOD_REVIEW));
        let extractor = MockExtractor::new()
            .with_listing(
                "https://example.com/escort/milano",
                vec![CandidateReference::new("https://example.com/ad/1", "escort", "milano")],
            )
            .with_detail(no_contact);

        let report = ingest_unit(
            &extractor,
            &store,
            &classifier,
            &ContactConfig::default(),
            &fast_config(),
            &unit(),
        )
        .await
        .unwrap();

        assert_eq!(report.imported, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(store.review_count(), 0);
    }

    #[test]
    fn test_validation_gate_names_missing_requirement() {
        let config = IngestConfig::new().require_photo(true);
        let detail = RawDetailRecord::new("https://example.com/ad/1", "Titolo")
            .with_contact("333 1234567");
        let contact = NormalizedContact::from_raw(&detail.contacts, &ContactConfig::default());

        let err = validate_detail(&detail, &contact, &config).unwrap_err();
        assert!(matches!(err, IngestError::Validation { .. }));

        let with_photos = detail.clone().with_photo_count(1);
        assert!(validate_detail(&with_photos, &contact, &config).is_ok());
    }

    #[tokio::test]
    async fn test_challenge_on_detail_skips_candidate_only() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();

        let extractor = scripted_extractor().with_failures(
            "https://example.com/ad/1",
            vec![FetchError::Challenge {
                url: "https://example.com/ad/1".into(),
            }],
        );

        let report = ingest_unit(
            &extractor,
            &store,
            &classifier,
            &ContactConfig::default(),
            &fast_config(),
            &unit(),
        )
        .await
        .unwrap();

        assert_eq!(report.challenge_skipped, 1);
        assert_eq!(report.imported, 1);
        assert_eq!(store.review_count(), 1);
    }

    #[tokio::test]
    async fn test_fatal_detail_failure_is_isolated() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();

        let extractor = scripted_extractor().with_failures(
            "https://example.com/ad/1",
            vec![FetchError::Fatal("contract violation".into())],
        );

        let report = ingest_unit(
            &extractor,
            &store,
            &classifier,
            &ContactConfig::default(),
            &fast_config(),
            &unit(),
        )
        .await
        .unwrap();

        // ad/1 failed, ad/2 still imported.
        assert_eq!(report.imported, 1);
        assert_eq!(report.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_run_isolates_failing_units() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();
        let config = fast_config();
        let contact = ContactConfig::default();

        // Only one of the two units is scripted; the other fails its
        // listing fetch fatally on every attempt.
        let extractor = scripted_extractor().with_failures(
            "https://example.com/escort/roma",
            vec![FetchError::Fatal("boom".into())],
        );

        let units = vec![
            unit(),
            WorkUnit::new(ListLocator::new(
                "https://example.com/escort/roma",
                "escort",
                "roma",
            )),
        ];

        let run = ingest(&extractor, &store, &classifier, &contact, &config, &units).await;

        assert_eq!(run.imported, 2);
        assert_eq!(run.failed_units, 1);
        assert_eq!(run.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_challenge_on_listing_skips_unit() {
        let store = MemoryStore::new();
        let classifier = ReviewClassifier::default();

        let extractor = scripted_extractor().with_failures(
            "https://example.com/escort/milano",
            vec![FetchError::Challenge {
                url: "https://example.com/escort/milano".into(),
            }],
        );

        let report = ingest_unit(
            &extractor,
            &store,
            &classifier,
            &ContactConfig::default(),
            &fast_config(),
            &unit(),
        )
        .await
        .unwrap();

        assert_eq!(report.challenge_skipped, 1);
        assert_eq!(report.imported, 0);
    }
}
