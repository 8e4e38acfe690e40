//! PageExtractor trait for pluggable page extraction.
//!
//! The extractor is the only component that understands markup. It turns a
//! listing-page locator into candidate references and a candidate reference
//! into raw field values. Everything downstream (normalization,
//! classification, dedup, sampling) works on the extracted contract only.
//!
//! Implementations are expected to map their transport failures onto the
//! [`FetchError`](crate::error::FetchError) taxonomy, in particular raising
//! `FetchError::Challenge` when the response body matches a known
//! block/verification signature (see [`ChallengeSignatures`]).

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{FetchError, FetchResult};
use crate::security::UrlValidator;

/// Locator for one listing page worth of candidates: a source section
/// scoped by category and city.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListLocator {
    /// Listing page URL.
    pub url: String,

    /// Category this page belongs to.
    pub category: String,

    /// City/section this page belongs to.
    pub city: String,
}

impl ListLocator {
    /// Create a locator for a listing page.
    pub fn new(
        url: impl Into<String>,
        category: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            city: city.into(),
        }
    }
}

/// An opaque reference to one detail page, produced by listing-page
/// extraction. Consumed once per ingestion unit, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateReference {
    /// Detail page URL.
    pub url: String,

    /// Category inherited from the listing page.
    pub category: String,

    /// City/section inherited from the listing page.
    pub city: String,
}

impl CandidateReference {
    /// Create a candidate reference.
    pub fn new(
        url: impl Into<String>,
        category: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            city: city.into(),
        }
    }
}

/// One raw review block as extracted from a detail page.
///
/// Ratings and dates pass through the pipeline untouched; only the text is
/// cleaned or rejected by the classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawReviewBlock {
    /// Reviewer display name, if present.
    pub reviewer: Option<String>,

    /// Numeric rating, if present.
    pub rating: Option<f32>,

    /// Free review text, as published.
    pub text: String,

    /// Review date, if present.
    pub date: Option<NaiveDate>,
}

impl RawReviewBlock {
    /// Create a review block with just text.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            reviewer: None,
            rating: None,
            text: text.into(),
            date: None,
        }
    }

    /// Set the reviewer name.
    pub fn with_reviewer(mut self, reviewer: impl Into<String>) -> Self {
        self.reviewer = Some(reviewer.into());
        self
    }

    /// Set the rating.
    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = Some(rating);
        self
    }

    /// Set the review date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }
}

/// Unstructured fields extracted from one detail page. Transient,
/// in-memory only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetailRecord {
    /// Detail page URL (after redirects).
    pub url: String,

    /// Listing title.
    pub title: String,

    /// Free-text body.
    pub body: String,

    /// Raw contact strings as scraped (phone numbers, WhatsApp links).
    pub contacts: Vec<String>,

    /// Raw review blocks found on the page.
    pub reviews: Vec<RawReviewBlock>,

    /// Number of photos on the page.
    pub photo_count: usize,
}

impl RawDetailRecord {
    /// Create a detail record with minimal fields.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            body: String::new(),
            contacts: Vec::new(),
            reviews: Vec::new(),
            photo_count: 0,
        }
    }

    /// Set the body text.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a raw contact string.
    pub fn with_contact(mut self, contact: impl Into<String>) -> Self {
        self.contacts.push(contact.into());
        self
    }

    /// Add a raw review block.
    pub fn with_review(mut self, review: RawReviewBlock) -> Self {
        self.reviews.push(review);
        self
    }

    /// Set the photo count.
    pub fn with_photo_count(mut self, count: usize) -> Self {
        self.photo_count = count;
        self
    }
}

/// PageExtractor trait for pluggable page extraction.
///
/// Implementations own rendering and DOM traversal (headless browser,
/// plain HTTP, fixture files in tests). The pipeline only sees the
/// extracted field contract.
#[async_trait]
pub trait PageExtractor: Send + Sync {
    /// Fetch a listing page and extract candidate references, in listing
    /// order.
    async fn fetch_list(&self, locator: &ListLocator) -> FetchResult<Vec<CandidateReference>>;

    /// Fetch a detail page and extract its raw fields.
    async fn fetch_detail(&self, reference: &CandidateReference) -> FetchResult<RawDetailRecord>;

    /// Get the extractor name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}

/// Known block/verification page signatures.
///
/// Extractor implementations run the response body through `detect` and
/// raise `FetchError::Challenge` on a match, which the retry controller
/// then waits out or skips depending on policy.
#[derive(Debug, Clone)]
pub struct ChallengeSignatures {
    signatures: Vec<String>,
}

impl Default for ChallengeSignatures {
    fn default() -> Self {
        Self {
            signatures: [
                "verify you are human",
                "verifica di essere umano",
                "attention required",
                "checking your browser",
                "access denied",
                "unusual traffic",
                "captcha",
                "ddos protection",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

impl ChallengeSignatures {
    /// Create with the default signature list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the signature list.
    pub fn with_signatures(signatures: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            signatures: signatures
                .into_iter()
                .map(|s| s.into().to_lowercase())
                .collect(),
        }
    }

    /// Check a response body against the known signatures
    /// (case-insensitive substring match).
    pub fn detect(&self, body: &str) -> bool {
        let lower = body.to_lowercase();
        self.signatures.iter().any(|s| lower.contains(s.as_str()))
    }
}

/// An extractor that validates URLs before fetching (SSRF protection).
///
/// Wraps any extractor to ensure locator and candidate URLs are validated
/// before the inner implementation touches the network.
pub struct ValidatedExtractor<E: PageExtractor> {
    inner: E,
    validator: UrlValidator,
}

impl<E: PageExtractor> ValidatedExtractor<E> {
    /// Create a new validated extractor with default security rules.
    pub fn new(extractor: E) -> Self {
        Self {
            inner: extractor,
            validator: UrlValidator::new(),
        }
    }

    /// Create with a custom validator.
    pub fn with_validator(extractor: E, validator: UrlValidator) -> Self {
        Self {
            inner: extractor,
            validator,
        }
    }

    async fn validate_url(&self, url: &str) -> FetchResult<()> {
        self.validator
            .validate_with_dns(url)
            .await
            .map_err(FetchError::Security)
    }
}

#[async_trait]
impl<E: PageExtractor> PageExtractor for ValidatedExtractor<E> {
    async fn fetch_list(&self, locator: &ListLocator) -> FetchResult<Vec<CandidateReference>> {
        self.validate_url(&locator.url).await?;

        let candidates = self.inner.fetch_list(locator).await?;

        // Drop candidates whose URLs fail validation (redirect tricks).
        let validated: Vec<_> = candidates
            .into_iter()
            .filter(|c| self.validator.validate(&c.url).is_ok())
            .collect();

        Ok(validated)
    }

    async fn fetch_detail(&self, reference: &CandidateReference) -> FetchResult<RawDetailRecord> {
        self.validate_url(&reference.url).await?;
        self.inner.fetch_detail(reference).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detail_record_builder() {
        let record = RawDetailRecord::new("https://example.com/ad/1", "Title")
            .with_body("Body text")
            .with_contact("333 1234567")
            .with_review(RawReviewBlock::new("A review").with_rating(5.0))
            .with_photo_count(3);

        assert_eq!(record.contacts.len(), 1);
        assert_eq!(record.reviews.len(), 1);
        assert_eq!(record.reviews[0].rating, Some(5.0));
        assert_eq!(record.photo_count, 3);
    }

    #[test]
    fn test_challenge_signature_detection() {
        let signatures = ChallengeSignatures::new();
        assert!(signatures.detect("<html>Please VERIFY you are HUMAN</html>"));
        assert!(signatures.detect("Attention Required! | Cloudflare"));
        assert!(!signatures.detect("<html>Normal listing page</html>"));
    }

    #[test]
    fn test_custom_signatures() {
        let signatures = ChallengeSignatures::with_signatures(["blocco temporaneo"]);
        assert!(signatures.detect("BLOCCO TEMPORANEO del tuo IP"));
        assert!(!signatures.detect("captcha"));
    }
}
