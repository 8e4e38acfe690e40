//! Configuration types for ingestion and contact normalization.
//!
//! All knobs have production defaults and can be overridden from the
//! environment (a `.env` file is honored in development via `dotenvy`).

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;

/// Configuration for one ingestion run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Maximum number of work units processed in parallel.
    ///
    /// Kept deliberately low to respect target-site rate limits. Default: 2.
    pub concurrency: usize,

    /// Politeness interval between successive detail-page fetches within one
    /// worker, in milliseconds. A random delay in `[min, max]` is inserted
    /// before every fetch after the first. Default: 1500-4000ms.
    pub politeness_min_ms: u64,
    pub politeness_max_ms: u64,

    /// Retry/challenge policy applied to every fetch and store call.
    pub retry: RetryPolicy,

    /// Skip detail records that have no normalizable contact.
    pub require_contact: bool,

    /// Skip detail records that have no photos.
    pub require_photo: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            concurrency: 2,
            politeness_min_ms: 1500,
            politeness_max_ms: 4000,
            retry: RetryPolicy::default(),
            require_contact: true,
            require_photo: false,
        }
    }
}

impl IngestConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables, falling back to
    /// defaults for anything unset. Invalid values are logged and ignored.
    ///
    /// Recognized variables:
    /// `CURATION_CONCURRENCY`, `CURATION_POLITENESS_MIN_MS`,
    /// `CURATION_POLITENESS_MAX_MS`, `CURATION_REQUIRE_CONTACT`,
    /// `CURATION_REQUIRE_PHOTO`, plus the `CURATION_RETRY_*` family read by
    /// [`RetryPolicy::from_env`].
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();

        let defaults = Self::default();
        Self {
            concurrency: env_parse("CURATION_CONCURRENCY", defaults.concurrency),
            politeness_min_ms: env_parse("CURATION_POLITENESS_MIN_MS", defaults.politeness_min_ms),
            politeness_max_ms: env_parse("CURATION_POLITENESS_MAX_MS", defaults.politeness_max_ms),
            retry: RetryPolicy::from_env(),
            require_contact: env_parse("CURATION_REQUIRE_CONTACT", defaults.require_contact),
            require_photo: env_parse("CURATION_REQUIRE_PHOTO", defaults.require_photo),
        }
    }

    /// Set the worker concurrency bound.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Set the politeness delay range in milliseconds.
    pub fn with_politeness_ms(mut self, min: u64, max: u64) -> Self {
        self.politeness_min_ms = min;
        self.politeness_max_ms = max.max(min);
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Require a normalizable contact on every detail record.
    pub fn require_contact(mut self, required: bool) -> Self {
        self.require_contact = required;
        self
    }

    /// Require at least one photo on every detail record.
    pub fn require_photo(mut self, required: bool) -> Self {
        self.require_photo = required;
        self
    }
}

/// Parse an environment variable, falling back to a default on absence or
/// parse failure.
pub(crate) fn env_parse<T: FromStr + Copy>(key: &str, default: T) -> T {
    match std::env::var(key) {
        Ok(raw) => match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, raw, "ignoring unparseable environment variable");
                default
            }
        },
        Err(_) => default,
    }
}

/// Configuration for phone/WhatsApp normalization.
///
/// Defaults target the Italian market (`+39`, 10-digit mobile numbers) but
/// every knob is deployment-configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactConfig {
    /// Default country code, digits only (e.g. "39").
    pub country_code: String,

    /// Inclusive digit-count range for a number that already carries the
    /// country code.
    pub international_len: (usize, usize),

    /// Inclusive digit-count range for a plausible domestic number.
    pub national_len: (usize, usize),

    /// Host used when constructing WhatsApp deep links.
    pub whatsapp_domain: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        Self {
            country_code: "39".to_string(),
            international_len: (11, 15),
            national_len: (8, 11),
            whatsapp_domain: "wa.me".to_string(),
        }
    }
}

impl ContactConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default country code.
    pub fn with_country_code(mut self, code: impl Into<String>) -> Self {
        self.country_code = code.into();
        self
    }

    /// Set the WhatsApp deep-link domain.
    pub fn with_whatsapp_domain(mut self, domain: impl Into<String>) -> Self {
        self.whatsapp_domain = domain.into();
        self
    }
}
