//! Extractor wrappers.
//!
//! Concrete page extraction (headless browser, HTTP client) lives outside
//! the library; these wrappers add cross-cutting behavior to any
//! [`crate::traits::extractor::PageExtractor`] implementation.

pub mod rate_limited;

pub use rate_limited::{ExtractorExt, RateLimitedExtractor};
