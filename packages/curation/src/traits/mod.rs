//! Core trait abstractions for the curation library.
//!
//! These traits define the seams that applications implement to provide
//! page extraction and durable storage. The pipeline itself never depends
//! on markup shape or on a concrete database.

pub mod extractor;
pub mod store;
