//! Domain data types shared across the curation pipeline.

pub mod config;
pub mod review;
