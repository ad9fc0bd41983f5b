//! Ingestion utilities for turning URLs into indexable documents.
//!
//! * [`fetch`] — resilient, rate-limited page acquisition and text extraction.

pub mod fetch;

pub use fetch::{Document, DocumentStatus, FetchFailure, PageFetcher};
