//! Mention ingestion for Tidewatch.
//!
//! This crate defines the search and store capabilities and the loop that
//! ties them together ([`Ingestor`]).

pub mod capability;
pub mod ingest;

pub use capability::{MentionSource, MentionStore};
pub use ingest::{Ingestor, RunSummary, TickOutcome, TickReport};
