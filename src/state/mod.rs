//! State module for tracking crawl progress
//!
//! This module provides the run-level state of a crawl.
//!
//! # Components
//!
//! - `CrawlPhase`: The per-page state machine (listing, dispatching, merging, pagination check)
//! - `StopReason`: Why a run reached its terminal phase
//! - `DedupLedger`: Captured names across runs and identifiers dispatched in this run

mod ledger;
mod phase;

// Re-export main types
pub use ledger::{normalize_name, DedupLedger};
pub use phase::{CrawlPhase, StopReason};
