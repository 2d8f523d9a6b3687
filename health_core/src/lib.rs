#![forbid(unsafe_code)]

//! Core domain model and logic for the hlog daily health log.
//!
//! This crate provides:
//! - Domain types (metric entries, targets, per-day record keys)
//! - Timeline bucketing for trend charts
//! - Value formatting and normalization for inline editing
//! - The per-day inline edit reconciler
//! - Store interfaces plus in-memory and JSONL implementations
//! - Targets persistence, configuration, logging and CSV export

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod format;
mod fsutil;
pub mod timeline;
pub mod store;
pub mod jsonl_store;
pub mod targets;
pub mod reconcile;
pub mod export;

// Re-export commonly used types
pub use error::{Error, Result, StoreError};
pub use types::*;
pub use config::Config;
pub use format::{format_for_display, normalize_input, parse_value};
pub use timeline::{bucket, scale_max, Granularity, TimelinePoint};
pub use store::{
    entries_between, entry_for_day, previous_day_entry, recent_entries, EntryQuery,
    IdentityProvider, MemoryStore, MetricStore, StaticIdentity,
};
pub use jsonl_store::JsonlStore;
pub use targets::TargetStore;
pub use reconcile::{DaySession, FieldEdit, FieldState, SaveRequest};
pub use export::export_csv;
