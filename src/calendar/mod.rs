//! Calendar module - day sequence, month blocks and the workout source
//!
//! Features:
//! - Gap-free day entries with per-month labels
//! - Lazy history prepends guarded against overlap
//! - Retrying range fetches that degrade to empty days

pub mod entry;
pub mod month_blocks;
pub mod source;
pub mod store;

pub use entry::{DateEntry, WorkoutRef, WorkoutStatus};
pub use month_blocks::{MonthBlock, MonthKey, block_containing, compute_month_blocks};
pub use source::{FetchKind, FetchPolicy, FetchRequest, WorkoutSource, fetch_or_empty};
pub use store::DateSequenceStore;
