#[macro_use] pub mod common;
pub mod errors;
pub mod sam_record;
pub mod position;
pub mod duplicates;
pub mod tag_filter;
pub mod deduplicate;

pub use crate::deduplicate::{run, DedupConfig, DedupStats, Decision, Deduplicator, UnmappedPolicy};
pub use crate::errors::DedupError;
