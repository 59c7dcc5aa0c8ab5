//! Control loop that discovers token pairs, hydrates them, polls chain events in
//! block-range chunks and detects reorgs, driving a [`pair_cache::Cache`] forward.
//!
//! `pair-sync` never talks to a chain directly — it is generic over a [`Fetcher`]
//! implementation supplied by the caller.

pub mod error;
pub mod fetcher;
pub mod reorg;
pub mod sync;

pub use error::{FetcherError, SyncError};
pub use fetcher::Fetcher;
pub use sync::{fan_out_strategies_by_pairs, Sync, SyncConfig};
