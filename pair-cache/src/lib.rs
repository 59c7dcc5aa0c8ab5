//! In-process mirror of on-chain token-pair strategies, directional order books and
//! per-pair trading fees, kept current by replaying synchronization events.
//!
//! The crate owns state and indexing only; fetching events from a chain and driving
//! `Cache::apply_events` on a schedule is `pair-sync`'s job.

pub mod biguint_serde;
pub mod cache;
pub mod error;
pub mod event;
pub mod key;
pub mod model;
pub mod notify;

pub use cache::{Cache, SCHEME_VERSION};
pub use error::CacheError;
pub use event::{stable_sort_by_block_and_log, SyncEvent, SyncEventKind, TradeData};
pub use key::{directed_key, pair_key, from_pair_key, DirectedKey, PairKey, TokenId, SEP};
pub use model::{BlockMetadata, Order, PairFeePpm, Strategy, BLOCK_HISTORY_LEN};
pub use notify::{CacheEvent, NotifyBus};
