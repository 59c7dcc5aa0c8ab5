use thiserror::Error;

use crate::key::PairKey;

/// Misuse errors the cache fails loudly on (§7 "configuration / misuse — these are
/// bugs"). Transient and malformed-input conditions are logged and tolerated instead of
/// represented here; see the module docs on `Cache::apply_events`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    #[error("pair {0} is already present in the cache")]
    PairAlreadyPresent(PairKey),
}
