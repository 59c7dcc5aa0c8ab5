use crate::{
    key::TokenId,
    model::{PairFeePpm, Strategy},
};
use num_bigint::BigUint;

/// A synchronization event as fed to [`crate::Cache::apply_events`].
///
/// Events must be stably sorted by `(block_number, log_index)` ascending before being
/// passed in a batch — the cache trusts, but does not itself enforce, that ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEvent {
    pub block_number: u64,
    pub log_index: u32,
    pub kind: SyncEventKind,
}

impl SyncEvent {
    pub fn new(block_number: u64, log_index: u32, kind: SyncEventKind) -> Self {
        Self { block_number, log_index, kind }
    }

    /// Sort key matching the contract's `(blockNumber, logIndex)` ascending order.
    pub fn order_key(&self) -> (u64, u32) {
        (self.block_number, self.log_index)
    }

    pub fn pair_tokens(&self) -> Option<(&TokenId, &TokenId)> {
        match &self.kind {
            SyncEventKind::StrategyCreated(s) | SyncEventKind::StrategyUpdated(s) => {
                Some((&s.token0, &s.token1))
            }
            SyncEventKind::PairTradingFeePpmUpdated { token0, token1, .. } => {
                Some((token0, token1))
            }
            SyncEventKind::StrategyDeleted { .. } | SyncEventKind::TradingFeePpmUpdated { .. } => {
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEventKind {
    StrategyCreated(Strategy),
    StrategyUpdated(Strategy),
    StrategyDeleted { id: BigUint },
    PairTradingFeePpmUpdated { token0: TokenId, token1: TokenId, fee_ppm: PairFeePpm },
    /// Global default fee changed. Carries no pair info; the cache ignores this variant
    /// by contract (it is a signal consumed by the synchronizer, not cache state).
    TradingFeePpmUpdated { fee_ppm: PairFeePpm },
}

/// A trade observed on-chain. Consumed by the synchronizer (filtered by cached-pair
/// membership) and never persisted by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeData {
    pub token0: TokenId,
    pub token1: TokenId,
    pub block_number: u64,
    pub log_index: u32,
}

/// Stably sort events by `(block_number, log_index)` ascending, merging the several
/// per-kind streams a [`crate::Fetcher`]-style source yields into one applyable batch.
pub fn stable_sort_by_block_and_log(events: &mut [SyncEvent]) {
    events.sort_by_key(SyncEvent::order_key);
}
