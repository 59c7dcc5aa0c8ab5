use async_trait::async_trait;
use pair_cache::{BlockMetadata, PairFeePpm, Strategy, TokenId, TradeData};

use crate::error::FetcherError;

/// The chain-facing collaborator `Sync` drives. Implementations are expected to wrap a
/// concrete RPC client; this crate never talks to a chain directly.
///
/// The `latest_*` methods return each item tagged with its own `(block_number, log_index)`
/// — the cache's ordering contract is per-event, not per-chunk, so a chunked range fetch
/// must not collapse that back down to a single stamp per call.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get_block_number(&self) -> Result<u64, FetcherError>;

    /// Returns `Ok(None)` (not an error) when the provider has no data for `number` —
    /// callers treat a missing block the same as a failed fetch for reorg purposes.
    async fn get_block(&self, number: u64) -> Result<Option<BlockMetadata>, FetcherError>;

    async fn pairs(&self) -> Result<Vec<(TokenId, TokenId)>, FetcherError>;

    async fn strategies_by_pair(&self, token0: &TokenId, token1: &TokenId) -> Result<Vec<Strategy>, FetcherError>;

    async fn strategies_by_pairs(
        &self,
        pairs: &[(TokenId, TokenId)],
    ) -> Result<Vec<(TokenId, TokenId, Vec<Strategy>)>, FetcherError>;

    async fn pairs_trading_fee_ppm(
        &self,
        pairs: &[(TokenId, TokenId)],
    ) -> Result<Vec<(TokenId, TokenId, PairFeePpm)>, FetcherError>;

    async fn latest_strategy_created(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, u32, Strategy)>, FetcherError>;

    async fn latest_strategy_updated(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, u32, Strategy)>, FetcherError>;

    /// Full `Strategy` rather than a bare id, matching the shape of the sibling
    /// created/updated methods — the id used to build `SyncEventKind::StrategyDeleted` is
    /// extracted from it at the call site.
    async fn latest_strategy_deleted(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, u32, Strategy)>, FetcherError>;

    async fn latest_tokens_traded(&self, from_block: u64, to_block: u64) -> Result<Vec<TradeData>, FetcherError>;

    async fn latest_pair_trading_fee_updates(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, u32, TokenId, TokenId, PairFeePpm)>, FetcherError>;

    /// Non-empty iff a global default-fee change occurred in the range. Callers only care
    /// about presence, not the individual values.
    async fn latest_trading_fee_updates(
        &self,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<(u64, u32, PairFeePpm)>, FetcherError>;
}
