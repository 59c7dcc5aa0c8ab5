use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use fnv::FnvHashSet;
use futures::future::join_all;
use pair_cache::{
    pair_key, stable_sort_by_block_and_log, Cache, PairKey, SyncEvent, SyncEventKind, TokenId,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::{error::SyncError, fetcher::Fetcher, reorg};

/// Tuning knobs for a [`Sync`] instance. Defaults match the upstream protocol's.
#[derive(Debug, Clone, Copy)]
pub struct SyncConfig {
    pub pair_batch_size: usize,
    pub poll_interval: Duration,
    pub block_chunk_size: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { pair_batch_size: 100, poll_interval: Duration::from_secs(1), block_chunk_size: 1000 }
    }
}

/// How long pair-discovery stays quiet once `uncachedPairs` drains, before it's willing to
/// re-poll on its own timer rather than on an out-of-band signal.
const DISCOVERY_IDLE_INTERVAL: Duration = Duration::from_secs(60);
const DISCOVERY_RETRY_INTERVAL: Duration = Duration::from_secs(60);

/// Drives a [`Cache`] forward from a [`Fetcher`]: discovers pairs, hydrates them, polls
/// chain events in block-range chunks, and recovers from reorgs.
///
/// Single-use: `start()` may be called exactly once. Cheap to clone — clones share the
/// same underlying control state, matching how `Cache` itself is a shared handle.
pub struct Sync<F: Fetcher> {
    fetcher: Arc<F>,
    cache: Cache,
    config: SyncConfig,
    started: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
    uncached_pairs: Arc<Mutex<Vec<(TokenId, TokenId)>>>,
}

impl<F: Fetcher> Clone for Sync<F> {
    fn clone(&self) -> Self {
        Self {
            fetcher: self.fetcher.clone(),
            cache: self.cache.clone(),
            config: self.config,
            started: self.started.clone(),
            stopped: self.stopped.clone(),
            uncached_pairs: self.uncached_pairs.clone(),
        }
    }
}

impl<F: Fetcher + 'static> Sync<F> {
    pub fn new(fetcher: F, cache: Cache, config: SyncConfig) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            cache,
            config,
            started: Arc::new(AtomicBool::new(false)),
            stopped: Arc::new(AtomicBool::new(false)),
            uncached_pairs: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Bootstrap the watermark if needed, discover the initial pair set, then spawn the
    /// three cooperative loops. Fails if called more than once.
    pub async fn start(&self) -> Result<(), SyncError> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err(SyncError::AlreadyStarted);
        }

        if self.cache.get_latest_block_number().await == 0 {
            let current = self
                .fetcher
                .get_block_number()
                .await
                .map_err(SyncError::BootstrapFailed)?;
            self.cache.apply_events(vec![], current).await;
        }

        self.refresh_uncached_pairs().await;

        let fee_bootstrap = self.clone();
        tokio::spawn(async move { fee_bootstrap.fee_bootstrap_once().await });

        let hydration = self.clone();
        tokio::spawn(async move { hydration.pair_hydration_loop().await });

        let polling = self.clone();
        tokio::spawn(async move { polling.event_poll_loop().await });

        Ok(())
    }

    /// Cancels future scheduling. An in-flight fetcher call already underway still
    /// completes and its cache mutation is still applied — those mutations are idempotent
    /// under the strategy-lifecycle rules, so this is safe.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Replace `uncachedPairs` with whatever `fetcher.pairs()` reports minus what's
    /// already tracked in the cache.
    pub async fn refresh_uncached_pairs(&self) {
        let discovered = match self.fetcher.pairs().await {
            Ok(pairs) => pairs,
            Err(err) => {
                warn!(%err, "refresh_uncached_pairs: fetcher error, will retry");
                return;
            }
        };

        let cached: FnvHashSet<PairKey> = self.cache.get_cached_pairs(false).await.into_iter().collect();
        let fresh: Vec<(TokenId, TokenId)> = discovered
            .into_iter()
            .filter(|(t0, t1)| !cached.contains(&pair_key(t0, t1)))
            .collect();

        *self.uncached_pairs.lock().await = fresh;
    }

    async fn pair_hydration_loop(&self) {
        let mut last_discovery_success = true;
        loop {
            if self.is_stopped() {
                return;
            }

            let batch: Vec<(TokenId, TokenId)> = {
                let mut pending = self.uncached_pairs.lock().await;
                if pending.is_empty() {
                    Vec::new()
                } else {
                    let take = self.config.pair_batch_size.min(pending.len());
                    pending.drain(..take).collect()
                }
            };

            if batch.is_empty() {
                tokio::time::sleep(DISCOVERY_IDLE_INTERVAL).await;
                if !self.is_stopped() {
                    self.refresh_uncached_pairs().await;
                }
                continue;
            }

            match self.fetcher.strategies_by_pairs(&batch).await {
                Ok(hydrated) => {
                    self.cache.bulk_add_pairs(hydrated).await;
                    last_discovery_success = true;
                }
                Err(err) => {
                    warn!(%err, "pair hydration batch failed, retrying in 60s");
                    last_discovery_success = false;
                    {
                        let mut pending = self.uncached_pairs.lock().await;
                        pending.extend(batch);
                    }
                    tokio::time::sleep(DISCOVERY_RETRY_INTERVAL).await;
                }
            }

            if last_discovery_success {
                tokio::task::yield_now().await;
            }
        }
    }

    async fn fee_bootstrap_once(&self) {
        let pairs = self.cache.get_cached_pairs(false).await;
        let directed: Vec<(TokenId, TokenId)> = pairs
            .iter()
            .filter_map(pair_cache::from_pair_key)
            .collect();
        if directed.is_empty() {
            return;
        }
        match self.fetcher.pairs_trading_fee_ppm(&directed).await {
            Ok(fees) => {
                for (token0, token1, fee) in fees {
                    self.cache.add_pair_fees(&token0, &token1, fee).await;
                }
            }
            Err(err) => error!(%err, "one-shot fee bootstrap failed"),
        }
    }

    async fn event_poll_loop(&self) {
        loop {
            tokio::time::sleep(self.config.poll_interval).await;
            if self.is_stopped() {
                return;
            }
            if let Err(err) = self.poll_once().await {
                warn!(%err, "event poll tick failed, continuing");
            }
        }
    }

    async fn poll_once(&self) -> Result<(), crate::error::FetcherError> {
        loop {
            let current = self.fetcher.get_block_number().await?;
            let latest = self.cache.get_latest_block_number().await;
            if current <= latest {
                return Ok(());
            }

            let history = self.cache.blocks_metadata().await;
            if reorg::detect_reorg(self.fetcher.as_ref(), &history, current).await {
                info!(current, "reorg detected, clearing cache and reseeding");
                self.cache.clear().await;
                self.cache.apply_events(vec![], current).await;
                self.refresh_uncached_pairs().await;
                // Recurse immediately rather than waiting for the next scheduled tick —
                // a cascading reorg must be caught before any catch-up fetch runs against
                // a watermark that's already stale again.
                continue;
            }

            self.poll_event_chunks(latest, current).await?;

            let refreshed = reorg::refresh_block_history(self.fetcher.as_ref(), &history, current).await;
            self.cache.set_blocks_metadata(refreshed).await;

            return Ok(());
        }
    }

    async fn poll_event_chunks(&self, from: u64, to: u64) -> Result<(), crate::error::FetcherError> {
        let cached_keys: FnvHashSet<PairKey> = self.cache.get_cached_pairs(false).await.into_iter().collect();

        let mut events = Vec::new();
        let mut saw_global_fee_update = false;
        let mut newly_created_pairs: Vec<(TokenId, TokenId)> = Vec::new();
        let mut traded_within_cached_pairs = 0usize;

        let mut chunk_start = from + 1;
        while chunk_start <= to {
            let chunk_end = (chunk_start + self.config.block_chunk_size - 1).min(to);

            let created = self.fetcher.latest_strategy_created(chunk_start, chunk_end).await?;
            let updated = self.fetcher.latest_strategy_updated(chunk_start, chunk_end).await?;
            let deleted = self.fetcher.latest_strategy_deleted(chunk_start, chunk_end).await?;
            let pair_fees = self.fetcher.latest_pair_trading_fee_updates(chunk_start, chunk_end).await?;
            let global_fees = self.fetcher.latest_trading_fee_updates(chunk_start, chunk_end).await?;
            let trades = self.fetcher.latest_tokens_traded(chunk_start, chunk_end).await?;
            saw_global_fee_update |= !global_fees.is_empty();

            for (block_number, log_index, strategy) in created {
                let pair = pair_key(&strategy.token0, &strategy.token1);
                if cached_keys.contains(&pair) {
                    events.push(SyncEvent::new(block_number, log_index, SyncEventKind::StrategyCreated(strategy)));
                } else {
                    newly_created_pairs.push((strategy.token0.clone(), strategy.token1.clone()));
                }
            }
            for (block_number, log_index, strategy) in updated {
                events.push(SyncEvent::new(block_number, log_index, SyncEventKind::StrategyUpdated(strategy)));
            }
            for (block_number, log_index, strategy) in deleted {
                events.push(SyncEvent::new(block_number, log_index, SyncEventKind::StrategyDeleted { id: strategy.id }));
            }
            for (block_number, log_index, token0, token1, fee_ppm) in pair_fees {
                events.push(SyncEvent::new(
                    block_number,
                    log_index,
                    SyncEventKind::PairTradingFeePpmUpdated { token0, token1, fee_ppm },
                ));
            }
            for (block_number, log_index, fee_ppm) in global_fees {
                events.push(SyncEvent::new(block_number, log_index, SyncEventKind::TradingFeePpmUpdated { fee_ppm }));
            }

            traded_within_cached_pairs += trades
                .into_iter()
                .filter(|trade| cached_keys.contains(&pair_key(&trade.token0, &trade.token1)))
                .count();

            chunk_start = chunk_end + 1;
        }

        if traded_within_cached_pairs > 0 {
            debug!(count = traded_within_cached_pairs, "observed trades against cached pairs this poll");
        }

        stable_sort_by_block_and_log(&mut events);
        self.cache.apply_events(events, to).await;

        if saw_global_fee_update {
            let all_pairs: Vec<(TokenId, TokenId)> =
                self.cache.get_cached_pairs(false).await.iter().filter_map(pair_cache::from_pair_key).collect();
            match self.fetcher.pairs_trading_fee_ppm(&all_pairs).await {
                Ok(fees) => {
                    for (token0, token1, fee) in fees {
                        self.cache.add_pair_fees(&token0, &token1, fee).await;
                    }
                }
                Err(err) => error!(%err, "failed to refresh fees after global fee update"),
            }
        }

        if !newly_created_pairs.is_empty() {
            let mut pending = self.uncached_pairs.lock().await;
            pending.extend(newly_created_pairs.clone());
            drop(pending);
            let fee_requests = newly_created_pairs;
            match self.fetcher.pairs_trading_fee_ppm(&fee_requests).await {
                Ok(fees) => {
                    for (token0, token1, fee) in fees {
                        self.cache.add_pair_fees(&token0, &token1, fee).await;
                    }
                }
                Err(err) => error!(%err, "failed to fetch fees for newly-discovered pairs"),
            }
        }

        Ok(())
    }

    /// Explicit per-pair hydration, the shape expected by `Cache::set_cache_miss_handler`:
    /// if the pair isn't cached yet, fetch its strategies and add it.
    pub async fn sync_pair(&self, token0: TokenId, token1: TokenId) {
        if self.cache.get_strategies_by_pair(&token0, &token1).await.is_some() {
            return;
        }
        match self.fetcher.strategies_by_pair(&token0, &token1).await {
            Ok(strategies) => {
                if let Err(err) = self.cache.add_pair(&token0, &token1, strategies).await {
                    warn!(%err, "sync_pair: add_pair failed, pair was added concurrently");
                }
            }
            Err(err) => warn!(%err, "sync_pair: fetch failed"),
        }
    }

    /// Install this `Sync` as the cache's miss handler, wiring `sync_pair` in directly —
    /// the composition `pair-sync`'s consumers are expected to use.
    pub async fn install_as_cache_miss_handler(&self) {
        let sync = self.clone();
        self.cache
            .set_cache_miss_handler(move |_cache, token0, token1| {
                let sync = sync.clone();
                async move { sync.sync_pair(token0, token1).await }
            })
            .await;
    }
}

/// Concurrently fetch strategies for every batch in `batches`, preserving batch order.
/// Exposed for fetcher implementations that want to fan a single hydration round out
/// across several upstream requests themselves.
pub async fn fan_out_strategies_by_pairs<F: Fetcher>(
    fetcher: &F,
    batches: Vec<Vec<(TokenId, TokenId)>>,
) -> Vec<Result<Vec<(TokenId, TokenId, Vec<pair_cache::Strategy>)>, crate::error::FetcherError>> {
    join_all(batches.iter().map(|batch| fetcher.strategies_by_pairs(batch))).await
}
