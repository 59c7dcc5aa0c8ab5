use std::{collections::HashMap, future::Future, sync::Arc};

use fnv::{FnvHashMap, FnvHashSet};
use futures::future::BoxFuture;
use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, error, warn};

use crate::{
    error::CacheError,
    event::{SyncEvent, SyncEventKind},
    key::{directed_key, pair_key, DirectedKey, PairKey, TokenId},
    model::{BlockMetadata, Order, PairFeePpm, Strategy},
    notify::{CacheEvent, NotifyBus},
};

/// `schemeVersion` this build reads and writes. Bump whenever the snapshot field layout
/// or value encoding changes; any mismatch on load yields an empty cache (§6).
pub const SCHEME_VERSION: u32 = 7;

type MissHandlerFn = dyn Fn(Cache, TokenId, TokenId) -> BoxFuture<'static, ()> + Send + Sync;

/// In-process, event-sourced mirror of on-chain strategies, directional order books and
/// per-pair fees. Cheap to clone — every clone shares the same underlying state, handed
/// out as an `Arc<Mutex<_>>` handle to several concurrent consumers at once.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Mutex<CacheInner>>,
}

struct CacheInner {
    strategies_by_pair: FnvHashMap<PairKey, Vec<Strategy>>,
    strategies_by_id: FnvHashMap<BigUint, Strategy>,
    orders_by_directed_pair: FnvHashMap<DirectedKey, FnvHashMap<BigUint, Order>>,
    fee_by_pair: FnvHashMap<PairKey, PairFeePpm>,
    latest_block: u64,
    blocks_metadata: Vec<BlockMetadata>,
    initialized: bool,
    notify: NotifyBus,
    miss_handler: Option<Arc<MissHandlerFn>>,
}

impl Default for CacheInner {
    fn default() -> Self {
        Self {
            strategies_by_pair: FnvHashMap::default(),
            strategies_by_id: FnvHashMap::default(),
            orders_by_directed_pair: FnvHashMap::default(),
            fee_by_pair: FnvHashMap::default(),
            latest_block: 0,
            blocks_metadata: Vec::new(),
            initialized: false,
            notify: NotifyBus::new(),
            miss_handler: None,
        }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(CacheInner::default())) }
    }

    /// Register the single cache-miss handler, replacing any previously registered one.
    /// Invoked at most once per call from `get_strategies_by_pair`, `get_orders_by_pair`
    /// and `get_trading_fee_ppm_by_pair` when the cache is not yet initialized and the
    /// requested pair is not already tracked (§4.6).
    pub async fn set_cache_miss_handler<F, Fut>(&self, handler: F)
    where
        F: Fn(Cache, TokenId, TokenId) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let boxed: Arc<MissHandlerFn> = Arc::new(move |cache, t0, t1| Box::pin(handler(cache, t0, t1)));
        self.inner.lock().await.miss_handler = Some(boxed);
    }

    async fn trigger_miss(&self, token0: &TokenId, token1: &TokenId) {
        let handler = self.inner.lock().await.miss_handler.clone();
        if let Some(handler) = handler {
            handler(self.clone(), token0.clone(), token1.clone()).await;
        }
    }

    /// Fails if the pair is already present — calling this twice for the same pair is a
    /// bug, not a transient condition (§7).
    pub async fn add_pair(
        &self,
        token0: &TokenId,
        token1: &TokenId,
        strategies: Vec<Strategy>,
    ) -> Result<(), CacheError> {
        let mut guard = self.inner.lock().await;
        let pair = add_pair_locked(&mut guard, token0, token1, strategies)?;
        guard.notify.publish(CacheEvent::PairAdded(pair));
        Ok(())
    }

    /// Apply `add_pair` for every entry. A pair already present is logged and skipped
    /// rather than failing the whole batch — unlike a single misused `add_pair` call,
    /// bulk hydration naturally overlaps with itself across discovery rounds. On the
    /// first call in this cache's lifetime that adds at least one pair, flips
    /// `initialized` and emits `CacheInitialized` exactly once (reset only by `clear`).
    pub async fn bulk_add_pairs(&self, pairs: Vec<(TokenId, TokenId, Vec<Strategy>)>) {
        let mut guard = self.inner.lock().await;
        let mut added = Vec::new();
        for (token0, token1, strategies) in pairs {
            match add_pair_locked(&mut guard, &token0, &token1, strategies) {
                Ok(pair) => added.push(pair),
                Err(err) => warn!(%err, "bulk_add_pairs: skipping pair already present"),
            }
        }
        let became_initialized = !added.is_empty() && !guard.initialized;
        if became_initialized {
            guard.initialized = true;
        }
        for pair in added {
            guard.notify.publish(CacheEvent::PairAdded(pair));
        }
        if became_initialized {
            guard.notify.publish(CacheEvent::CacheInitialized);
        }
    }

    /// Upsert a pair's fee. Independent of whether the pair is tracked in
    /// `strategies_by_pair` (fees may arrive before or after pairs, invariant 5). Emits
    /// no notification.
    pub async fn add_pair_fees(&self, token0: &TokenId, token1: &TokenId, fee_ppm: PairFeePpm) {
        let mut guard = self.inner.lock().await;
        guard.fee_by_pair.insert(pair_key(token0, token1), fee_ppm);
    }

    /// Replay a pre-sorted (by `(block_number, log_index)` ascending) batch of events,
    /// set the watermark to `current_block`, and emit `PairDataChanged` once for every
    /// pair touched by a strategy event in the batch (fee-only events do not count).
    pub async fn apply_events(&self, events: Vec<SyncEvent>, current_block: u64) {
        let mut guard = self.inner.lock().await;
        guard.latest_block = current_block;

        let mut affected: FnvHashSet<PairKey> = FnvHashSet::default();
        for event in events {
            apply_single_event(&mut guard, event, &mut affected);
        }

        if !affected.is_empty() {
            let mut pairs: Vec<PairKey> = affected.into_iter().collect();
            pairs.sort();
            guard.notify.publish(CacheEvent::PairDataChanged(pairs));
        }
    }

    /// Returns the strategies tracked for a pair, triggering the cache-miss handler (at
    /// most once) first if the cache is not yet initialized and the pair is untracked.
    pub async fn get_strategies_by_pair(&self, token0: &TokenId, token1: &TokenId) -> Option<Vec<Strategy>> {
        let pair = pair_key(token0, token1);
        {
            let guard = self.inner.lock().await;
            if let Some(list) = guard.strategies_by_pair.get(&pair) {
                return Some(list.clone());
            }
            if guard.initialized {
                return None;
            }
        }
        self.trigger_miss(token0, token1).await;
        self.inner.lock().await.strategies_by_pair.get(&pair).cloned()
    }

    /// Direct lookup by strategy id. Never triggers the cache-miss handler.
    pub async fn get_strategy_by_id(&self, id: &BigUint) -> Option<Strategy> {
        self.inner.lock().await.strategies_by_id.get(id).cloned()
    }

    /// Returns `strategyId -> Order` for the given trade direction, filtered by
    /// [`Order::tradable`] unless `keep_non_tradable` is set. May trigger the cache-miss
    /// handler under the same rule as `get_strategies_by_pair`.
    pub async fn get_orders_by_pair(
        &self,
        source: &TokenId,
        target: &TokenId,
        keep_non_tradable: bool,
    ) -> Option<FnvHashMap<BigUint, Order>> {
        let pair = pair_key(source, target);
        let directed = directed_key(source, target);
        {
            let guard = self.inner.lock().await;
            if guard.strategies_by_pair.contains_key(&pair) {
                return Some(orders_for_direction(&guard, &directed, keep_non_tradable));
            }
            if guard.initialized {
                return None;
            }
        }
        self.trigger_miss(source, target).await;
        let guard = self.inner.lock().await;
        guard
            .strategies_by_pair
            .contains_key(&pair)
            .then(|| orders_for_direction(&guard, &directed, keep_non_tradable))
    }

    /// All tracked `PairKey`s, optionally filtering out pairs whose strategy list is
    /// currently empty.
    pub async fn get_cached_pairs(&self, only_with_strategies: bool) -> Vec<PairKey> {
        let guard = self.inner.lock().await;
        guard
            .strategies_by_pair
            .iter()
            .filter(|(_, strategies)| !only_with_strategies || !strategies.is_empty())
            .map(|(pair, _)| pair.clone())
            .collect()
    }

    /// Returns the pair's fee, triggering the cache-miss handler under the same rule as
    /// `get_strategies_by_pair` if the fee is absent and the pair is untracked.
    pub async fn get_trading_fee_ppm_by_pair(&self, token0: &TokenId, token1: &TokenId) -> Option<PairFeePpm> {
        let pair = pair_key(token0, token1);
        {
            let guard = self.inner.lock().await;
            if let Some(fee) = guard.fee_by_pair.get(&pair) {
                return Some(*fee);
            }
            if guard.strategies_by_pair.contains_key(&pair) || guard.initialized {
                return None;
            }
        }
        self.trigger_miss(token0, token1).await;
        self.inner.lock().await.fee_by_pair.get(&pair).copied()
    }

    pub async fn get_latest_block_number(&self) -> u64 {
        self.inner.lock().await.latest_block
    }

    pub async fn is_initialized(&self) -> bool {
        self.inner.lock().await.initialized
    }

    /// The `blocksMetadata` accessor the synchronizer drives directly for reorg
    /// detection. Not part of the serialized snapshot.
    pub async fn blocks_metadata(&self) -> Vec<BlockMetadata> {
        self.inner.lock().await.blocks_metadata.clone()
    }

    pub async fn set_blocks_metadata(&self, blocks: Vec<BlockMetadata>) {
        self.inner.lock().await.blocks_metadata = blocks;
    }

    /// Reset all state, including `initialized`. Emits `CacheCleared`. Registered
    /// cache-miss handlers and notification subscribers survive a clear.
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        guard.strategies_by_pair.clear();
        guard.strategies_by_id.clear();
        guard.orders_by_directed_pair.clear();
        guard.fee_by_pair.clear();
        guard.latest_block = 0;
        guard.blocks_metadata.clear();
        guard.initialized = false;
        guard.notify.publish(CacheEvent::CacheCleared);
    }

    /// Subscribe to the notification bus. Multiple subscribers are allowed.
    pub async fn subscribe(&self) -> UnboundedReceiverStream<CacheEvent> {
        self.inner.lock().await.notify.subscribe()
    }

    /// Serialize the strategies, fees and latest block number to the versioned JSON
    /// snapshot format (§6). `blocks_metadata` is intentionally excluded.
    pub async fn serialize(&self) -> String {
        let guard = self.inner.lock().await;
        let snapshot = Snapshot {
            scheme_version: SCHEME_VERSION,
            strategies_by_pair: guard
                .strategies_by_pair
                .iter()
                .map(|(pair, strategies)| (pair.as_str().to_string(), strategies.clone()))
                .collect(),
            trading_fee_ppm_by_pair: guard
                .fee_by_pair
                .iter()
                .map(|(pair, fee)| (pair.as_str().to_string(), *fee))
                .collect(),
            latest_block_number: guard.latest_block,
        };
        serde_json::to_string(&snapshot).expect("Snapshot is always serializable")
    }

    /// Hydrate from a snapshot produced by `serialize`. Never fails observably: any
    /// parse error, scheme-version mismatch, missing field or wrong-typed
    /// `latestBlockNumber` yields a fresh empty cache instead of an error (§6, §7).
    pub fn from_serialized(raw: &str) -> Self {
        match parse_snapshot(raw) {
            Some(inner) => Self { inner: Arc::new(Mutex::new(inner)) },
            None => Self::new(),
        }
    }
}

fn orders_for_direction(
    guard: &CacheInner,
    directed: &DirectedKey,
    keep_non_tradable: bool,
) -> FnvHashMap<BigUint, Order> {
    let Some(bucket) = guard.orders_by_directed_pair.get(directed) else {
        return FnvHashMap::default();
    };
    bucket
        .iter()
        .filter(|(_, order)| keep_non_tradable || order.tradable())
        .map(|(id, order)| (id.clone(), order.clone()))
        .collect()
}

fn add_pair_locked(
    inner: &mut CacheInner,
    token0: &TokenId,
    token1: &TokenId,
    strategies: Vec<Strategy>,
) -> Result<PairKey, CacheError> {
    let pair = pair_key(token0, token1);
    if inner.strategies_by_pair.contains_key(&pair) {
        return Err(CacheError::PairAlreadyPresent(pair));
    }
    for strategy in &strategies {
        index_new_strategy(inner, strategy);
    }
    inner.strategies_by_pair.insert(pair.clone(), strategies);
    Ok(pair)
}

fn index_new_strategy(inner: &mut CacheInner, strategy: &Strategy) {
    inner.strategies_by_id.insert(strategy.id.clone(), strategy.clone());
    insert_directed_order(inner, &strategy.token0, &strategy.token1, strategy.id.clone(), strategy.order1.clone());
    insert_directed_order(inner, &strategy.token1, &strategy.token0, strategy.id.clone(), strategy.order0.clone());
}

fn insert_directed_order(inner: &mut CacheInner, source: &TokenId, target: &TokenId, id: BigUint, order: Order) {
    inner.orders_by_directed_pair.entry(directed_key(source, target)).or_default().insert(id, order);
}

fn remove_directed_order(inner: &mut CacheInner, source: &TokenId, target: &TokenId, id: &BigUint) {
    let key = directed_key(source, target);
    let Some(bucket) = inner.orders_by_directed_pair.get_mut(&key) else { return };
    bucket.remove(id);
    if bucket.is_empty() {
        // Delete the bucket keyed by the computed directional key once it empties out —
        // the reference implementation this was ported from deletes the wrong key here.
        inner.orders_by_directed_pair.remove(&key);
    }
}

fn deindex_strategy(inner: &mut CacheInner, strategy: &Strategy) {
    inner.strategies_by_id.remove(&strategy.id);
    remove_directed_order(inner, &strategy.token0, &strategy.token1, &strategy.id);
    remove_directed_order(inner, &strategy.token1, &strategy.token0, &strategy.id);
    if let Some(list) = inner.strategies_by_pair.get_mut(&pair_key(&strategy.token0, &strategy.token1)) {
        list.retain(|existing| existing.id != strategy.id);
    }
}

fn apply_single_event(inner: &mut CacheInner, event: SyncEvent, affected: &mut FnvHashSet<PairKey>) {
    match event.kind {
        SyncEventKind::StrategyCreated(strategy) => {
            let pair = pair_key(&strategy.token0, &strategy.token1);
            if !inner.strategies_by_pair.contains_key(&pair) {
                error!(pair = %pair, "StrategyCreated event for an uncached pair, skipping");
                return;
            }
            if inner.strategies_by_id.contains_key(&strategy.id) {
                warn!(id = %strategy.id, "StrategyCreated no-op: strategy id already live");
                return;
            }
            index_new_strategy(inner, &strategy);
            inner.strategies_by_pair.get_mut(&pair).expect("pair gate checked above").push(strategy);
            affected.insert(pair);
        }
        SyncEventKind::StrategyUpdated(strategy) => {
            let pair = pair_key(&strategy.token0, &strategy.token1);
            if !inner.strategies_by_pair.contains_key(&pair) {
                error!(pair = %pair, "StrategyUpdated event for an uncached pair, skipping");
                return;
            }
            let Some(previous) = inner.strategies_by_id.get(&strategy.id).cloned() else {
                warn!(id = %strategy.id, "StrategyUpdated no-op: strategy id not live");
                return;
            };
            deindex_strategy(inner, &previous);
            index_new_strategy(inner, &strategy);
            inner.strategies_by_pair.get_mut(&pair).expect("pair gate checked above").push(strategy);
            affected.insert(pair);
        }
        SyncEventKind::StrategyDeleted { id } => {
            let Some(previous) = inner.strategies_by_id.get(&id).cloned() else {
                warn!(%id, "StrategyDeleted no-op: strategy id not live");
                return;
            };
            let pair = pair_key(&previous.token0, &previous.token1);
            deindex_strategy(inner, &previous);
            affected.insert(pair);
        }
        SyncEventKind::PairTradingFeePpmUpdated { token0, token1, fee_ppm } => {
            // Last write wins within a batch: iterating in caller-provided
            // (block_number, log_index) order means the final insert naturally wins.
            inner.fee_by_pair.insert(pair_key(&token0, &token1), fee_ppm);
        }
        SyncEventKind::TradingFeePpmUpdated { .. } => {
            debug!("global TradingFeePPMUpdated event reached the cache and was ignored by contract");
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Snapshot {
    #[serde(rename = "schemeVersion")]
    scheme_version: u32,
    #[serde(rename = "strategiesByPair")]
    strategies_by_pair: HashMap<String, Vec<Strategy>>,
    #[serde(rename = "tradingFeePPMByPair")]
    trading_fee_ppm_by_pair: HashMap<String, PairFeePpm>,
    #[serde(rename = "latestBlockNumber")]
    latest_block_number: u64,
}

fn parse_snapshot(raw: &str) -> Option<CacheInner> {
    let snapshot: Snapshot = match serde_json::from_str(raw) {
        Ok(snapshot) => snapshot,
        Err(err) => {
            error!(%err, "cache snapshot failed to parse, hydrating an empty cache instead");
            return None;
        }
    };
    if snapshot.scheme_version != SCHEME_VERSION {
        error!(
            found = snapshot.scheme_version,
            expected = SCHEME_VERSION,
            "cache snapshot scheme version mismatch, hydrating an empty cache instead"
        );
        return None;
    }

    let mut inner = CacheInner::default();
    for (pair_str, strategies) in snapshot.strategies_by_pair {
        let pair = PairKey::from_canonical(pair_str);
        for strategy in &strategies {
            index_new_strategy(&mut inner, strategy);
        }
        inner.strategies_by_pair.insert(pair, strategies);
    }
    for (pair_str, fee) in snapshot.trading_fee_ppm_by_pair {
        inner.fee_by_pair.insert(PairKey::from_canonical(pair_str), fee);
    }
    inner.latest_block = snapshot.latest_block_number;
    inner.initialized = true;
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Order;

    fn order(y: u64, z: u64, a: u64, b: u64) -> Order {
        Order::new(BigUint::from(y), BigUint::from(z), BigUint::from(a), BigUint::from(b))
    }

    fn strategy(id: u64, token0: &str, token1: &str, order0: Order, order1: Order) -> Strategy {
        Strategy::new(BigUint::from(id), TokenId::from(token0), TokenId::from(token1), order0, order1)
    }

    #[tokio::test]
    async fn insert_update_delete_lifecycle() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        cache.add_pair(&abc, &xyz, vec![]).await.unwrap();

        let created = strategy(1, "abc", "xyz", order(100, 100, 1, 1), order(100, 100, 1, 1));
        cache
            .apply_events(vec![SyncEvent::new(1, 0, SyncEventKind::StrategyCreated(created.clone()))], 1)
            .await;
        assert_eq!(cache.get_strategy_by_id(&BigUint::from(1u8)).await, Some(created.clone()));

        let updated = strategy(1, "abc", "xyz", order(150, 100, 1, 1), order(100, 100, 1, 1));
        cache
            .apply_events(vec![SyncEvent::new(2, 0, SyncEventKind::StrategyUpdated(updated.clone()))], 2)
            .await;
        assert_eq!(cache.get_strategy_by_id(&BigUint::from(1u8)).await, Some(updated));

        cache
            .apply_events(vec![SyncEvent::new(3, 0, SyncEventKind::StrategyDeleted { id: BigUint::from(1u8) })], 3)
            .await;
        assert_eq!(cache.get_strategies_by_pair(&abc, &xyz).await, Some(vec![]));
        assert_eq!(cache.get_strategy_by_id(&BigUint::from(1u8)).await, None);
    }

    #[tokio::test]
    async fn key_canonicalisation_is_direction_independent() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        let s1 = strategy(1, "abc", "xyz", order(1, 1, 1, 1), order(1, 1, 1, 1));
        let s2 = strategy(2, "abc", "xyz", order(1, 1, 1, 1), order(1, 1, 1, 1));
        cache.add_pair(&abc, &xyz, vec![s1, s2]).await.unwrap();

        let via_reverse = cache.get_strategies_by_pair(&xyz, &abc).await.unwrap();
        assert_eq!(via_reverse.len(), 2);

        let pairs = cache.get_cached_pairs(false).await;
        assert_eq!(pairs, vec![pair_key(&abc, &xyz)]);
    }

    #[tokio::test]
    async fn directional_orders_are_indexed_by_who_they_serve() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        let order0 = order(10, 10, 1, 1);
        let order1 = order(20, 20, 1, 1);
        let s = strategy(1, "abc", "xyz", order0.clone(), order1.clone());
        cache.add_pair(&abc, &xyz, vec![s]).await.unwrap();

        let forward = cache.get_orders_by_pair(&abc, &xyz, true).await.unwrap();
        assert_eq!(forward.get(&BigUint::from(1u8)), Some(&order1));

        let backward = cache.get_orders_by_pair(&xyz, &abc, true).await.unwrap();
        assert_eq!(backward.get(&BigUint::from(1u8)), Some(&order0));
    }

    #[tokio::test]
    async fn tradability_filter_hides_zero_inventory_orders_by_default() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        let dead_order1 = order(0, 10, 1, 1);
        let s = strategy(1, "abc", "xyz", order(10, 10, 1, 1), dead_order1);
        cache.add_pair(&abc, &xyz, vec![s]).await.unwrap();

        let filtered = cache.get_orders_by_pair(&abc, &xyz, false).await.unwrap();
        assert!(filtered.is_empty());

        let unfiltered = cache.get_orders_by_pair(&abc, &xyz, true).await.unwrap();
        assert_eq!(unfiltered.len(), 1);
    }

    #[tokio::test]
    async fn cache_miss_handler_hydrates_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let cache = Cache::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_for_handler = calls.clone();
        let hydrated = strategy(1, "abc", "xyz", order(1, 1, 1, 1), order(1, 1, 1, 1));
        cache
            .set_cache_miss_handler(move |cache, t0, t1| {
                let calls = calls_for_handler.clone();
                let hydrated = hydrated.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    cache.add_pair(&t0, &t1, vec![hydrated]).await.unwrap();
                }
            })
            .await;

        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        let result = cache.get_strategies_by_pair(&abc, &xyz).await;
        assert_eq!(result.map(|s| s.len()), Some(1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn duplicate_add_pair_fails_loudly() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        cache.add_pair(&abc, &xyz, vec![]).await.unwrap();
        assert!(cache.add_pair(&abc, &xyz, vec![]).await.is_err());
    }

    #[tokio::test]
    async fn fee_update_is_last_write_wins_within_a_batch() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        cache.add_pair(&abc, &xyz, vec![]).await.unwrap();

        cache
            .apply_events(
                vec![
                    SyncEvent::new(
                        3,
                        0,
                        SyncEventKind::PairTradingFeePpmUpdated { token0: abc.clone(), token1: xyz.clone(), fee_ppm: 12 },
                    ),
                    SyncEvent::new(
                        3,
                        1,
                        SyncEventKind::PairTradingFeePpmUpdated { token0: abc.clone(), token1: xyz.clone(), fee_ppm: 13 },
                    ),
                ],
                3,
            )
            .await;

        assert_eq!(cache.get_trading_fee_ppm_by_pair(&abc, &xyz).await, Some(13));
    }

    #[tokio::test]
    async fn serialize_round_trips_strategies_fees_and_latest_block() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        let s = strategy(1, "abc", "xyz", order(1, 1, 1, 1), order(1, 1, 1, 1));
        cache.add_pair(&abc, &xyz, vec![s]).await.unwrap();
        cache.add_pair_fees(&abc, &xyz, 42).await;
        cache.apply_events(vec![], 100).await;

        let snapshot = cache.serialize().await;
        let restored = Cache::from_serialized(&snapshot);

        assert_eq!(restored.get_strategies_by_pair(&abc, &xyz).await, cache.get_strategies_by_pair(&abc, &xyz).await);
        assert_eq!(restored.get_trading_fee_ppm_by_pair(&abc, &xyz).await, Some(42));
        assert_eq!(restored.get_latest_block_number().await, 100);
        assert_eq!(restored.serialize().await, snapshot);
    }

    #[tokio::test]
    async fn scheme_version_mismatch_yields_empty_cache() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        cache.add_pair(&abc, &xyz, vec![]).await.unwrap();
        let snapshot = cache.serialize().await;

        let tampered = snapshot.replace("\"schemeVersion\":7", "\"schemeVersion\":6");
        let restored = Cache::from_serialized(&tampered);
        assert_eq!(restored.get_cached_pairs(false).await, Vec::<PairKey>::new());
        assert!(!restored.is_initialized().await);
    }

    #[tokio::test]
    async fn garbage_input_yields_empty_cache_not_a_panic() {
        let restored = Cache::from_serialized("not json at all");
        assert_eq!(restored.get_latest_block_number().await, 0);
        assert!(!restored.is_initialized().await);
    }

    #[tokio::test]
    async fn get_cached_pairs_with_and_without_empty_buckets() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        let def = TokenId::from("def");
        cache.add_pair(&abc, &xyz, vec![]).await.unwrap();
        cache
            .add_pair(&abc, &def, vec![strategy(1, "abc", "def", order(1, 1, 1, 1), order(1, 1, 1, 1))])
            .await
            .unwrap();

        let all = cache.get_cached_pairs(false).await;
        let populated_only = cache.get_cached_pairs(true).await;
        assert_eq!(all.len(), 2);
        assert_eq!(populated_only.len(), 1);
        assert!(populated_only.contains(&pair_key(&abc, &def)));
    }

    #[tokio::test]
    async fn clear_resets_state_and_initialized_flag() {
        let cache = Cache::new();
        let abc = TokenId::from("abc");
        let xyz = TokenId::from("xyz");
        cache.bulk_add_pairs(vec![(abc.clone(), xyz.clone(), vec![])]).await;
        assert!(cache.is_initialized().await);

        cache.clear().await;
        assert!(!cache.is_initialized().await);
        assert_eq!(cache.get_cached_pairs(false).await, Vec::<PairKey>::new());
    }
}
