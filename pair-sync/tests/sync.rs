use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use num_bigint::BigUint;
use pair_cache::{BlockMetadata, Cache, Order, PairFeePpm, Strategy, TokenId, TradeData};
use pair_sync::{Fetcher, FetcherError, Sync, SyncConfig};

#[derive(Default)]
struct MockFetcher {
    block_number: StdMutex<u64>,
    blocks: StdMutex<std::collections::HashMap<u64, BlockMetadata>>,
    pairs: StdMutex<Vec<(TokenId, TokenId)>>,
    strategies_by_pair: StdMutex<std::collections::HashMap<(String, String), Vec<Strategy>>>,
    fees: StdMutex<std::collections::HashMap<(String, String), PairFeePpm>>,
    created: StdMutex<Vec<(u64, u32, Strategy)>>,
    updated: StdMutex<Vec<(u64, u32, Strategy)>>,
    deleted: StdMutex<Vec<(u64, u32, Strategy)>>,
    trades: StdMutex<Vec<TradeData>>,
    pair_fee_updates: StdMutex<Vec<(u64, u32, TokenId, TokenId, PairFeePpm)>>,
    global_fee_updates: StdMutex<Vec<(u64, u32, PairFeePpm)>>,
}

fn flat_order() -> Order {
    Order::new(BigUint::from(1u8), BigUint::from(1u8), BigUint::from(1u8), BigUint::from(1u8))
}

fn strategy(id: u64, t0: &str, t1: &str) -> Strategy {
    Strategy::new(BigUint::from(id), TokenId::from(t0), TokenId::from(t1), flat_order(), flat_order())
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn get_block_number(&self) -> Result<u64, FetcherError> {
        Ok(*self.block_number.lock().unwrap())
    }

    async fn get_block(&self, number: u64) -> Result<Option<BlockMetadata>, FetcherError> {
        Ok(self.blocks.lock().unwrap().get(&number).cloned())
    }

    async fn pairs(&self) -> Result<Vec<(TokenId, TokenId)>, FetcherError> {
        Ok(self.pairs.lock().unwrap().clone())
    }

    async fn strategies_by_pair(&self, t0: &TokenId, t1: &TokenId) -> Result<Vec<Strategy>, FetcherError> {
        Ok(self
            .strategies_by_pair
            .lock()
            .unwrap()
            .get(&(t0.as_str().to_string(), t1.as_str().to_string()))
            .cloned()
            .unwrap_or_default())
    }

    async fn strategies_by_pairs(
        &self,
        pairs: &[(TokenId, TokenId)],
    ) -> Result<Vec<(TokenId, TokenId, Vec<Strategy>)>, FetcherError> {
        let mut out = Vec::new();
        for (t0, t1) in pairs {
            let strategies = self.strategies_by_pair(t0, t1).await?;
            out.push((t0.clone(), t1.clone(), strategies));
        }
        Ok(out)
    }

    async fn pairs_trading_fee_ppm(
        &self,
        pairs: &[(TokenId, TokenId)],
    ) -> Result<Vec<(TokenId, TokenId, PairFeePpm)>, FetcherError> {
        let fees = self.fees.lock().unwrap();
        Ok(pairs
            .iter()
            .filter_map(|(t0, t1)| {
                fees.get(&(t0.as_str().to_string(), t1.as_str().to_string()))
                    .map(|fee| (t0.clone(), t1.clone(), *fee))
            })
            .collect())
    }

    async fn latest_strategy_created(&self, _from: u64, _to: u64) -> Result<Vec<(u64, u32, Strategy)>, FetcherError> {
        Ok(std::mem::take(&mut self.created.lock().unwrap()))
    }

    async fn latest_strategy_updated(&self, _from: u64, _to: u64) -> Result<Vec<(u64, u32, Strategy)>, FetcherError> {
        Ok(std::mem::take(&mut self.updated.lock().unwrap()))
    }

    async fn latest_strategy_deleted(&self, _from: u64, _to: u64) -> Result<Vec<(u64, u32, Strategy)>, FetcherError> {
        Ok(std::mem::take(&mut self.deleted.lock().unwrap()))
    }

    async fn latest_tokens_traded(&self, _from: u64, _to: u64) -> Result<Vec<TradeData>, FetcherError> {
        Ok(std::mem::take(&mut self.trades.lock().unwrap()))
    }

    async fn latest_pair_trading_fee_updates(
        &self,
        _from: u64,
        _to: u64,
    ) -> Result<Vec<(u64, u32, TokenId, TokenId, PairFeePpm)>, FetcherError> {
        Ok(std::mem::take(&mut self.pair_fee_updates.lock().unwrap()))
    }

    async fn latest_trading_fee_updates(&self, _from: u64, _to: u64) -> Result<Vec<(u64, u32, PairFeePpm)>, FetcherError> {
        Ok(std::mem::take(&mut self.global_fee_updates.lock().unwrap()))
    }
}

#[tokio::test]
async fn start_bootstraps_watermark_and_discovers_pairs() {
    let fetcher = MockFetcher::default();
    *fetcher.block_number.lock().unwrap() = 42;
    fetcher.pairs.lock().unwrap().push((TokenId::from("abc"), TokenId::from("xyz")));
    fetcher
        .strategies_by_pair
        .lock()
        .unwrap()
        .insert(("abc".to_string(), "xyz".to_string()), vec![strategy(1, "abc", "xyz")]);

    let cache = Cache::new();
    let sync = Sync::new(fetcher, cache.clone(), SyncConfig::default());

    sync.start().await.unwrap();
    assert_eq!(cache.get_latest_block_number().await, 42);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let strategies = cache.get_strategies_by_pair(&TokenId::from("abc"), &TokenId::from("xyz")).await;
    assert_eq!(strategies.map(|s| s.len()), Some(1));

    sync.stop();
}

#[tokio::test]
async fn start_twice_fails_loudly() {
    let fetcher = MockFetcher::default();
    let cache = Cache::new();
    let sync = Sync::new(fetcher, cache, SyncConfig::default());

    sync.start().await.unwrap();
    assert!(sync.start().await.is_err());
    sync.stop();
}

#[tokio::test]
async fn sync_pair_hydrates_once_and_is_a_no_op_if_already_cached() {
    let fetcher = MockFetcher::default();
    fetcher
        .strategies_by_pair
        .lock()
        .unwrap()
        .insert(("abc".to_string(), "xyz".to_string()), vec![strategy(1, "abc", "xyz")]);

    let cache = Cache::new();
    let sync = Sync::new(fetcher, cache.clone(), SyncConfig::default());

    let abc = TokenId::from("abc");
    let xyz = TokenId::from("xyz");
    sync.sync_pair(abc.clone(), xyz.clone()).await;
    assert_eq!(cache.get_strategies_by_pair(&abc, &xyz).await.map(|s| s.len()), Some(1));

    // Second call is a no-op: the pair is already tracked, so add_pair is never retried.
    sync.sync_pair(abc.clone(), xyz.clone()).await;
    assert_eq!(cache.get_strategies_by_pair(&abc, &xyz).await.map(|s| s.len()), Some(1));
}

#[tokio::test]
async fn install_as_cache_miss_handler_wires_sync_pair_in() {
    let fetcher = MockFetcher::default();
    fetcher
        .strategies_by_pair
        .lock()
        .unwrap()
        .insert(("abc".to_string(), "xyz".to_string()), vec![strategy(7, "abc", "xyz")]);

    let cache = Cache::new();
    let sync = Sync::new(fetcher, cache.clone(), SyncConfig::default());
    sync.install_as_cache_miss_handler().await;

    let abc = TokenId::from("abc");
    let xyz = TokenId::from("xyz");
    let strategies = cache.get_strategies_by_pair(&abc, &xyz).await.unwrap();
    assert_eq!(strategies.len(), 1);
    assert_eq!(strategies[0].id, BigUint::from(7u8));
}
