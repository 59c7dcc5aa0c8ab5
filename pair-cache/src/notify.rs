use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::key::PairKey;

/// One of the cache's named notification channels (`cacheInitialized`, `cacheCleared`,
/// `pairAdded`, `pairDataChanged`), folded into a single enum the way
/// `jackbot-data`'s `MarketStreamEvent` folds several exchange event kinds into one
/// stream item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    /// Emitted exactly once per cache lifetime (unless reset by `clear()`), the first
    /// time `bulk_add_pairs` produces at least one pair.
    CacheInitialized,
    /// Emitted by `clear()`.
    CacheCleared,
    /// Emitted by `add_pair` once the pair has been fully populated.
    PairAdded(PairKey),
    /// Emitted by `apply_events` iff at least one strategy event affected a tracked pair.
    PairDataChanged(Vec<PairKey>),
}

/// Fan-out publisher for [`CacheEvent`]s. Mirrors the `event_listeners:
/// Vec<UnboundedSender<_>>` pattern used for chain-event fan-out elsewhere in this
/// ecosystem: subscribing is just pushing a new sender, and a send to a subscriber whose
/// receiver has dropped is pruned lazily rather than treated as an error.
#[derive(Debug, Default)]
pub struct NotifyBus {
    subscribers: Vec<mpsc::UnboundedSender<CacheEvent>>,
}

impl NotifyBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber. Multiple subscribers are allowed; each receives every
    /// event emitted after this call.
    pub fn subscribe(&mut self) -> UnboundedReceiverStream<CacheEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        UnboundedReceiverStream::new(rx)
    }

    /// Publish an event to every live subscriber, synchronously, within the operation
    /// that produced it. Dead subscribers (receiver dropped) are pruned.
    pub fn publish(&mut self, event: CacheEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
