use thiserror::Error;

/// Errors surfaced by a [`crate::Fetcher`] implementation.
///
/// `Sync` treats every variant as transient except where noted; see module docs on
/// [`crate::Sync`] for how each is absorbed.
#[derive(Debug, Error)]
pub enum FetcherError {
    #[error("fetcher transport error: {0}")]
    Transport(String),

    /// The provider returned no data for a requested block. Reorg detection treats this
    /// the same as a hash mismatch (conservative).
    #[error("block {0} not found")]
    BlockNotFound(u64),

    /// The provider returned something that could not be decoded into the expected shape.
    #[error("fetcher returned malformed data: {0}")]
    Malformed(String),
}

/// Errors `Sync` fails loudly on. Everything else is logged and retried.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Sync::start called more than once")]
    AlreadyStarted,

    /// The current block number could not be established during bootstrap — the cache
    /// cannot be seeded safely, so there is nothing sensible to retry.
    #[error("failed to bootstrap watermark: {0}")]
    BootstrapFailed(#[source] FetcherError),
}
