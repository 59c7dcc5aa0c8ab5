use pair_cache::{BlockMetadata, BLOCK_HISTORY_LEN};
use tracing::warn;

use crate::fetcher::Fetcher;

/// Check the cache's recent block history against the chain at `current_block`.
///
/// Conservative: any unreachable or missing block counts as a reorg, since a provider
/// error gives no basis to assume the chain hasn't moved under us.
pub async fn detect_reorg(fetcher: &dyn Fetcher, history: &[BlockMetadata], current_block: u64) -> bool {
    for block in history {
        if block.number > current_block {
            return true;
        }
        match fetcher.get_block(block.number).await {
            Ok(Some(fetched)) if fetched.hash == block.hash => {}
            Ok(Some(fetched)) => {
                warn!(number = block.number, expected = %block.hash, found = %fetched.hash, "reorg: block hash mismatch");
                return true;
            }
            Ok(None) => {
                warn!(number = block.number, "reorg: block no longer present on provider");
                return true;
            }
            Err(err) => {
                warn!(number = block.number, %err, "reorg: treating fetch failure as reorg");
                return true;
            }
        }
    }
    false
}

/// Rebuild the `blocksMetadata` window for `current_block`, reusing entries from `history`
/// that are still verified-current and fetching the rest. The result may be shorter than
/// [`BLOCK_HISTORY_LEN`] if some blocks could not be fetched.
pub async fn refresh_block_history(
    fetcher: &dyn Fetcher,
    history: &[BlockMetadata],
    current_block: u64,
) -> Vec<BlockMetadata> {
    let mut refreshed = Vec::with_capacity(BLOCK_HISTORY_LEN);
    for offset in 0..BLOCK_HISTORY_LEN as u64 {
        let Some(number) = current_block.checked_sub(offset) else { break };
        if let Some(reused) = history.iter().find(|b| b.number == number) {
            refreshed.push(reused.clone());
            continue;
        }
        match fetcher.get_block(number).await {
            Ok(Some(fetched)) => refreshed.push(fetched),
            Ok(None) => warn!(number, "refresh_block_history: block unavailable, history will be shorter than K"),
            Err(err) => warn!(number, %err, "refresh_block_history: fetch failed, history will be shorter than K"),
        }
    }
    refreshed
}
