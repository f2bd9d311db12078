//! Shared dedup set for the two ingestion paths

use dashmap::DashMap;
use indexer_types::VoteKey;
use std::sync::Arc;

/// Concurrent set of observed vote identities.
///
/// Shared between the subscription reader and the poller so the same log seen
/// on both paths is only emitted once. Entries for long-finalized windows are
/// evicted on a timer to bound memory.
#[derive(Clone, Default)]
pub struct SeenEvents {
    inner: Arc<DashMap<VoteKey, ()>>,
}

impl SeenEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a key. Returns true if this is the first observation.
    pub fn insert(&self, key: VoteKey) -> bool {
        self.inner.insert(key, ()).is_none()
    }

    pub fn contains(&self, key: &VoteKey) -> bool {
        self.inner.contains_key(key)
    }

    /// Drop all keys from blocks strictly below `cutoff_block`.
    pub fn evict_before(&self, cutoff_block: u64) {
        let before = self.inner.len();
        self.inner.retain(|key, _| key.block >= cutoff_block);
        let evicted = before - self.inner.len();
        if evicted > 0 {
            tracing::debug!("Evicted {} dedup entries below block {}", evicted, cutoff_block);
        }
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    fn key(block: u64, index: u32) -> VoteKey {
        VoteKey {
            block,
            tx_hash: B256::repeat_byte(0xaa),
            log_index: index,
        }
    }

    #[test]
    fn test_first_insert_wins() {
        let seen = SeenEvents::new();
        assert!(seen.insert(key(7, 0)));
        assert!(!seen.insert(key(7, 0)));
        assert_eq!(seen.len(), 1);
    }

    #[test]
    fn test_distinct_log_index_is_distinct_event() {
        let seen = SeenEvents::new();
        assert!(seen.insert(key(7, 0)));
        assert!(seen.insert(key(7, 1)));
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_eviction_by_block() {
        let seen = SeenEvents::new();
        for block in 0..10 {
            seen.insert(key(block, 0));
        }
        seen.evict_before(5);
        assert_eq!(seen.len(), 5);
        assert!(!seen.contains(&key(4, 0)));
        assert!(seen.contains(&key(5, 0)));
    }
}
