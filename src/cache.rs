//! LRU block cache — byte-budgeted, keyed by block index position.
//!
//! `lru::LruCache` gives the ordered map + promote-on-access machinery;
//! eviction is driven by an explicit retained-byte counter rather than an
//! entry count, since the cache is budgeted in bytes, not entries.

use lru::LruCache;
use std::rc::Rc;

use crate::format::DEFAULT_CACHE_BYTES;

/// One cached block: its decompressed, `\n`-split, trailing-empty-trimmed lines.
pub type CachedBlock = Rc<Vec<String>>;

pub struct BlockCache {
    cache: LruCache<usize, CachedBlock>,
    capacity_bytes: usize,
    used_bytes: usize,
}

impl BlockCache {
    pub fn new(capacity_bytes: usize) -> Self {
        Self {
            // Unbounded by entry count; eviction is byte-budget driven below.
            cache: LruCache::unbounded(),
            capacity_bytes: capacity_bytes.max(1),
            used_bytes: 0,
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(DEFAULT_CACHE_BYTES)
    }

    /// Promote and return a cached block, if present.
    pub fn get(&mut self, block_index: usize) -> Option<CachedBlock> {
        self.cache.get(&block_index).cloned()
    }

    /// Insert a freshly decoded block, evicting least-recently-used entries
    /// until the retained size is back within budget.
    pub fn insert(&mut self, block_index: usize, lines: Vec<String>) -> CachedBlock {
        let size = estimate_size(&lines);
        let block = Rc::new(lines);

        if let Some(old) = self.cache.put(block_index, block.clone()) {
            self.used_bytes = self.used_bytes.saturating_sub(estimate_size(&old));
        }
        self.used_bytes += size;

        while self.used_bytes > self.capacity_bytes && self.cache.len() > 1 {
            if let Some((_, evicted)) = self.cache.pop_lru() {
                self.used_bytes = self.used_bytes.saturating_sub(estimate_size(&evicted));
            } else {
                break;
            }
        }

        block
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn used_bytes(&self) -> usize {
        self.used_bytes
    }
}

fn estimate_size(lines: &[String]) -> usize {
    lines.iter().map(|l| l.len() + 1).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(n: usize, len: usize) -> Vec<String> {
        (0..n).map(|i| format!("{:0width$}", i, width = len)).collect()
    }

    #[test]
    fn hit_and_miss() {
        let mut cache = BlockCache::new(1_000_000);
        assert!(cache.get(0).is_none());
        cache.insert(0, lines(2, 4));
        assert!(cache.get(0).is_some());
        assert!(cache.get(1).is_none());
    }

    #[test]
    fn evicts_lru_when_over_budget() {
        // Each block is ~100 bytes; budget fits only ~2.
        let mut cache = BlockCache::new(250);
        cache.insert(0, lines(10, 9)); // ~100B
        cache.insert(1, lines(10, 9));
        cache.insert(2, lines(10, 9));

        // Block 0 was least-recently-used and should have been evicted.
        assert!(cache.get(0).is_none());
        assert!(cache.get(2).is_some());
        assert!(cache.used_bytes() <= 250 + 100); // allow one entry's slack
    }

    #[test]
    fn get_promotes_entry() {
        let mut cache = BlockCache::new(250);
        cache.insert(0, lines(10, 9));
        cache.insert(1, lines(10, 9));
        cache.get(0); // promote 0 to most-recently-used
        cache.insert(2, lines(10, 9));

        // 1 was least-recently-used now, not 0.
        assert!(cache.get(1).is_none());
        assert!(cache.get(0).is_some());
    }
}
