//! LRU of decoded full-resolution storage tiles, bounded by a byte budget.

use std::sync::Arc;

use hashlink::LruCache;

use crate::codec::DecodedTile;
use crate::types::CacheBudget;

/// Identifies one storage tile of one catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    pub storage_index: usize,
}

impl TileKey {
    pub fn new(storage_index: usize) -> Self {
        Self { storage_index }
    }
}

/// Least-recently-used cache keyed by [`TileKey`].
#[derive(Debug)]
pub struct MemoryCache {
    entries: LruCache<TileKey, Arc<DecodedTile>>,
    budget: CacheBudget,
    bytes_used: usize,
}

impl MemoryCache {
    pub fn new(budget: CacheBudget) -> Self {
        Self { entries: LruCache::new_unbounded(), budget, bytes_used: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    /// Look up a tile, refreshing its recency.
    pub fn get(&mut self, key: &TileKey) -> Option<Arc<DecodedTile>> {
        self.entries.get(key).cloned()
    }

    /// Insert or replace a tile. Tiles larger than the whole budget are not stored.
    pub fn insert(&mut self, key: TileKey, tile: Arc<DecodedTile>) {
        let cost = tile.byte_size();
        if cost > self.budget.bytes_max {
            return;
        }

        if let Some(existing) = self.entries.remove(&key) {
            self.bytes_used = self.bytes_used.saturating_sub(existing.byte_size());
        }

        self.bytes_used += cost;
        self.entries.insert(key, tile);
        self.evict_if_needed();
    }

    pub fn remove(&mut self, key: &TileKey) -> Option<Arc<DecodedTile>> {
        let removed = self.entries.remove(key);
        if let Some(ref tile) = removed {
            self.bytes_used = self.bytes_used.saturating_sub(tile.byte_size());
        }
        removed
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.bytes_used = 0;
    }

    fn evict_if_needed(&mut self) {
        while self.bytes_used > self.budget.bytes_max {
            match self.entries.remove_lru() {
                Some((_key, oldest)) => {
                    self.bytes_used = self.bytes_used.saturating_sub(oldest.byte_size());
                }
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Dimensions;

    fn tile(bytes: usize) -> Arc<DecodedTile> {
        Arc::new(DecodedTile { dimensions: Dimensions::new(bytes as u32, 1), bands: 1, pixels: vec![0; bytes] })
    }

    #[test]
    fn evicts_least_recently_used() {
        let mut cache = MemoryCache::new(CacheBudget { bytes_max: 64 });
        cache.insert(TileKey::new(1), tile(32));
        cache.insert(TileKey::new(2), tile(32));
        assert!(cache.get(&TileKey::new(1)).is_some());

        cache.insert(TileKey::new(3), tile(32));
        assert!(cache.get(&TileKey::new(1)).is_some());
        assert!(cache.get(&TileKey::new(2)).is_none());
        assert!(cache.get(&TileKey::new(3)).is_some());
        assert_eq!(cache.bytes_used(), 64);
    }

    #[test]
    fn skips_tiles_larger_than_budget() {
        let mut cache = MemoryCache::new(CacheBudget { bytes_max: 16 });
        cache.insert(TileKey::new(0), tile(8));
        cache.insert(TileKey::new(1), tile(32));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.bytes_used(), 8);
    }

    #[test]
    fn replacing_entry_updates_usage() {
        let mut cache = MemoryCache::new(CacheBudget { bytes_max: 64 });
        cache.insert(TileKey::new(0), tile(8));
        cache.insert(TileKey::new(0), tile(24));
        assert_eq!(cache.bytes_used(), 24);
        assert_eq!(cache.remove(&TileKey::new(0)).unwrap().byte_size(), 24);
        assert!(cache.is_empty());
    }
}
