//! Capacity-bounded LRU tier with a read-through fixed front tier

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::recency_list::{RecencyList, SlotIdx};
use crate::cache::tier::fixed::FixedTierCache;
use crate::cache::traits::{CacheOperationError, Fingerprint, Fingerprintable};
use crate::cache::types::statistics::AccessCounter;

#[derive(Debug)]
struct RecencyState {
    list: RecencyList<(Fingerprint, f32)>,
    index: HashMap<Fingerprint, SlotIdx>,
}

impl RecencyState {
    fn with_capacity(capacity: usize) -> Self {
        // bounded so a huge configured capacity does not allocate up front
        let reserve = capacity.min(4096);
        Self {
            list: RecencyList::with_capacity(reserve),
            index: HashMap::with_capacity(reserve),
        }
    }

    fn check_size(&self, capacity: usize) -> Result<(), CacheOperationError> {
        if self.index.len() != self.list.len() {
            return Err(CacheOperationError::consistency(format!(
                "index holds {} keys but recency list holds {}",
                self.index.len(),
                self.list.len()
            )));
        }
        if self.list.len() > capacity {
            return Err(CacheOperationError::consistency(format!(
                "size {} exceeds capacity {}",
                self.list.len(),
                capacity
            )));
        }
        Ok(())
    }

    fn promote(&mut self, slot: SlotIdx) -> Result<f32, CacheOperationError> {
        if !self.list.move_to_front(slot) {
            return Err(CacheOperationError::consistency(
                "index points at a vacant recency slot",
            ));
        }
        self.value_at(slot)
    }

    fn value_at(&self, slot: SlotIdx) -> Result<f32, CacheOperationError> {
        self.list
            .get(slot)
            .map(|(_, value)| *value)
            .ok_or_else(|| CacheOperationError::consistency("index points at a vacant recency slot"))
    }
}

/// Thread-safe LRU cache of raw cost values
///
/// Lookups consult the fixed tier first; a hit there never touches the
/// dynamic tier. Writes never overwrite: the first value stored for a key is
/// kept until the key is evicted. With `capacity == 0` the dynamic tier is
/// disabled and only the fixed tier can answer.
#[derive(Debug)]
pub struct BoundedLruCache {
    capacity: usize,
    fixed: FixedTierCache,
    state: RwLock<RecencyState>,
    counter: AccessCounter,
}

impl BoundedLruCache {
    pub fn new(capacity: usize, fixed: FixedTierCache) -> Self {
        Self {
            capacity,
            fixed,
            state: RwLock::new(RecencyState::with_capacity(capacity)),
            counter: AccessCounter::new(),
        }
    }

    /// Cache with an empty fixed tier
    pub fn without_fixed_tier(capacity: usize, key_length: usize) -> Self {
        Self::new(capacity, FixedTierCache::empty(key_length))
    }

    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline(always)]
    pub fn is_disabled(&self) -> bool {
        self.capacity == 0
    }

    pub fn fixed(&self) -> &FixedTierCache {
        &self.fixed
    }

    /// Dynamic tier hit/miss counter
    pub fn counter(&self) -> &AccessCounter {
        &self.counter
    }

    pub fn key_length(&self) -> usize {
        self.fixed.key_length()
    }

    #[inline]
    pub fn fingerprint<K: Fingerprintable + ?Sized>(&self, key: &K) -> Fingerprint {
        key.fingerprint(self.fixed.context())
    }

    /// Entries held by the dynamic tier
    pub fn size(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .list
            .len()
    }

    /// Presence test without promotion or counting
    pub fn contains<K: Fingerprintable + ?Sized>(&self, key: &K) -> bool {
        let fingerprint = self.fingerprint(key);
        self.fixed.contains_fingerprint(fingerprint)
            || self
                .state
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .index
                .contains_key(&fingerprint)
    }

    pub fn add<K: Fingerprintable + ?Sized>(&self, key: &K, value: f32) -> Result<(), CacheOperationError> {
        self.add_by_fingerprint(self.fingerprint(key), value)
    }

    pub fn add_by_fingerprint(&self, fingerprint: Fingerprint, value: f32) -> Result<(), CacheOperationError> {
        if self.is_disabled() || self.fixed.contains_fingerprint(fingerprint) {
            return Ok(());
        }

        let mut state = self.write_state()?;

        if let Some(slot) = state.index.get(&fingerprint).copied() {
            // first write wins, the repeat only refreshes recency
            state.promote(slot)?;
            return state.check_size(self.capacity);
        }

        let slot = state.list.push_front((fingerprint, value)).ok_or_else(|| {
            CacheOperationError::consistency("recency list slab exhausted")
        })?;
        state.index.insert(fingerprint, slot);

        while state.list.len() > self.capacity {
            let (evicted, _) = state
                .list
                .pop_back()
                .ok_or_else(|| CacheOperationError::consistency("eviction from an empty list"))?;
            if state.index.remove(&evicted).is_none() {
                return Err(CacheOperationError::consistency(format!(
                    "evicted key {:#018x} missing from index",
                    evicted.value()
                )));
            }
            log::trace!("Evicted cache entry {:#018x}", evicted.value());
        }

        state.check_size(self.capacity)
    }

    pub fn get<K: Fingerprintable + ?Sized>(&self, key: &K) -> Result<Option<f32>, CacheOperationError> {
        self.get_by_fingerprint(self.fingerprint(key))
    }

    pub fn get_by_fingerprint(&self, fingerprint: Fingerprint) -> Result<Option<f32>, CacheOperationError> {
        if let Some(value) = self.fixed.get_by_fingerprint(fingerprint) {
            return Ok(Some(value));
        }
        if self.is_disabled() {
            self.counter.miss();
            return Ok(None);
        }

        {
            let state = self.read_state()?;
            match state.index.get(&fingerprint).copied() {
                None => {
                    self.counter.miss();
                    return Ok(None);
                }
                Some(slot) if state.list.front_index() == Some(slot) => {
                    let value = state.value_at(slot)?;
                    self.counter.hit();
                    return Ok(Some(value));
                }
                Some(_) => {}
            }
        }

        // Promotion needs the exclusive lock; the entry may have been evicted
        // or moved while no lock was held.
        let mut state = self.write_state()?;
        match state.index.get(&fingerprint).copied() {
            None => {
                self.counter.miss();
                Ok(None)
            }
            Some(slot) => {
                let value = state.promote(slot)?;
                state.check_size(self.capacity)?;
                self.counter.hit();
                Ok(Some(value))
            }
        }
    }

    /// Dynamic tier content, most recently used first
    pub fn recency_snapshot(&self) -> Vec<(Fingerprint, f32)> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        state.list.iter().map(|(_, entry)| *entry).collect()
    }

    /// Full structural check: sizes, capacity and every index link
    pub fn check_consistency(&self) -> Result<(), CacheOperationError> {
        let state = self.read_state()?;
        state.check_size(self.capacity)?;
        for (slot, (fingerprint, _)) in state.list.iter() {
            if state.index.get(fingerprint) != Some(&slot) {
                return Err(CacheOperationError::consistency(format!(
                    "index does not mirror recency list for key {:#018x}",
                    fingerprint.value()
                )));
            }
        }
        Ok(())
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, RecencyState>, CacheOperationError> {
        self.state
            .read()
            .map_err(|_| CacheOperationError::consistency("cache lock poisoned"))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, RecencyState>, CacheOperationError> {
        self.state
            .write()
            .map_err(|_| CacheOperationError::consistency("cache lock poisoned"))
    }
}

impl Drop for BoundedLruCache {
    fn drop(&mut self) {
        if self.counter.accesses() > 0 {
            self.counter.log_summary("Dynamic cache tier at shutdown: ");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tier::persistent::PersistentStore;

    const V1: [f32; 3] = [1.0, 2.0, 3.0];
    const V2: [f32; 3] = [4.0, 5.0, 6.0];
    const V3: [f32; 3] = [7.0, 8.0, 9.0];

    fn cache(capacity: usize) -> BoundedLruCache {
        BoundedLruCache::without_fixed_tier(capacity, 3)
    }

    #[test]
    fn test_single_slot_scenario() {
        let cache = cache(1);
        cache.add(&V1, 101.0).unwrap();
        cache.add(&V1, 101.0).unwrap();
        assert_eq!(cache.size(), 1);
        assert_eq!(cache.get(&V1).unwrap(), Some(101.0));
        assert_eq!(cache.get(&V2).unwrap(), None);

        cache.add(&V2, 102.0).unwrap();
        assert_eq!(cache.get(&V1).unwrap(), None);
        assert_eq!(cache.get(&V2).unwrap(), Some(102.0));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_first_write_wins() {
        let cache = cache(4);
        cache.add(&V1, 1.5).unwrap();
        cache.add(&V1, 9.5).unwrap();
        assert_eq!(cache.get(&V1).unwrap(), Some(1.5));
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_disabled_cache_never_stores() {
        let cache = cache(0);
        assert!(cache.is_disabled());
        cache.add(&V1, 3.0).unwrap();
        assert_eq!(cache.get(&V1).unwrap(), None);
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.counter().misses(), 1);
    }

    #[test]
    fn test_get_promotes_and_eviction_takes_least_recent() {
        let cache = cache(2);
        cache.add(&V1, 1.0).unwrap();
        cache.add(&V2, 2.0).unwrap();

        // V1 becomes most recently used, so V2 is the eviction victim
        assert_eq!(cache.get(&V1).unwrap(), Some(1.0));
        cache.add(&V3, 3.0).unwrap();

        assert_eq!(cache.get(&V2).unwrap(), None);
        assert_eq!(cache.get(&V1).unwrap(), Some(1.0));
        assert_eq!(cache.get(&V3).unwrap(), Some(3.0));
        cache.check_consistency().unwrap();
    }

    #[test]
    fn test_duplicate_add_promotes() {
        let cache = cache(2);
        cache.add(&V1, 1.0).unwrap();
        cache.add(&V2, 2.0).unwrap();
        cache.add(&V1, 100.0).unwrap();
        cache.add(&V3, 3.0).unwrap();

        assert!(cache.contains(&V1));
        assert!(!cache.contains(&V2));
        let snapshot = cache.recency_snapshot();
        assert_eq!(snapshot[0], (cache.fingerprint(&V3), 3.0));
        assert_eq!(snapshot[1], (cache.fingerprint(&V1), 1.0));
    }

    #[test]
    fn test_capacity_invariant_under_churn() {
        let cache = cache(8);
        for i in 0..200u32 {
            let key = [i as f32, (i % 7) as f32, 0.5];
            cache.add(&key, i as f32).unwrap();
            if i % 3 == 0 {
                let probe = [(i / 2) as f32, ((i / 2) % 7) as f32, 0.5];
                cache.get(&probe).unwrap();
            }
            assert!(cache.size() <= 8);
            cache.check_consistency().unwrap();
        }
        assert_eq!(cache.size(), 8);
    }

    #[test]
    fn test_fixed_tier_precedence() {
        let mut store = PersistentStore::new(3);
        store.write_one(&V1, 50.0);
        let cache = BoundedLruCache::new(4, FixedTierCache::from_store(store));

        // the fixed tier already knows V1, so the dynamic add is ignored
        cache.add(&V1, 1.0).unwrap();
        assert_eq!(cache.size(), 0);

        cache.add(&V2, 2.0).unwrap();
        cache.add(&V3, 3.0).unwrap();
        let before = cache.recency_snapshot();

        assert_eq!(cache.get(&V1).unwrap(), Some(50.0));
        assert_eq!(cache.recency_snapshot(), before);
        assert_eq!(cache.fixed().counter().hits(), 1);
        assert_eq!(cache.counter().accesses(), 0);
    }

    #[test]
    fn test_disabled_dynamic_tier_still_reads_fixed() {
        let mut store = PersistentStore::new(3);
        store.write_one(&V2, 22.0);
        let cache = BoundedLruCache::new(0, FixedTierCache::from_store(store));
        assert_eq!(cache.get(&V2).unwrap(), Some(22.0));
        assert_eq!(cache.get(&V1).unwrap(), None);
    }

    #[test]
    fn test_counters_track_dynamic_lookups() {
        let cache = cache(4);
        cache.add(&V1, 1.0).unwrap();
        cache.get(&V1).unwrap();
        cache.get(&V2).unwrap();
        assert_eq!(cache.counter().hits(), 1);
        assert_eq!(cache.counter().misses(), 1);
    }
}
