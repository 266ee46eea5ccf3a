//! Module: cache
//! Responsibility: memoized decoded records, keyed by record identity.
//! Does not own: persistence; loaders and the store decide what a miss means.
//! Boundary: db -> cache. The store routes every decode through `get_or_retrieve`.

mod batch;
mod entry;

#[cfg(test)]
mod tests;

pub use batch::CacheBatch;
pub use entry::Entry;

pub(crate) use entry::AnyModel;

use crate::{
    cache::{batch::BatchOp, entry::Slot},
    key::{Key, RawKey},
    model::{Model, SizedModel},
    sync::{DefaultLocking, ExclusiveLock, Locking, SharedLock},
};
use lru::LruCache;
use std::{
    collections::HashMap,
    fmt::{self, Debug},
    sync::Arc,
};

/// Default byte budget of a cache.
pub const DEFAULT_MAX_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// Default bound on `Deleted` and `Evicted` markers kept at once.
pub const DEFAULT_MAX_MARKERS: usize = 16 * 1024;

///
/// CacheStats
///
/// Counters over `get_or_retrieve` lookups and capacity evictions.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub loads: u64,
    pub evictions: u64,
}

struct CacheState {
    entries: LruCache<RawKey, Slot>,
    size: usize,
    markers: usize,
    max_size: usize,
    max_markers: usize,
    // Keys with a loader running; `true` once a write has landed on the key.
    loading: HashMap<RawKey, bool>,
    stats: CacheStats,
}

impl CacheState {
    fn new(max_size: usize, max_markers: usize) -> Self {
        Self {
            entries: LruCache::unbounded(),
            size: 0,
            markers: 0,
            max_size,
            max_markers,
            loading: HashMap::new(),
            stats: CacheStats::default(),
        }
    }

    // Install `slot` as most recent and return what it replaced. Evicted
    // markers go straight to the cold end.
    fn install(&mut self, key: RawKey, slot: Slot) -> Option<Slot> {
        let added = slot.size();
        let demote = matches!(slot, Slot::Evicted);
        if slot.is_marker() {
            self.markers += 1;
        }
        if let Some(written) = self.loading.get_mut(&key) {
            *written = true;
        }

        let old = self.entries.put(key.clone(), slot);
        if let Some(old) = &old {
            self.forget(old);
        }
        self.size += added;

        if demote {
            self.entries.demote(&key);
        }
        if added > 0 {
            self.fit(&key);
        }
        self.trim_markers(&key);

        old
    }

    fn remove(&mut self, key: &RawKey) -> Option<Slot> {
        let old = self.entries.pop(key)?;
        self.forget(&old);

        Some(old)
    }

    // Accounting for a slot leaving the map.
    fn forget(&mut self, slot: &Slot) {
        self.size -= slot.size();
        if slot.is_marker() {
            self.markers -= 1;
        }
    }

    fn clear(&mut self) {
        self.entries.clear();
        self.size = 0;
        self.markers = 0;
        self.loading.values_mut().for_each(|written| *written = true);
    }

    // Bring `size` back under `max_size`. Old markers go first, then the
    // coldest records become markers. `keep` is never touched.
    fn fit(&mut self, keep: &RawKey) {
        if self.size <= self.max_size {
            return;
        }

        while let Some((key, slot)) = self.entries.peek_lru() {
            if key == keep || !slot.is_marker() {
                break;
            }
            if let Some((_, slot)) = self.entries.pop_lru() {
                self.forget(&slot);
            }
        }

        let mut excess = self.size - self.max_size;
        let victims: Vec<RawKey> = self
            .entries
            .iter()
            .rev()
            .filter(|(key, slot)| *key != keep && matches!(slot, Slot::Present { .. }))
            .take_while(|(_, slot)| {
                let take = excess > 0;
                excess = excess.saturating_sub(slot.size());
                take
            })
            .map(|(key, _)| key.clone())
            .collect();

        for key in &victims {
            if let Some(slot) = self.entries.peek_mut(key) {
                self.size -= slot.size();
                self.markers += 1;
                *slot = Slot::Evicted;
            }
            self.entries.demote(key);
        }

        if !victims.is_empty() {
            self.stats.evictions += u64::try_from(victims.len()).unwrap_or(u64::MAX);
            tracing::debug!(
                target: "docdb::cache",
                evicted = victims.len(),
                size = self.size,
                max_size = self.max_size,
                "cache over budget, evicted least recently used records"
            );
        }
    }

    // Markers weigh nothing, so they are bounded by count. Past the bound the
    // least recent go, down to half of it.
    fn trim_markers(&mut self, keep: &RawKey) {
        if self.markers <= self.max_markers {
            return;
        }

        let excess = self.markers - self.max_markers / 2;
        let stale: Vec<RawKey> = self
            .entries
            .iter()
            .rev()
            .filter(|(key, slot)| *key != keep && slot.is_marker())
            .take(excess)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &stale {
            self.remove(key);
        }

        tracing::debug!(
            target: "docdb::cache",
            dropped = stale.len(),
            markers = self.markers,
            max_markers = self.max_markers,
            "too many markers, dropped least recently used"
        );
    }

    // Settle a load started while `key` was unsettled. A write that landed
    // meanwhile wins over the loaded record.
    fn finish_load(&mut self, key: &RawKey, loaded: Option<(AnyModel, usize)>) -> Option<Slot> {
        let written = self.loading.remove(key).unwrap_or(true);
        let loaded = loaded.map(|(model, size)| Slot::Present { model, size });

        if written {
            return match self.entries.peek(key) {
                Some(slot) if slot.is_settled() => Some(slot.clone()),
                _ => loaded,
            };
        }

        match loaded {
            Some(slot) => {
                self.install(key.clone(), slot.clone());
                Some(slot)
            }
            None => {
                if matches!(self.entries.peek(key), Some(Slot::Evicted)) {
                    self.remove(key);
                }
                None
            }
        }
    }
}

///
/// ModelCache
///
/// Size-bounded LRU of decoded records. Lookups share the lock, mutations
/// take it exclusively, and loads for one key run one at a time behind a
/// per-key gate. Generic over the lock family so single-threaded builds pay
/// no synchronization cost.
///

pub struct ModelCache<L: Locking = DefaultLocking> {
    state: L::RwLock<CacheState>,
    gates: L::Lock<HashMap<RawKey, Arc<L::Lock<()>>>>,
}

impl<L: Locking> ModelCache<L> {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self::with_max_markers(max_size, DEFAULT_MAX_MARKERS)
    }

    /// Cache with a byte budget and a bound on `Deleted`/`Evicted` markers.
    #[must_use]
    pub fn with_max_markers(max_size: usize, max_markers: usize) -> Self {
        Self {
            state: SharedLock::new(CacheState::new(max_size, max_markers)),
            gates: ExclusiveLock::new(HashMap::new()),
        }
    }

    // ─────────────────────────────────────────────
    // LOOKUPS
    // ─────────────────────────────────────────────

    /// Current state of `key`, without loading and without touching recency.
    #[must_use]
    pub fn get_entry<M: Model>(&self, key: &Key<M>) -> Entry<M> {
        self.state.read(|state| Self::peek(state, key.raw()))
    }

    #[must_use]
    pub fn get<M: Model>(&self, key: &Key<M>) -> Option<Arc<M>> {
        self.get_entry(key).into_model()
    }

    /// Several lookups answered from one consistent snapshot.
    #[must_use]
    pub fn get_entries<M: Model>(&self, keys: &[Key<M>]) -> Vec<Entry<M>> {
        self.state.read(|state| {
            keys.iter()
                .map(|key| Self::peek(state, key.raw()))
                .collect()
        })
    }

    /// Return the cached `Present` or `Deleted` entry for `key`, or run
    /// `loader` and cache what it finds. At most one loader runs per key at a
    /// time; waiters see the winner's result. `Ok(None)` from the loader
    /// leaves the key `Absent`. Loader errors change nothing.
    ///
    /// A write to `key` that lands while the loader runs wins: its entry is
    /// returned and the loaded record is not cached.
    ///
    /// The loader must not call back into this cache for the same key.
    pub fn get_or_retrieve_entry<M, E, F>(&self, key: &Key<M>, loader: F) -> Result<Entry<M>, E>
    where
        M: Model,
        F: FnOnce() -> Result<Option<SizedModel<M>>, E>,
    {
        let slot = self.retrieve_slot(key.raw(), || {
            Ok(loader()?.map(|sized| {
                let model: AnyModel = Arc::new(sized.model);
                (model, sized.size)
            }))
        })?;

        Ok(slot.map_or(Entry::Absent, Slot::into_entry))
    }

    pub fn get_or_retrieve<M, E, F>(&self, key: &Key<M>, loader: F) -> Result<Option<Arc<M>>, E>
    where
        M: Model,
        F: FnOnce() -> Result<Option<SizedModel<M>>, E>,
    {
        Ok(self.get_or_retrieve_entry(key, loader)?.into_model())
    }

    // Type-erased retrieval for callers that only know the key's type tag.
    pub(crate) fn get_or_retrieve_any<E, F>(
        &self,
        key: &RawKey,
        loader: F,
    ) -> Result<Option<AnyModel>, E>
    where
        F: FnOnce() -> Result<Option<(AnyModel, usize)>, E>,
    {
        Ok(self.retrieve_slot(key, loader)?.and_then(Slot::into_any))
    }

    // ─────────────────────────────────────────────
    // MUTATIONS
    // ─────────────────────────────────────────────

    pub fn put<M: Model>(&self, key: &Key<M>, model: M, size: usize) {
        self.put_shared(key, Arc::new(model), size);
    }

    pub fn put_sized<M: Model>(&self, key: &Key<M>, sized: SizedModel<M>) {
        self.put(key, sized.model, sized.size);
    }

    pub fn put_shared<M: Model>(&self, key: &Key<M>, model: Arc<M>, size: usize) {
        let model: AnyModel = model;
        self.write_slot(key.raw(), Slot::Present { model, size });
    }

    /// Record `key` as removed from the store; returns the replaced entry.
    pub fn delete<M: Model>(&self, key: &Key<M>) -> Entry<M> {
        self.write_slot(key.raw(), Slot::Deleted)
            .map_or(Entry::Absent, Slot::into_entry)
    }

    /// Drop the record for `key` from memory; returns the replaced entry.
    pub fn evict<M: Model>(&self, key: &Key<M>) -> Entry<M> {
        self.write_slot(key.raw(), Slot::Evicted)
            .map_or(Entry::Absent, Slot::into_entry)
    }

    pub fn clear(&self) {
        self.state.write(CacheState::clear);
    }

    /// Record mutations on a `CacheBatch` and apply them atomically if `f`
    /// returns `Ok`. On `Err` nothing is applied.
    pub fn batch<R, E>(&self, f: impl FnOnce(&mut CacheBatch) -> Result<R, E>) -> Result<R, E> {
        let mut batch = CacheBatch::default();
        let out = f(&mut batch)?;
        self.apply(batch);

        Ok(out)
    }

    pub(crate) fn apply(&self, batch: CacheBatch) {
        if batch.is_empty() {
            return;
        }

        self.state.write(|state| {
            for op in batch.into_ops() {
                match op {
                    BatchOp::Write { key, slot } => {
                        state.install(key, slot);
                    }
                    BatchOp::Clear => state.clear(),
                }
            }
        });
    }

    // ─────────────────────────────────────────────
    // INTROSPECTION
    // ─────────────────────────────────────────────

    /// Sum of the sizes of `Present` entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.state.read(|state| state.size)
    }

    /// Number of keys with any entry, markers included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.read(|state| state.entries.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn max_size(&self) -> usize {
        self.state.read(|state| state.max_size)
    }

    #[must_use]
    pub fn max_markers(&self) -> usize {
        self.state.read(|state| state.max_markers)
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.state.read(|state| state.stats)
    }

    // ─────────────────────────────────────────────
    // INTERNALS
    // ─────────────────────────────────────────────

    fn peek<M: Model>(state: &CacheState, key: &RawKey) -> Entry<M> {
        state
            .entries
            .peek(key)
            .cloned()
            .map_or(Entry::Absent, Slot::into_entry)
    }

    fn write_slot(&self, key: &RawKey, slot: Slot) -> Option<Slot> {
        self.state.write(|state| state.install(key.clone(), slot))
    }

    // Settled hit: promote and count it.
    fn settled(&self, key: &RawKey) -> Option<Slot> {
        self.state.write(|state| {
            let slot = state.entries.get(key).filter(|slot| slot.is_settled()).cloned();
            if slot.is_some() {
                state.stats.hits += 1;
            }
            slot
        })
    }

    fn retrieve_slot<E, F>(&self, key: &RawKey, loader: F) -> Result<Option<Slot>, E>
    where
        F: FnOnce() -> Result<Option<(AnyModel, usize)>, E>,
    {
        if let Some(slot) = self.settled(key) {
            return Ok(Some(slot));
        }

        let gate = LoadGate::<L>::acquire(&self.gates, key);
        gate.lock.with_lock(|()| {
            // A concurrent loader may have finished while we waited.
            if let Some(slot) = self.settled(key) {
                return Ok(Some(slot));
            }

            self.state.write(|state| {
                state.stats.misses += 1;
                state.stats.loads += 1;
                state.loading.insert(key.clone(), false);
            });

            match loader() {
                Ok(loaded) => Ok(self.state.write(|state| state.finish_load(key, loaded))),
                Err(err) => {
                    self.state.write(|state| state.loading.remove(key));
                    Err(err)
                }
            }
        })
    }
}

impl<L: Locking> Default for ModelCache<L> {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHE_SIZE)
    }
}

impl<L: Locking> Debug for ModelCache<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.state.read(|state| {
            f.debug_struct("ModelCache")
                .field("locking", &L::NAME)
                .field("len", &state.entries.len())
                .field("size", &state.size)
                .field("markers", &state.markers)
                .field("max_size", &state.max_size)
                .field("stats", &state.stats)
                .finish()
        })
    }
}

///
/// LoadGate
///
/// Shared handle on one key's load lock. The last holder removes the map
/// entry on drop, including when the loader panics.
///

struct LoadGate<'a, L: Locking> {
    gates: &'a L::Lock<HashMap<RawKey, Arc<L::Lock<()>>>>,
    key: &'a RawKey,
    lock: Arc<L::Lock<()>>,
}

impl<'a, L: Locking> LoadGate<'a, L> {
    fn acquire(gates: &'a L::Lock<HashMap<RawKey, Arc<L::Lock<()>>>>, key: &'a RawKey) -> Self {
        let lock = gates.with_lock(|gates| {
            Arc::clone(
                gates
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(ExclusiveLock::new(()))),
            )
        });

        Self { gates, key, lock }
    }
}

impl<L: Locking> Drop for LoadGate<'_, L> {
    fn drop(&mut self) {
        // Clones only happen under the map lock, so the count is stable here.
        self.gates.with_lock(|gates| {
            if Arc::strong_count(&self.lock) == 2 {
                gates.remove(self.key);
            }
        });
    }
}
