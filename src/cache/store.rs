use super::{Cache, CacheError, FieldSelector, IndexFn, IndexName};
use crate::object::{DynamicObject, GroupVersionKind, ObjectKey};
use crate::prelude::debug;
use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

// index value -> keys of the objects producing it
type Index = HashMap<String, BTreeSet<ObjectKey>>;

#[derive(Default)]
struct KindStore {
    objects: HashMap<ObjectKey, Arc<DynamicObject>>,
    indexers: HashMap<String, IndexFn>,
    indices: HashMap<String, Index>,
}

impl KindStore {
    /// Runs every indexer over `object`. Pure: touches no state, so a panicking
    /// extractor leaves the store unchanged.
    fn index_keys(&self, object: &DynamicObject) -> Vec<(String, Vec<String>)> {
        self.indexers
            .iter()
            .map(|(name, extractor)| (name.clone(), extractor(object)))
            .collect()
    }

    fn insert_entries(&mut self, key: &ObjectKey, entries: Vec<(String, Vec<String>)>) {
        for (index, values) in entries {
            let index = self.indices.entry(index).or_default();
            for value in values {
                index.entry(value).or_default().insert(key.clone());
            }
        }
    }

    fn remove_entries(&mut self, key: &ObjectKey, entries: Vec<(String, Vec<String>)>) {
        for (index, values) in entries {
            let Some(index) = self.indices.get_mut(&index) else {
                continue;
            };
            for value in values {
                if let Some(keys) = index.get_mut(&value) {
                    keys.remove(key);
                    if keys.is_empty() {
                        index.remove(&value);
                    }
                }
            }
        }
    }
}

/// Thread-safe, in-memory [`Cache`] with secondary indexes.
///
/// Objects are fed in with [`apply`](Self::apply) and [`remove`](Self::remove),
/// typically from a watch loop. Every index is updated under the same write
/// lock as the object itself, and readers receive `Arc` snapshots, so a
/// concurrent [`list`](Cache::list) never sees a partially indexed object.
///
/// Indexes must be registered before [`start`](Self::start) is called.
#[derive(Default)]
pub struct InMemoryCache {
    kinds: RwLock<HashMap<GroupVersionKind, KindStore>>,
    started: AtomicBool,
}

impl Debug for InMemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kinds = self.read();
        f.debug_struct("InMemoryCache")
            .field("kinds", &kinds.len())
            .field(
                "objects",
                &kinds.values().map(|s| s.objects.len()).sum::<usize>(),
            )
            .field("started", &self.is_started())
            .finish()
    }
}

impl InMemoryCache {
    /// Creates an empty, not yet started cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the cache as started. No further indexes can be registered.
    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
    }

    /// Returns `true` once [`start`](Self::start) has been called.
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    /// Inserts or replaces an object and refreshes its index entries.
    ///
    /// Returns the previously stored state, if any.
    ///
    /// # Panics
    ///
    /// Propagates a panic raised by any registered extractor. The store is left
    /// as it was before the call.
    pub fn apply(&self, gvk: &GroupVersionKind, object: DynamicObject) -> Option<Arc<DynamicObject>> {
        let key = object.key();
        let object = Arc::new(object);

        let mut kinds = self.write();
        let store = kinds.entry(gvk.clone()).or_default();

        let previous = store.objects.get(&key).cloned();
        let old_entries = previous.as_deref().map(|prev| store.index_keys(prev));
        let new_entries = store.index_keys(&object);

        if let Some(old_entries) = old_entries {
            store.remove_entries(&key, old_entries);
        }
        store.insert_entries(&key, new_entries);
        store.objects.insert(key, object);

        previous
    }

    /// Removes an object and its index entries, returning its last state.
    pub fn remove(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Option<Arc<DynamicObject>> {
        let mut kinds = self.write();
        let store = kinds.get_mut(gvk)?;

        let previous = store.objects.get(key).cloned()?;
        let entries = store.index_keys(&previous);
        store.remove_entries(key, entries);
        store.objects.remove(key);

        Some(previous)
    }

    /// Returns the stored object with the given key.
    pub fn get(&self, gvk: &GroupVersionKind, key: &ObjectKey) -> Option<Arc<DynamicObject>> {
        self.read()
            .get(gvk)
            .and_then(|store| store.objects.get(key).cloned())
    }

    /// Returns every stored object of a kind, ordered by key.
    pub fn list_all(&self, gvk: &GroupVersionKind) -> Vec<Arc<DynamicObject>> {
        let kinds = self.read();
        let Some(store) = kinds.get(gvk) else {
            return Vec::new();
        };

        let mut objects: Vec<_> = store.objects.values().cloned().collect();
        objects.sort_by(|a, b| a.key().cmp(&b.key()));
        objects
    }

    /// Returns `true` if an index with this name exists for the kind.
    pub fn has_index(&self, gvk: &GroupVersionKind, index: &str) -> bool {
        self.read()
            .get(gvk)
            .is_some_and(|store| store.indexers.contains_key(index))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<GroupVersionKind, KindStore>> {
        self.kinds.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<GroupVersionKind, KindStore>> {
        self.kinds.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Cache for InMemoryCache {
    fn index_field(
        &self,
        cancel: &CancellationToken,
        gvk: &GroupVersionKind,
        index: &IndexName,
        extractor: IndexFn,
    ) -> Result<(), CacheError> {
        if cancel.is_cancelled() {
            return Err(CacheError::Cancelled);
        }
        if self.is_started() {
            return Err(CacheError::AlreadyStarted);
        }

        let mut kinds = self.write();
        let store = kinds.entry(gvk.clone()).or_default();

        if store.indexers.contains_key(index.as_str()) {
            return Err(CacheError::IndexConflict {
                kind: gvk.clone(),
                index: index.to_string(),
            });
        }

        // Objects applied before registration are indexed right away.
        let mut built = Index::new();
        for (key, object) in &store.objects {
            for value in extractor(object) {
                built.entry(value).or_default().insert(key.clone());
            }
        }

        store.indexers.insert(index.to_string(), extractor);
        store.indices.insert(index.to_string(), built);

        debug!("Registered cache index: kind={}, index={}", gvk, index);
        Ok(())
    }

    fn list(
        &self,
        gvk: &GroupVersionKind,
        selector: &FieldSelector,
    ) -> Result<Vec<Arc<DynamicObject>>, CacheError> {
        let kinds = self.read();

        let index_not_found = || CacheError::IndexNotFound {
            kind: gvk.clone(),
            index: selector.field.clone(),
        };

        let store = kinds.get(gvk).ok_or_else(index_not_found)?;
        let index = store.indices.get(&selector.field).ok_or_else(index_not_found)?;

        let Some(keys) = index.get(&selector.value) else {
            return Ok(Vec::new());
        };

        Ok(keys
            .iter()
            .filter_map(|key| store.objects.get(key).cloned())
            .collect())
    }
}
