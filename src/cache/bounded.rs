use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
    time::Duration,
};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::persist::{from_millis, to_millis, Envelope, OrderedEntries, OrderedMap, PersistMode};
use crate::error::StoreError;
use crate::storage::KeyValueStore;

/// Quiet period after the last push before a persistent cache is written out.
pub const DEFAULT_FLUSH_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    inserted_at: DateTime<Utc>,
}

struct State<V> {
    /// Keys, oldest first
    order: VecDeque<String>,
    entries: HashMap<String, Entry<V>>,
    pending_flush: Option<JoinHandle<()>>,
    flush_generation: u64,
}

impl<V> State<V> {
    fn empty() -> Self {
        Self {
            order: VecDeque::new(),
            entries: HashMap::new(),
            pending_flush: None,
            flush_generation: 0,
        }
    }

    fn detach(&mut self, key: &str) {
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }

    fn upsert(&mut self, key: String, value: V, inserted_at: DateTime<Utc>) {
        if self.entries.contains_key(&key) {
            self.detach(&key);
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, Entry { value, inserted_at });
    }

    fn evict_overflow(&mut self, capacity: usize) {
        while self.order.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
                debug!("Cache full, evicted {}", oldest);
            }
        }
    }
}

struct Persistence {
    store: Arc<dyn KeyValueStore>,
    name: String,
    mode: PersistMode,
    delay: Duration,
}

struct Shared<V> {
    state: Mutex<State<V>>,
    capacity: usize,
    ttl: Option<Duration>,
    persistence: Option<Persistence>,
}

/// Fixed-capacity, insertion-ordered cache with optional TTL and persistence.
///
/// Eviction is FIFO on push order: pushing an existing key moves it to the
/// newest position (unless `no_reorder` is set), and once the cache holds
/// more than `capacity` keys the oldest one is dropped. Expired entries are
/// never purged proactively; they stay in place, invisible to [`has`] and
/// [`get`], until they are overwritten or evicted.
///
/// Clones share the same underlying storage, so one cache can be handed to
/// every concurrent lookup of an aggregation cycle. The internal lock is
/// never held across an `.await`.
///
/// [`has`]: BoundedCache::has
/// [`get`]: BoundedCache::get
pub struct BoundedCache<V> {
    inner: Arc<Shared<V>>,
}

impl<V> Clone for BoundedCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> BoundedCache<V>
where
    V: Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None, Vec::new(), None)
    }

    pub fn with_ttl(capacity: usize, ttl: Duration) -> Self {
        Self::build(capacity, Some(ttl), Vec::new(), None)
    }

    /// Builds a cache pre-seeded with `seed` (oldest first). Only the newest
    /// `capacity` entries are kept.
    pub fn from_entries(capacity: usize, ttl: Option<Duration>, seed: Vec<(String, V)>) -> Self {
        let now = Utc::now();
        let seed = seed.into_iter().map(|(k, v)| (k, v, now)).collect();
        Self::build(capacity, ttl, seed, None)
    }

    /// Rehydrates a map-mode cache from `store` and keeps it persisted there
    /// under `name`. A missing or unreadable entry starts the cache empty.
    pub async fn open_map(
        capacity: usize,
        ttl: Option<Duration>,
        store: Arc<dyn KeyValueStore>,
        name: &str,
    ) -> Self {
        let seed = match store.load(name).await {
            Ok(Some(bytes)) => match decode_map::<V>(&bytes, ttl.is_some()) {
                Ok(seed) => seed,
                Err(e) => {
                    warn!("⚠️ Discarding unreadable cache '{}': {}", name, e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("⚠️ Could not load cache '{}': {}", name, e);
                Vec::new()
            }
        };

        debug!("Cache '{}' rehydrated with {} entries", name, seed.len());
        Self::build(
            capacity,
            ttl,
            seed,
            Some(Persistence {
                store,
                name: name.to_string(),
                mode: PersistMode::Map,
                delay: DEFAULT_FLUSH_DELAY,
            }),
        )
    }

    fn build(
        capacity: usize,
        ttl: Option<Duration>,
        seed: Vec<(String, V, DateTime<Utc>)>,
        persistence: Option<Persistence>,
    ) -> Self {
        let mut state = State::empty();
        let skip = seed.len().saturating_sub(capacity);
        for (key, value, inserted_at) in seed.into_iter().skip(skip) {
            state.upsert(key, value, inserted_at);
        }
        // Duplicate keys in the seed can leave us short, never over
        state.evict_overflow(capacity);

        Self {
            inner: Arc::new(Shared {
                state: Mutex::new(state),
                capacity,
                ttl,
                persistence,
            }),
        }
    }

    /// True if `key` is present and, when a TTL is configured, younger than it.
    pub fn has(&self, key: &str) -> bool {
        let state = self.inner.state.lock();
        state
            .entries
            .get(key)
            .is_some_and(|entry| self.is_live(entry, Utc::now()))
    }

    /// The stored value, or `None` whenever [`has`](Self::has) would be false.
    pub fn get(&self, key: &str) -> Option<V> {
        let state = self.inner.state.lock();
        let now = Utc::now();
        state
            .entries
            .get(key)
            .filter(|entry| self.is_live(entry, now))
            .map(|entry| entry.value.clone())
    }

    /// Inserts or refreshes `key`.
    ///
    /// With `no_reorder` set, an existing key keeps both its value and its
    /// position. Otherwise the key moves to the newest position with the new
    /// value and a fresh timestamp.
    pub fn push(&self, key: impl Into<String>, value: V, no_reorder: bool) {
        let key = key.into();
        let mut state = self.inner.state.lock();

        if no_reorder && state.entries.contains_key(&key) {
            return;
        }

        state.upsert(key, value, Utc::now());
        state.evict_overflow(self.inner.capacity);
        self.arm_flush(&mut state);
    }

    /// Number of physically stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.inner.state.lock().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    /// Stored keys, oldest first.
    pub fn keys(&self) -> Vec<String> {
        self.inner.state.lock().order.iter().cloned().collect()
    }

    /// Writes the cache out now, cancelling any pending delayed write.
    ///
    /// Meant for shutdown; a no-op for caches without persistence.
    pub async fn flush(&self) -> Result<(), StoreError> {
        if self.inner.persistence.is_none() {
            return Ok(());
        }
        if let Some(task) = self.inner.state.lock().pending_flush.take() {
            task.abort();
        }
        self.write_snapshot().await
    }

    fn is_live(&self, entry: &Entry<V>, now: DateTime<Utc>) -> bool {
        match self.inner.ttl {
            None => true,
            Some(ttl) => {
                // A timestamp from the future (clock skew) counts as brand new
                let age = (now - entry.inserted_at).to_std().unwrap_or(Duration::ZERO);
                age < ttl
            }
        }
    }

    fn arm_flush(&self, state: &mut State<V>) {
        let Some(persistence) = &self.inner.persistence else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime available, '{}' will be written on flush", persistence.name);
            return;
        };

        state.flush_generation += 1;
        let generation = state.flush_generation;
        let delay = persistence.delay;
        let cache = self.clone();
        let task = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            cache.scheduled_flush(generation).await;
        });

        if let Some(previous) = state.pending_flush.replace(task) {
            previous.abort();
        }
    }

    async fn scheduled_flush(&self, generation: u64) {
        match self.write_snapshot().await {
            Ok(()) => {
                let mut state = self.inner.state.lock();
                if state.flush_generation == generation {
                    state.pending_flush = None;
                }
            }
            Err(e) => {
                let name = self.inner.persistence.as_ref().map_or("", |p| p.name.as_str());
                error!("❌ Failed to persist cache '{}': {}", name, e);
            }
        }
    }

    async fn write_snapshot(&self) -> Result<(), StoreError> {
        let Some(persistence) = &self.inner.persistence else {
            return Ok(());
        };
        let bytes = {
            let state = self.inner.state.lock();
            self.encode(&state, persistence.mode)?
        };
        persistence.store.save(&persistence.name, &bytes).await
    }

    fn encode(&self, state: &State<V>, mode: PersistMode) -> Result<Vec<u8>, serde_json::Error> {
        match mode {
            PersistMode::KeyList => serde_json::to_vec(&state.order),
            PersistMode::Map if self.inner.ttl.is_some() => {
                let pairs: Vec<_> = state
                    .order
                    .iter()
                    .filter_map(|key| {
                        state.entries.get(key).map(|entry| {
                            let envelope = Envelope {
                                value: &entry.value,
                                inserted_at: to_millis(entry.inserted_at),
                            };
                            (key.as_str(), envelope)
                        })
                    })
                    .collect();
                serde_json::to_vec(&OrderedEntries(&pairs))
            }
            PersistMode::Map => {
                let pairs: Vec<_> = state
                    .order
                    .iter()
                    .filter_map(|key| state.entries.get(key).map(|entry| (key.as_str(), &entry.value)))
                    .collect();
                serde_json::to_vec(&OrderedEntries(&pairs))
            }
        }
    }
}

impl BoundedCache<bool> {
    /// Builds a key-only cache from an ordered key list (oldest first).
    pub fn from_keys(capacity: usize, keys: Vec<String>) -> Self {
        Self::from_entries(capacity, None, keys.into_iter().map(|k| (k, true)).collect())
    }

    /// Rehydrates a key-list cache from `store`, persisting it back there.
    pub async fn open_key_list(capacity: usize, store: Arc<dyn KeyValueStore>, name: &str) -> Self {
        let keys: Vec<String> = match store.load(name).await {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                warn!("⚠️ Discarding unreadable key list '{}': {}", name, e);
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("⚠️ Could not load key list '{}': {}", name, e);
                Vec::new()
            }
        };

        let now = Utc::now();
        Self::build(
            capacity,
            None,
            keys.into_iter().map(|k| (k, true, now)).collect(),
            Some(Persistence {
                store,
                name: name.to_string(),
                mode: PersistMode::KeyList,
                delay: DEFAULT_FLUSH_DELAY,
            }),
        )
    }
}

fn decode_map<V: DeserializeOwned>(
    bytes: &[u8],
    with_ttl: bool,
) -> Result<Vec<(String, V, DateTime<Utc>)>, serde_json::Error> {
    if with_ttl {
        let OrderedMap(entries) = serde_json::from_slice::<OrderedMap<Envelope<V>>>(bytes)?;
        Ok(entries
            .into_iter()
            .map(|(k, e)| (k, e.value, from_millis(e.inserted_at)))
            .collect())
    } else {
        let OrderedMap(entries) = serde_json::from_slice::<OrderedMap<V>>(bytes)?;
        let now = Utc::now();
        Ok(entries.into_iter().map(|(k, v)| (k, v, now)).collect())
    }
}
