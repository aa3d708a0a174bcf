//! Normalized entity storage.
//!
//! One table per entity type, keyed by entity id, each with its own fetch-key
//! state. Writes are upserts: the last write for an id wins, which doubles as
//! the refresh path when a query is fetched again after a reset. There is no
//! delete; the remote API is the system of record.

use std::collections::HashMap;
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use dojo_api_types::{Club, Game, User};
use tracing::debug;

use super::flights::FetchKeys;
use super::keys::FetchKey;
use super::lock::{read, write};
use crate::domain::entities::CachedEntity;

/// Cached entities of one type plus the fetch keys that populated them.
pub struct EntityTable<E> {
    entities: RwLock<HashMap<String, E>>,
    version: AtomicU64,
    fetch_keys: FetchKeys,
}

impl<E: CachedEntity> EntityTable<E> {
    pub fn new() -> Self {
        Self {
            entities: RwLock::new(HashMap::new()),
            version: AtomicU64::new(0),
            fetch_keys: FetchKeys::new(E::KIND),
        }
    }

    /// Pure lookup; never triggers a fetch.
    pub fn get(&self, id: &str) -> Option<E> {
        read(&self.entities, E::KIND, "get").get(id).cloned()
    }

    /// Snapshot of every cached entity, in unspecified order.
    pub fn list(&self) -> Vec<E> {
        read(&self.entities, E::KIND, "list")
            .values()
            .cloned()
            .collect()
    }

    pub fn filter<P>(&self, predicate: P) -> Vec<E>
    where
        P: Fn(&E) -> bool,
    {
        read(&self.entities, E::KIND, "filter")
            .values()
            .filter(|entity| predicate(entity))
            .cloned()
            .collect()
    }

    pub fn put(&self, entity: E) {
        write(&self.entities, E::KIND, "put").insert(entity.cache_id(), entity);
        self.version.fetch_add(1, Ordering::Release);
    }

    /// Upsert a batch under one write lock. Returns the number of entities written.
    pub fn put_many<I>(&self, entities: I) -> usize
    where
        I: IntoIterator<Item = E>,
    {
        let mut written = 0;
        {
            let mut guard = write(&self.entities, E::KIND, "put_many");
            for entity in entities {
                guard.insert(entity.cache_id(), entity);
                written += 1;
            }
        }
        self.version.fetch_add(1, Ordering::Release);
        debug!(table = E::KIND, written, "Merged entities into cache");
        written
    }

    pub fn len(&self) -> usize {
        read(&self.entities, E::KIND, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Monotonic write counter; derived views may memoize on it.
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::Acquire)
    }

    pub fn fetch_keys(&self) -> &FetchKeys {
        &self.fetch_keys
    }

    pub fn is_fetched(&self, key: &FetchKey) -> bool {
        self.fetch_keys.is_fetched(key)
    }

    pub fn mark_fetched(&self, key: &FetchKey) {
        self.fetch_keys.mark_fetched(key);
    }

    fn clear(&self) {
        write(&self.entities, E::KIND, "clear").clear();
        self.fetch_keys.clear();
        self.version.fetch_add(1, Ordering::Release);
    }
}

impl<E: CachedEntity> Default for EntityTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Process-wide entity cache, constructed explicitly and shared by handle.
///
/// Every coordinator built from the same `Arc<EntityCache>` sees the same
/// entities and the same fetch keys.
#[derive(Default)]
pub struct EntityCache {
    users: EntityTable<User>,
    games: EntityTable<Game>,
    clubs: EntityTable<Club>,
}

impl EntityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn users(&self) -> &EntityTable<User> {
        &self.users
    }

    pub fn games(&self) -> &EntityTable<Game> {
        &self.games
    }

    pub fn clubs(&self) -> &EntityTable<Club> {
        &self.clubs
    }

    pub fn table<E: CachedEntity>(&self) -> &EntityTable<E> {
        E::table(self)
    }

    /// Drop every entity and fetch key. In-flight fetches still complete, but
    /// their tickets no longer settle the new key state.
    pub fn reset(&self) {
        self.users.clear();
        self.games.clear();
        self.clubs.clear();
        debug!("Entity cache reset");
    }
}
