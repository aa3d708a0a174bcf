//! Entities held in the cache.

use serde::de::DeserializeOwned;

pub use dojo_api_types::{Club, Game, User};

use crate::cache::{EntityCache, EntityTable};

/// Anything the server identifies by a string id.
pub trait Identified {
    fn cache_id(&self) -> String;
}

/// An entity type with its own table in the [`EntityCache`].
pub trait CachedEntity: Identified + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Label used for the table in logs and metrics.
    const KIND: &'static str;

    fn table(cache: &EntityCache) -> &EntityTable<Self>;
}

impl Identified for User {
    fn cache_id(&self) -> String {
        self.username.clone()
    }
}

impl CachedEntity for User {
    const KIND: &'static str = "users";

    fn table(cache: &EntityCache) -> &EntityTable<Self> {
        cache.users()
    }
}

// Game ids are only unique within a cohort.
impl Identified for Game {
    fn cache_id(&self) -> String {
        format!("{}/{}", self.cohort, self.id)
    }
}

impl CachedEntity for Game {
    const KIND: &'static str = "games";

    fn table(cache: &EntityCache) -> &EntityTable<Self> {
        cache.games()
    }
}

impl Identified for Club {
    fn cache_id(&self) -> String {
        self.id.clone()
    }
}

impl CachedEntity for Club {
    const KIND: &'static str = "clubs";

    fn table(cache: &EntityCache) -> &EntityTable<Self> {
        cache.clubs()
    }
}
