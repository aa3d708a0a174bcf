//! Logical queries over the entity cache.
//!
//! A query names its fetch key, the API request that satisfies it, and the
//! selector that derives its read view from the cache. The view is computed
//! from whatever the cache holds right now, so previously fetched data is
//! available before (and regardless of) any network call.

use std::cmp::Ordering;

use dojo_api_types::{Listing, Page};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::application::error::FetchError;
use crate::application::transport::{ApiRequest, Transport};
use crate::cache::{EntityTable, FetchKey};
use crate::domain::entities::{CachedEntity, Club, Game, User};

/// A derived read value that can be empty.
pub trait View {
    fn is_empty_view(&self) -> bool;
}

impl<T> View for Vec<T> {
    fn is_empty_view(&self) -> bool {
        self.is_empty()
    }
}

impl<T> View for Option<T> {
    fn is_empty_view(&self) -> bool {
        self.is_none()
    }
}

/// How the endpoint behind a query answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// One entity object.
    Single,
    /// A flat array or a paged envelope; pages are followed to the end.
    Listing,
}

pub trait EntityQuery: Send + Sync + 'static {
    type Entity: CachedEntity;
    type Output: View;

    fn fetch_key(&self) -> FetchKey;

    fn request(&self) -> ApiRequest;

    fn shape(&self) -> ResponseShape {
        ResponseShape::Listing
    }

    fn select(&self, table: &EntityTable<Self::Entity>) -> Self::Output;
}

/// Every cached user, by username.
#[derive(Debug, Clone, Default)]
pub struct UsersQuery;

impl EntityQuery for UsersQuery {
    type Entity = User;
    type Output = Vec<User>;

    fn fetch_key(&self) -> FetchKey {
        FetchKey::all_users()
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::new(["users"])
    }

    fn select(&self, table: &EntityTable<User>) -> Vec<User> {
        let mut users = table.list();
        users.sort_by(|a, b| a.username.cmp(&b.username));
        users
    }
}

#[derive(Debug, Clone)]
pub struct UserQuery {
    pub username: String,
}

impl EntityQuery for UserQuery {
    type Entity = User;
    type Output = Option<User>;

    fn fetch_key(&self) -> FetchKey {
        FetchKey::user(&self.username)
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::new(["public", "user", self.username.as_str()])
    }

    fn shape(&self) -> ResponseShape {
        ResponseShape::Single
    }

    fn select(&self, table: &EntityTable<User>) -> Option<User> {
        table.get(&self.username)
    }
}

/// Users of one cohort (or all cohorts), highest rating first.
#[derive(Debug, Clone, Default)]
pub struct ScoreboardQuery {
    pub cohort: Option<String>,
}

impl EntityQuery for ScoreboardQuery {
    type Entity = User;
    type Output = Vec<User>;

    fn fetch_key(&self) -> FetchKey {
        FetchKey::scoreboard(self.cohort.as_deref())
    }

    fn request(&self) -> ApiRequest {
        match &self.cohort {
            Some(cohort) => ApiRequest::new(["scoreboard", cohort.as_str()]),
            None => ApiRequest::new(["scoreboard"]),
        }
    }

    fn select(&self, table: &EntityTable<User>) -> Vec<User> {
        let mut users = match &self.cohort {
            Some(cohort) => table.filter(|user| &user.dojo_cohort == cohort),
            None => table.list(),
        };
        users.sort_by(|a, b| {
            b.rating
                .partial_cmp(&a.rating)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.username.cmp(&b.username))
        });
        users
    }
}

/// Games of one cohort, newest first.
#[derive(Debug, Clone)]
pub struct GamesQuery {
    pub cohort: String,
}

impl EntityQuery for GamesQuery {
    type Entity = Game;
    type Output = Vec<Game>;

    fn fetch_key(&self) -> FetchKey {
        FetchKey::games(&self.cohort)
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::new(["games", self.cohort.as_str()])
    }

    fn select(&self, table: &EntityTable<Game>) -> Vec<Game> {
        let mut games = table.filter(|game| game.cohort == self.cohort);
        games.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.id.cmp(&b.id)));
        games
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClubsQuery;

impl EntityQuery for ClubsQuery {
    type Entity = Club;
    type Output = Vec<Club>;

    fn fetch_key(&self) -> FetchKey {
        FetchKey::all_clubs()
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::new(["public", "clubs"])
    }

    fn select(&self, table: &EntityTable<Club>) -> Vec<Club> {
        let mut clubs = table.list();
        clubs.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        clubs
    }
}

#[derive(Debug, Clone)]
pub struct ClubQuery {
    pub id: String,
}

impl EntityQuery for ClubQuery {
    type Entity = Club;
    type Output = Option<Club>;

    fn fetch_key(&self) -> FetchKey {
        FetchKey::club(&self.id)
    }

    fn request(&self) -> ApiRequest {
        ApiRequest::new(["public", "clubs", self.id.as_str()])
    }

    fn shape(&self) -> ResponseShape {
        ResponseShape::Single
    }

    fn select(&self, table: &EntityTable<Club>) -> Option<Club> {
        table.get(&self.id)
    }
}

pub(crate) fn decode_page<E: DeserializeOwned>(
    entity: &'static str,
    value: Value,
) -> Result<Page<E>, FetchError> {
    serde_json::from_value::<Listing<E>>(value)
        .map(Listing::into_page)
        .map_err(|err| FetchError::decode(entity, err.to_string()))
}

/// Run a query's request to completion and return every entity it produced.
///
/// Listings are drained by following the cursor, stopping after `max_pages`.
pub(crate) async fn fetch_entities<E: CachedEntity>(
    transport: &dyn Transport,
    request: ApiRequest,
    shape: ResponseShape,
    max_pages: u32,
) -> Result<Vec<E>, FetchError> {
    match shape {
        ResponseShape::Single => {
            let value = transport.call(request).await?;
            let entity = serde_json::from_value::<E>(value)
                .map_err(|err| FetchError::decode(E::KIND, err.to_string()))?;
            Ok(vec![entity])
        }
        ResponseShape::Listing => {
            let mut entities = Vec::new();
            let mut cursor = None;
            let mut pages = 0;
            loop {
                let value = transport
                    .call(request.clone().with_cursor(cursor.as_ref()))
                    .await?;
                let page = decode_page::<E>(E::KIND, value)?;
                pages += 1;
                entities.extend(page.items);

                match page.cursor {
                    None => break,
                    Some(_) if pages >= max_pages => {
                        warn!(
                            table = E::KIND,
                            path = %request.path(),
                            max_pages,
                            "Listing still has pages after limit; keeping partial result"
                        );
                        break;
                    }
                    next => cursor = next,
                }
            }
            Ok(entities)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::EntityCache;

    fn user(username: &str, cohort: &str, rating: Option<f64>) -> User {
        User {
            username: username.to_string(),
            display_name: username.to_string(),
            dojo_cohort: cohort.to_string(),
            rating,
        }
    }

    #[test]
    fn scoreboard_filters_by_cohort_and_ranks_by_rating() {
        let cache = EntityCache::new();
        cache.users().put_many([
            user("alice", "1500-1600", Some(1520.0)),
            user("bob", "1500-1600", Some(1580.0)),
            user("carol", "1600-1700", Some(1650.0)),
            user("dave", "1500-1600", None),
        ]);

        let query = ScoreboardQuery {
            cohort: Some("1500-1600".to_string()),
        };
        let ranked: Vec<_> = query
            .select(cache.users())
            .into_iter()
            .map(|u| u.username)
            .collect();

        assert_eq!(ranked, vec!["bob", "alice", "dave"]);
        assert_eq!(query.fetch_key(), FetchKey::scoreboard(Some("1500-1600")));
    }

    #[test]
    fn scoreboard_without_cohort_covers_everyone() {
        let cache = EntityCache::new();
        cache.users().put_many([
            user("alice", "1500-1600", Some(1520.0)),
            user("carol", "1600-1700", Some(1650.0)),
        ]);

        let query = ScoreboardQuery::default();
        assert_eq!(query.select(cache.users()).len(), 2);
        assert_eq!(query.request().path(), "/scoreboard");
    }

    #[test]
    fn single_entity_views_are_empty_until_cached() {
        let cache = EntityCache::new();
        let query = UserQuery {
            username: "alice".to_string(),
        };

        assert!(query.select(cache.users()).is_empty_view());
        cache.users().put(user("alice", "1500-1600", None));
        assert!(!query.select(cache.users()).is_empty_view());
    }

    #[test]
    fn decode_page_rejects_unexpected_shapes() {
        let err = decode_page::<Club>("clubs", serde_json::json!({"unexpected": true}))
            .expect_err("object without items is not a listing");
        assert!(matches!(err, FetchError::Decode { entity: "clubs", .. }));
    }
}
