//! Fetch coordination: one entry point per logical query.
//!
//! A [`Coordinator`] owns the request state of one call site. Loading it
//! claims the query's fetch key; whoever wins the claim issues the network
//! call on a spawned task, everyone else awaits that same call. The read
//! view is always derived from the shared cache, never from the response.

use std::sync::Arc;

use dojo_api_types::Game;
use metrics::counter;
use tracing::{debug, info, warn};

use crate::application::error::FetchError;
use crate::application::pagination::{Paginator, SearchFn, search_endpoint};
use crate::application::query::{
    ClubQuery, ClubsQuery, EntityQuery, GamesQuery, ScoreboardQuery, UserQuery, UsersQuery, View,
    fetch_entities,
};
use crate::application::request::RequestState;
use crate::application::transport::{Connectivity, Transport};
use crate::cache::{Claim, EntityCache, FetchTicket, InFlightFetch};
use crate::domain::entities::CachedEntity;

pub const METRIC_FETCH_STARTED: &str = "dojo_fetch_started_total";
pub const METRIC_FETCH_JOINED: &str = "dojo_fetch_joined_total";
pub const METRIC_FETCH_FAILED: &str = "dojo_fetch_failed_total";
pub const METRIC_OFFLINE_FALLBACK: &str = "dojo_offline_fallback_total";

const DEFAULT_MAX_PAGES: u32 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    /// Upper bound on pages followed when draining a listing.
    pub max_pages: u32,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// Everything a coordinator needs, shared by handle.
///
/// Clones share one cache, so coordinators built from any clone observe the
/// same entities and the same in-flight fetches.
#[derive(Clone)]
pub struct DataLayer {
    cache: Arc<EntityCache>,
    transport: Arc<dyn Transport>,
    connectivity: Arc<dyn Connectivity>,
    options: FetchOptions,
}

impl DataLayer {
    pub fn new(
        cache: Arc<EntityCache>,
        transport: Arc<dyn Transport>,
        connectivity: Arc<dyn Connectivity>,
    ) -> Self {
        Self {
            cache,
            transport,
            connectivity,
            options: FetchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: FetchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn cache(&self) -> &Arc<EntityCache> {
        &self.cache
    }

    pub fn options(&self) -> FetchOptions {
        self.options
    }

    pub fn coordinator<Q: EntityQuery>(&self, query: Q) -> Coordinator<Q> {
        Coordinator {
            layer: self.clone(),
            query,
            request: RequestState::new(),
        }
    }

    pub fn users(&self) -> Coordinator<UsersQuery> {
        self.coordinator(UsersQuery)
    }

    pub fn user(&self, username: impl Into<String>) -> Coordinator<UserQuery> {
        self.coordinator(UserQuery {
            username: username.into(),
        })
    }

    pub fn scoreboard(&self, cohort: Option<String>) -> Coordinator<ScoreboardQuery> {
        self.coordinator(ScoreboardQuery { cohort })
    }

    pub fn games(&self, cohort: impl Into<String>) -> Coordinator<GamesQuery> {
        self.coordinator(GamesQuery {
            cohort: cohort.into(),
        })
    }

    pub fn clubs(&self) -> Coordinator<ClubsQuery> {
        self.coordinator(ClubsQuery)
    }

    pub fn club(&self, id: impl Into<String>) -> Coordinator<ClubQuery> {
        self.coordinator(ClubQuery { id: id.into() })
    }

    /// Search function over one cohort's games, for use with a [`Paginator`].
    pub fn game_search(&self, cohort: impl Into<String>) -> SearchFn<Game> {
        let query = GamesQuery {
            cohort: cohort.into(),
        };
        search_endpoint(Arc::clone(&self.transport), query.request())
    }

    /// Paginator already searching one cohort's games, positioned at `page`.
    pub fn game_pages(
        &self,
        cohort: impl Into<String>,
        page: usize,
        page_size: usize,
    ) -> Paginator<Game> {
        let mut paginator = Paginator::new(0, page_size).with_max_pages(self.options.max_pages);
        paginator.on_search(self.game_search(cohort));
        paginator.set_page(page);
        paginator
    }
}

/// Result of a load: the derived view plus the call site's request state.
#[derive(Debug, Clone)]
pub struct Loaded<T> {
    pub data: T,
    pub request: RequestState,
}

pub struct Coordinator<Q: EntityQuery> {
    layer: DataLayer,
    query: Q,
    request: RequestState,
}

impl<Q: EntityQuery> Coordinator<Q> {
    pub fn query(&self) -> &Q {
        &self.query
    }

    pub fn request(&self) -> &RequestState {
        &self.request
    }

    /// Current view from the cache. Never touches the network.
    pub fn data(&self) -> Q::Output {
        self.query.select(self.layer.cache.table::<Q::Entity>())
    }

    /// Forget this call site's request so the next [`Coordinator::load`] may
    /// fetch again. Retrying a failed load requires this.
    pub fn reset(&mut self) {
        self.request.reset();
    }

    /// Make sure the query has been fetched once, then return its view.
    ///
    /// Returns immediately when this call site has already sent its request
    /// or when the key is already fetched. Otherwise either leads a new
    /// fetch or joins the one in flight.
    pub async fn load(&mut self) -> Loaded<Q::Output> {
        if self.request.is_sent() {
            return self.snapshot();
        }

        let key = self.query.fetch_key();
        let kind = Q::Entity::KIND;
        let waiter = match self.layer.cache.table::<Q::Entity>().fetch_keys().claim(&key) {
            Claim::Fetched => {
                debug!(table = kind, key = %key, "Fetch key already satisfied");
                return self.snapshot();
            }
            Claim::Join(waiter) => {
                debug!(
                    table = kind,
                    key = %key,
                    generation = waiter.generation(),
                    "Joining in-flight fetch"
                );
                counter!(METRIC_FETCH_JOINED, "table" => kind).increment(1);
                waiter
            }
            Claim::Lead(ticket) => {
                info!(
                    table = kind,
                    key = %key,
                    generation = ticket.generation(),
                    path = %self.query.request().path(),
                    "Starting fetch"
                );
                counter!(METRIC_FETCH_STARTED, "table" => kind).increment(1);
                self.spawn_fetch(ticket)
            }
        };

        self.request.on_start();
        let outcome = waiter.wait().await;
        self.settle(outcome);
        self.snapshot()
    }

    fn spawn_fetch(&self, ticket: FetchTicket) -> InFlightFetch {
        let waiter = ticket.waiter();
        let cache = Arc::clone(&self.layer.cache);
        let transport = Arc::clone(&self.layer.transport);
        let request = self.query.request();
        let shape = self.query.shape();
        let max_pages = self.layer.options.max_pages;

        tokio::spawn(async move {
            let kind = Q::Entity::KIND;
            let outcome =
                fetch_entities::<Q::Entity>(transport.as_ref(), request, shape, max_pages)
                    .await
                    .map(|entities| {
                        cache.table::<Q::Entity>().put_many(entities);
                    });

            if let Err(error) = &outcome {
                warn!(table = kind, key = %ticket.key(), error = %error, "Fetch failed");
                counter!(METRIC_FETCH_FAILED, "table" => kind).increment(1);
            }
            ticket.complete(outcome);
        });

        waiter
    }

    fn settle(&mut self, outcome: Result<(), FetchError>) {
        let error = match outcome {
            Ok(()) => {
                self.request.on_success(());
                return;
            }
            Err(error) => error,
        };

        let offline = !self.layer.connectivity.is_online();
        if offline && !self.data().is_empty_view() {
            warn!(
                table = Q::Entity::KIND,
                key = %self.query.fetch_key(),
                error = %error,
                "Offline; serving cached data"
            );
            counter!(METRIC_OFFLINE_FALLBACK, "table" => Q::Entity::KIND).increment(1);
            self.request.on_success(());
        } else {
            self.request.on_failure(error);
        }
    }

    fn snapshot(&self) -> Loaded<Q::Output> {
        Loaded {
            data: self.data(),
            request: self.request.clone(),
        }
    }
}
