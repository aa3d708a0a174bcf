//! Cursor pagination accumulator.
//!
//! A [`Paginator`] grows an ordered list of items for one installed search,
//! fetching the next page only when the requested page is not yet covered.
//! Each search is tagged with a generation; page results issued under an
//! older generation are dropped when they arrive.

use std::collections::HashSet;
use std::sync::Arc;

use dojo_api_types::{Cursor, Page};
use futures::future::{BoxFuture, FutureExt};
use metrics::counter;
use tracing::{debug, warn};

use crate::application::coordinator::FetchOptions;
use crate::application::error::FetchError;
use crate::application::query::decode_page;
use crate::application::request::RequestState;
use crate::application::transport::{ApiRequest, Transport};
use crate::domain::entities::{CachedEntity, Identified};

pub const METRIC_PAGE_DISCARDED: &str = "dojo_page_discarded_total";

/// Fetch one page starting at the given cursor (`None` for the first page).
pub type SearchFn<E> =
    Arc<dyn Fn(Option<Cursor>) -> BoxFuture<'static, Result<Page<E>, FetchError>> + Send + Sync>;

/// Search function over a paged endpoint; the cursor travels as `startKey`.
pub fn search_endpoint<E: CachedEntity>(
    transport: Arc<dyn Transport>,
    request: ApiRequest,
) -> SearchFn<E> {
    Arc::new(move |cursor: Option<Cursor>| {
        let transport = Arc::clone(&transport);
        let request = request.clone().with_cursor(cursor.as_ref());
        async move {
            let value = transport.call(request).await?;
            decode_page::<E>(E::KIND, value)
        }
        .boxed()
    })
}

/// Where the next page starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing fetched yet for this search.
    Start,
    Next(Cursor),
    /// Terminal: the server reported no further pages.
    Exhausted,
}

/// A page fetch issued under one search generation.
pub struct PageFetch<E> {
    generation: u64,
    future: BoxFuture<'static, Result<Page<E>, FetchError>>,
}

impl<E> PageFetch<E> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn resolve(self) -> PageOutcome<E> {
        PageOutcome {
            generation: self.generation,
            result: self.future.await,
        }
    }
}

pub struct PageOutcome<E> {
    generation: u64,
    result: Result<Page<E>, FetchError>,
}

impl<E> PageOutcome<E> {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

pub struct Paginator<E> {
    search: Option<SearchFn<E>>,
    generation: u64,
    items: Vec<E>,
    seen: HashSet<String>,
    cursor: CursorState,
    page: usize,
    page_size: usize,
    request: RequestState,
    in_flight: bool,
    max_pages: u32,
}

impl<E> Paginator<E>
where
    E: Identified + Clone + Send + 'static,
{
    /// `page_size` is clamped to at least one.
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            search: None,
            generation: 0,
            items: Vec::new(),
            seen: HashSet::new(),
            cursor: CursorState::Start,
            page,
            page_size: page_size.max(1),
            request: RequestState::new(),
            in_flight: false,
            max_pages: FetchOptions::default().max_pages,
        }
    }

    /// Upper bound on pages fetched by one [`Paginator::sync`].
    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    /// Install a new search, discarding every item of the previous one.
    pub fn on_search(&mut self, search: SearchFn<E>) {
        self.generation += 1;
        if self.in_flight {
            debug!(
                generation = self.generation,
                "New search supersedes in-flight page fetch"
            );
        }
        self.search = Some(search);
        self.items.clear();
        self.seen.clear();
        self.cursor = CursorState::Start;
        self.page = 0;
        self.in_flight = false;
        self.request.reset();
    }

    /// Move to another page. Clears a failed request; keeps fetched items.
    pub fn set_page(&mut self, page: usize) {
        self.page = page;
        self.request.reset();
    }

    /// Change the page size and return to the first page.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page = 0;
        self.request.reset();
    }

    pub fn needs_fetch(&self) -> bool {
        self.search.is_some()
            && self.items.len() <= self.page_start()
            && self.cursor != CursorState::Exhausted
            && !self.in_flight
            && !self.request.is_loading()
            && !self.request.is_failure()
    }

    /// Issue the next page fetch if one is needed.
    pub fn begin_fetch(&mut self) -> Option<PageFetch<E>> {
        if !self.needs_fetch() {
            return None;
        }
        let search = self.search.as_ref()?;
        let cursor = match &self.cursor {
            CursorState::Start => None,
            CursorState::Next(cursor) => Some(cursor.clone()),
            CursorState::Exhausted => return None,
        };

        debug!(
            generation = self.generation,
            page = self.page,
            cursor = cursor.as_ref().map(Cursor::as_str),
            "Fetching next page"
        );
        let future = search(cursor);
        self.in_flight = true;
        self.request.on_start();
        Some(PageFetch {
            generation: self.generation,
            future,
        })
    }

    /// Apply a resolved page. Returns `false` when the outcome was dropped:
    /// it belongs to a superseded search, or no fetch is outstanding.
    pub fn complete(&mut self, outcome: PageOutcome<E>) -> bool {
        if outcome.generation != self.generation {
            debug!(
                stale = outcome.generation,
                current = self.generation,
                "Discarding page from superseded search"
            );
            counter!(METRIC_PAGE_DISCARDED).increment(1);
            return false;
        }
        if !self.in_flight {
            debug!(
                generation = self.generation,
                "Ignoring page outcome with no fetch outstanding"
            );
            return false;
        }
        self.in_flight = false;

        match outcome.result {
            Ok(page) => {
                for item in page.items {
                    if self.seen.insert(item.cache_id()) {
                        self.items.push(item);
                    }
                }
                self.cursor = match page.cursor {
                    Some(cursor) => CursorState::Next(cursor),
                    None => CursorState::Exhausted,
                };
                self.request.on_success(());
            }
            Err(error) => {
                warn!(generation = self.generation, error = %error, "Page fetch failed");
                self.request.on_failure(error);
            }
        }
        true
    }

    /// Fetch pages until the current page is covered, the listing is
    /// exhausted, a fetch fails, or the page limit is reached. Returns the
    /// number of pages fetched.
    pub async fn sync(&mut self) -> usize {
        let mut fetched = 0;
        while let Some(fetch) = self.begin_fetch() {
            let outcome = fetch.resolve().await;
            self.complete(outcome);
            fetched += 1;

            if fetched >= self.max_pages as usize && self.needs_fetch() {
                warn!(
                    generation = self.generation,
                    cursor = ?self.cursor,
                    max_pages = self.max_pages,
                    "Page not covered after limit; pausing pagination"
                );
                break;
            }
        }
        fetched
    }

    /// Offset of the current page's first row, saturating at `usize::MAX`.
    fn page_start(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }

    /// Items of the current page; fewer than a full page at the tail.
    pub fn page_items(&self) -> &[E] {
        let start = self.page_start().min(self.items.len());
        let end = start.saturating_add(self.page_size).min(self.items.len());
        &self.items[start..end]
    }

    /// Estimated total rows: one extra page while more pages exist.
    pub fn row_count(&self) -> usize {
        match self.cursor {
            CursorState::Exhausted => self.items.len(),
            _ => self.items.len().saturating_add(self.page_size),
        }
    }

    pub fn items(&self) -> &[E] {
        &self.items
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cursor(&self) -> &CursorState {
        &self.cursor
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor == CursorState::Exhausted
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> &RequestState {
        &self.request
    }
}
