//! Fetch-key state for one entity type.
//!
//! Each key is in exactly one of three states:
//!
//! - **Unfetched** (absent from the map): the next loader claims it.
//! - **InFlight**: one loader owns the network call; everyone else awaits the
//!   same shared outcome instead of issuing a second call.
//! - **Fetched**: satisfied at least once since the last cache reset.
//!
//! Claiming is a single synchronous step on the map entry, so two loaders
//! cannot both observe `Unfetched` for the same key. A failed fetch returns the
//! key to `Unfetched` so a later explicit load may try again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{FutureExt, Shared};
use tokio::sync::oneshot;
use tracing::debug;

use super::keys::FetchKey;
use crate::application::error::FetchError;

type Outcome = Result<(), FetchError>;

enum KeyState {
    InFlight {
        generation: u64,
        waiter: InFlightFetch,
    },
    Fetched,
}

/// Outcome of [`FetchKeys::claim`].
pub enum Claim {
    /// The key is already satisfied; no network call is needed.
    Fetched,
    /// Another loader owns the call; await its outcome.
    Join(InFlightFetch),
    /// The caller owns the call and must complete the ticket.
    Lead(FetchTicket),
}

/// Handle on an in-flight fetch shared by every joined loader.
#[derive(Clone)]
pub struct InFlightFetch {
    generation: u64,
    outcome: Shared<oneshot::Receiver<Outcome>>,
}

impl InFlightFetch {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub async fn wait(self) -> Outcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => Err(FetchError::Abandoned),
        }
    }
}

/// Ownership of an in-flight fetch.
///
/// Completing the ticket settles the key and wakes every joined loader.
/// Dropping it uncompleted releases the key back to `Unfetched`.
pub struct FetchTicket {
    key: FetchKey,
    generation: u64,
    table: &'static str,
    keys: Arc<DashMap<FetchKey, KeyState>>,
    sender: Option<oneshot::Sender<Outcome>>,
    waiter: InFlightFetch,
}

impl FetchTicket {
    pub fn key(&self) -> &FetchKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The shared outcome this ticket will publish.
    pub fn waiter(&self) -> InFlightFetch {
        self.waiter.clone()
    }

    /// Settle the key: `Fetched` on success, `Unfetched` on failure.
    ///
    /// A ticket superseded by a cache reset leaves the newer state untouched.
    pub fn complete(mut self, outcome: Outcome) {
        let generation = self.generation;
        match self.keys.entry(self.key.clone()) {
            Entry::Occupied(mut entry) => {
                let owned = matches!(
                    entry.get(),
                    KeyState::InFlight { generation: current, .. } if *current == generation
                );
                if owned {
                    if outcome.is_ok() {
                        entry.insert(KeyState::Fetched);
                    } else {
                        entry.remove();
                    }
                } else {
                    debug!(
                        table = self.table,
                        key = %self.key,
                        generation,
                        "Fetch ticket superseded; leaving newer key state"
                    );
                }
            }
            Entry::Vacant(_) => {
                debug!(
                    table = self.table,
                    key = %self.key,
                    generation,
                    "Fetch key was reset while in flight"
                );
            }
        }

        if let Some(sender) = self.sender.take() {
            let _ = sender.send(outcome);
        }
    }
}

impl Drop for FetchTicket {
    fn drop(&mut self) {
        if self.sender.is_some() {
            let generation = self.generation;
            self.keys.remove_if(&self.key, |_, state| {
                matches!(state, KeyState::InFlight { generation: current, .. } if *current == generation)
            });
        }
    }
}

/// Fetch-key table for one entity type.
pub struct FetchKeys {
    table: &'static str,
    keys: Arc<DashMap<FetchKey, KeyState>>,
    generations: AtomicU64,
}

impl FetchKeys {
    pub fn new(table: &'static str) -> Self {
        Self {
            table,
            keys: Arc::new(DashMap::new()),
            generations: AtomicU64::new(0),
        }
    }

    pub fn is_fetched(&self, key: &FetchKey) -> bool {
        self.keys
            .get(key)
            .is_some_and(|state| matches!(*state, KeyState::Fetched))
    }

    pub fn is_in_flight(&self, key: &FetchKey) -> bool {
        self.keys
            .get(key)
            .is_some_and(|state| matches!(*state, KeyState::InFlight { .. }))
    }

    /// Mark a key satisfied without a fetch. Idempotent.
    pub fn mark_fetched(&self, key: &FetchKey) {
        self.keys.insert(key.clone(), KeyState::Fetched);
    }

    /// Claim a key or join the existing claim, in one step.
    pub fn claim(&self, key: &FetchKey) -> Claim {
        match self.keys.entry(key.clone()) {
            Entry::Occupied(entry) => match entry.get() {
                KeyState::Fetched => Claim::Fetched,
                KeyState::InFlight { waiter, .. } => Claim::Join(waiter.clone()),
            },
            Entry::Vacant(entry) => {
                let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
                let (sender, receiver) = oneshot::channel();
                let waiter = InFlightFetch {
                    generation,
                    outcome: receiver.shared(),
                };
                entry.insert(KeyState::InFlight {
                    generation,
                    waiter: waiter.clone(),
                });
                Claim::Lead(FetchTicket {
                    key: key.clone(),
                    generation,
                    table: self.table,
                    keys: Arc::clone(&self.keys),
                    sender: Some(sender),
                    waiter,
                })
            }
        }
    }

    /// Number of keys currently fetched or in flight.
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Forget every key. Outstanding tickets become stale.
    pub fn clear(&self) {
        self.keys.clear();
    }
}
