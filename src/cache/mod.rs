//! Entity cache and fetch-key tracking.
//!
//! - [`EntityCache`]: normalized in-memory store, one [`EntityTable`] per
//!   entity type, upsert-by-id with last-write-wins.
//! - [`FetchKeys`]: per-table record of which logical queries have been
//!   satisfied, and which are currently in flight.
//!
//! The cache is an acceleration layer over the remote API. It is constructed
//! explicitly and shared through an `Arc`, never as a global.

mod flights;
mod keys;
mod lock;
mod store;

pub use flights::{Claim, FetchKeys, FetchTicket, InFlightFetch};
pub use keys::{ALL_COHORTS, FetchKey};
pub use store::{EntityCache, EntityTable};
