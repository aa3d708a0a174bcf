//! Request coordination over the entity cache.

pub mod coordinator;
pub mod error;
pub mod pagination;
pub mod query;
pub mod request;
pub mod transport;
