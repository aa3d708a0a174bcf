//! Infrastructure adapters and runtime bootstrap.

pub mod connectivity;
pub mod error;
pub mod http;
pub mod telemetry;
