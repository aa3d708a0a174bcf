//! Domain entities and their cache identity.

pub mod entities;
