//! Persistence-backed operations, generic over any SeaORM connection.
//!
//! The Worker passes its libSQL connection; tests pass in-memory SQLite.

pub mod accounts;
pub mod admin;
pub mod catalog;
pub mod entitlements;
pub mod orders;
pub mod rate_limit;
