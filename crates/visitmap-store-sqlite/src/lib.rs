//! SQLite backend for the visitmap ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every call is executed on that single
//! connection in submission order, which is what serialises ledger appends
//! and makes each rate-limit compare-and-set atomic.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
