//! Core types and engine for the visitmap ledger.
//!
//! Viewers mark countries as visited. Every accepted mark is an immutable
//! [`event::Event`] in an append-only ledger; the current map is always
//! derived by replaying that ledger through [`projection`]. Writes pass
//! through [`validate`] and the admission [`gate`] before they are appended.
//!
//! This crate is free of HTTP and database dependencies. Storage backends
//! implement the traits in [`store`] and [`policy`].

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod clock;
pub mod error;
pub mod event;
pub mod gate;
pub mod memory;
pub mod policy;
pub mod projection;
pub mod service;
pub mod store;
pub mod validate;

pub use error::{Error, Reason, Result};
pub use service::{Rules, VisitService, WriteIntent};
