//! Core types and trait definitions for the Tessera membership registry.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain records, the transition rules of the application lifecycle, the
//! typed listing query and the [`store::ApplicationStore`] contract
//! that storage backends implement.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod applicant;
pub mod application;
pub mod audit;
pub mod document;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod query;
pub mod staff;
pub mod store;

pub use engine::Lifecycle;
pub use error::{Error, Result};
