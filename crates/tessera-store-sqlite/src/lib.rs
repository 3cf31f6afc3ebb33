//! SQLite backend for the Tessera membership registry.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Every mutation is a single closure on
//! that thread holding one `rusqlite::Transaction`; dropping the transaction
//! on any early return rolls it back.

mod audit;
mod encode;
mod listing;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{NewDocument, NewMessage, SenderType, SqliteStore, StoreOptions};

#[cfg(test)]
mod tests;
