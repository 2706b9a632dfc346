//! SQLite backend for the Gongbu lesson store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Multi-row pipeline writes each run in
//! a single transaction inside one `call`.

mod commit;
mod encode;
mod import;
mod schema;
mod store;
mod write;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
