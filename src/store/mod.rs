//! SQLite persistence engine.
//!
//! One module per table holds the SQL and the row decoding for that entity;
//! [`SqliteRepository`] ties them together behind the
//! [`Repository`](crate::model::Repository) trait.

mod codec;
mod collections;
mod error;
mod files;
mod schema;
mod sqlite;
mod versions;

pub use error::{StoreError, StoreResult};
pub use schema::SCHEMA_VERSION;
pub use sqlite::{JournalMode, SqliteRepository, StoreConfig};
