//! High-level database handle.
//!
//! [`Database`] is the entry point for applications: it opens the store
//! from a [`DatabaseConfig`], owns the content gateway and hands out the
//! lineage and integrity services.

mod api;

pub use api::{Database, DatabaseConfig, DatabaseError, DatabaseResult, DatabaseStats, DEFAULT_DATABASE_PATH, OBJECTS_DIR};
