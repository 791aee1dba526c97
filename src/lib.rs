//! versiondb - a versioned entity store
//!
//! Named collections hold logical files; each file accumulates numbered,
//! content-addressed versions that may point back at the version they were
//! derived from. Metadata lives in SQLite, bytes live behind a
//! [`gateway::ContentGateway`].
//!
//! # Example
//!
//! ```no_run
//! use versiondb::db::Database;
//! use versiondb::model::{Collection, ContentHash, NewVersion};
//!
//! let db = Database::open(".versiondb/metadata.db").unwrap();
//! let collection = db.create_collection(Collection::new("cifar")).unwrap();
//! let file = collection.add_child(db.repository(), "train.csv", "", "").unwrap();
//! let v1 = file
//!     .add_version(db.repository(), db.gateway(), NewVersion::from_hash(ContentHash::md5("d41d8cd9")))
//!     .unwrap();
//! assert_eq!(v1.version_number.get(), 1);
//! ```

pub mod db;
pub mod gateway;
pub mod model;
pub mod pipeline;
pub mod services;
pub mod store;
