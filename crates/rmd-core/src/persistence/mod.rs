//! Persistence layer for publication metadata
//!
//! Provides SQLite-backed storage for publications, imports, authorships,
//! duplicate groups and non-duplicate decisions.

pub(crate) mod queries;
mod repository;
mod schema;

pub use repository::{Repository, StoreCounts};
pub use schema::{Schema, SCHEMA_VERSION};
