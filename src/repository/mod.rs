//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM over SQLite with compile-time query
//! checking.

pub mod context;
pub mod diesel_artifact;
pub mod models;
pub mod pool;
pub mod store;
pub mod util;

pub use context::{DbContext, TargetStats};
pub use diesel_artifact::DieselArtifactRepository;
pub use models::{ArtifactRow, NewArtifact};
pub use pool::{DbError, SqliteConn, SqlitePool};
pub use store::{ArtifactStore, BoxError, StoreError};
pub use util::{format_datetime, parse_datetime};
