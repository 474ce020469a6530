//! Database RPC consumer contract (used by the coordinator and builder
//! agent) plus a minimal service implementation backing the `database` CLI
//! verb. The database component's own package-pool bookkeeping is out of
//! scope; this crate only has to answer the four RPCs the rest of the
//! system depends on.

pub mod client;
pub mod error;
pub mod service;

pub use client::{BusDatabaseClient, DatabaseClient, DATABASE_CHANNEL};
pub use error::DatabaseError;
pub use service::{DatabaseService, DatabaseServiceConfig};
