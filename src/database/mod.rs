//! # Database Operations
//!
//! Persistence for run sets, runs and method versions.
//!
//! ## Key Components
//!
//! - [`store`] - the [`RunStore`] trait every component persists through
//! - [`pg_store`] - PostgreSQL implementation on a shared `PgPool`
//! - [`connection`] - pool construction from [`DatabaseConfig`](crate::config::DatabaseConfig)

pub mod connection;
pub mod pg_store;
pub mod store;

pub use connection::DatabaseConnection;
pub use pg_store::PgRunStore;
pub use store::{RunStore, StoreError, StoreResult};
