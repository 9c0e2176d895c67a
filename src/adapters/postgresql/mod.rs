//! PostgreSQL storage backend
//!
//! Stores cards with their faces and related parts, and the run history,
//! in the schema from `migrations/001_initial_schema.sql`.

pub mod adapter;
pub mod client;
pub mod models;

pub use adapter::PostgreSQLAdapter;
pub use client::PostgreSQLClient;
pub use models::{PostgreSQLCard, PostgreSQLSyncRun};
