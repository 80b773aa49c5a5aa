//! # signage-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the `LocalStateStore` port defined in `signage-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! ## Dependency rule
//! Depends on `signage-app` (for port traits) and `signage-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod local_state;
pub mod pool;

pub use error::StorageError;
pub use local_state::SqliteLocalState;
pub use pool::{Config, Database};
