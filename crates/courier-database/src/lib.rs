//! SQLite database layer for linkcourier.
//!
//! This crate provides:
//! - Async SQLite executor with a dedicated thread
//! - Database migrations
//! - Model types for all tables
//! - Query helpers, including the atomic per-key abuse record update
//!
//! # Architecture
//!
//! The `AsyncDatabase` uses a single dedicated thread for all SQLite
//! operations. Queries are sent through a channel and executed in FIFO
//! order, so two closures never interleave inside one process. Writes that
//! read before they write run in a `BEGIN IMMEDIATE` transaction, which
//! also excludes other processes sharing the same file.
//!
//! ```ignore
//! let db = AsyncDatabase::open(path).await?;
//! let record = db
//!     .call(move |conn| queries::get_abuse_record(conn, &user_hash, "email"))
//!     .await?;
//! ```
//!
//! **Important**: Only SQL operations should run inside `db.call()`.

mod error;
mod executor;
mod migrations;
mod models;
pub mod queries;

pub use error::{DatabaseError, DatabaseResult};
pub use executor::AsyncDatabase;
pub use migrations::run_migrations;
pub use models::*;
