//! Database layer for dropzone-dl
//!
//! Durable SQLite storage for pending URL sessions, one row per user.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] - Database lifecycle, schema migrations
//! - [`sessions`] - Session CRUD

use sqlx::sqlite::SqlitePool;

mod migrations;
mod sessions;

/// Database handle for dropzone-dl
pub struct Database {
    pool: SqlitePool,
}
