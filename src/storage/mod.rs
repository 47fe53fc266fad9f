//! Durable storage for scheduled calls and call history.
//!
//! - **Database**: PostgreSQL implementation of the [`JobStore`] trait
//! - **schema**: SQL schema constants
//! - **MigrationRunner**: idempotent, tracked schema migrations

pub mod database;
pub mod migrations;
pub mod schema;

pub use database::{Database, HistoryPage, JobStore, StoreError};
pub use migrations::{AppliedMigration, MigrationError, MigrationRunner};
