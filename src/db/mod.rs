//! SQLite storage.
//!
//! This module provides:
//! - Database initialization and schema setup
//! - SQLite pragma configuration
//! - Repository layer for loans, schedules, repayments, derived state and sync marks

pub mod migrations;
pub mod repo;

pub use migrations::{init_db, init_db_with_connections};
pub use repo::{Repository, UpsertOutcome};
