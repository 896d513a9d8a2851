//! Database module for kumawatch.
//!
//! Provides append-only SQLite storage of metric samples with embedded migrations.

mod models;
mod store;

pub use models::*;
pub use store::*;
