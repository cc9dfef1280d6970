//! Database connection handling
//!
//! The scheduler stores jobs, executions, and logs through `jobs::store::PostgresJobStore`,
//! which takes a raw `sqlx::PgPool` directly. This module only owns pool construction.

pub mod postgres;

pub use postgres::{PostgresDb as Database, create_pool};
