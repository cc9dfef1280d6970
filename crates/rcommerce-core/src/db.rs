//! Database access utilities

pub mod migrate;
