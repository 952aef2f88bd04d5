//! Relational store gateway.
//!
//! All SQL goes through this module: script execution against a named
//! database, database creation, table checksums, and row queries. Scripts
//! are split into individual statements here (quote-aware, see [`script`]),
//! so per-statement failures can be surfaced with useful context.

pub mod gateway;
pub mod script;

pub use gateway::Gateway;
pub use script::{split_statements, truncate_statement};

use anyhow::Result;

/// Narrow seam for executing a multi-statement SQL script.
///
/// The migration engine depends on this instead of a live connection so its
/// filesystem logic is testable without a server.
pub trait SqlRunner {
    fn run_script(&mut self, sql_text: &str) -> Result<()>;
}
