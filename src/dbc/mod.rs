//! DBC engine - fixed-schema binary tables.
//!
//! DBC files are little-endian fixed-layout tables with a trailing string
//! block (`WDBC` magic). The engine imports them into the working database,
//! tracks per-table baseline fingerprints, and re-emits only tables whose
//! fingerprint drifted - byte-faithfully, so an unchanged table produces an
//! unchanged file.

pub mod codec;
pub mod export;
pub mod import;
pub mod schema;

pub use schema::{ColumnType, FieldType, Schema};

/// Auxiliary table holding the last-export fingerprint per table.
pub const CHECKSUM_TABLE: &str = "table_checksums";
