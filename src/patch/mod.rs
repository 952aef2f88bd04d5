//! Patch applicators: raw byte edits to the client executable and unified
//! diffs to the server source tree.

pub mod binary;
pub mod source;
