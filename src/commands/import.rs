//! `runeforge import dbc` - load a DBC source tree into the working
//! database.

use anyhow::{bail, Result};
use std::path::PathBuf;

use crate::db::Gateway;
use crate::dbc::import;
use crate::paths;
use crate::workspace::Workspace;

pub fn execute_dbc(
    source: Option<PathBuf>,
    database: Option<String>,
    skip_existing: bool,
) -> Result<()> {
    let workspace = Workspace::locate()?;

    let source = match source {
        Some(dir) => dir,
        None => paths::shared::dbc_baseline_dir(&workspace.root),
    };
    if !source.is_dir() {
        bail!(
            "DBC source directory {} does not exist (use --source)",
            source.display()
        );
    }

    let mut cfg = workspace.config.databases.primary.clone();
    if let Some(name) = database {
        cfg.name = name;
    }
    let gateway = Gateway::new(&cfg);

    let summary = import::import_all(&gateway, &workspace.root, &source, skip_existing)?;
    for file in &summary.imported {
        println!("   ✓ {}", file);
    }
    if !summary.skipped.is_empty() {
        println!("   skipped {} existing table(s)", summary.skipped.len());
    }
    if !summary.missing.is_empty() {
        println!(
            "   {} schema file(s) not present in source",
            summary.missing.len()
        );
    }
    println!(
        "Imported {} table(s) into '{}'",
        summary.imported.len(),
        gateway.db_name()
    );
    Ok(())
}
