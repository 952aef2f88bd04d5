//! `runeforge rollback` - undo applied migrations.
//!
//! Mods are unwound in descending name order, migrations within a mod in
//! descending file order. Without `--all`, exactly one migration (the most
//! recently ordered applied one) is rolled back per database.

use anyhow::Result;
use colored::Colorize;

use crate::db::Gateway;
use crate::migrate::{self, DbKind};
use crate::workspace::Workspace;

pub fn execute(mod_filter: Option<&str>, db: Option<DbKind>, all: bool) -> Result<()> {
    let workspace = Workspace::locate()?;
    let mods = workspace.selected_mods(mod_filter)?;
    let kinds = match db {
        Some(kind) => vec![kind],
        None => vec![DbKind::Dbc, DbKind::World],
    };

    for kind in kinds {
        println!(
            "{}",
            format!("== Rolling back {} migrations ==", kind.sql_dir_name())
                .cyan()
                .bold()
        );
        let cfg = match kind {
            DbKind::Dbc => &workspace.config.databases.primary,
            DbKind::World => &workspace.config.databases.world,
        };
        let mut gateway = Gateway::new(cfg);

        let mut total = 0;
        for mod_name in mods.iter().rev() {
            let count = migrate::rollback_mod(&mut gateway, &workspace.root, mod_name, kind, all)?;
            if count > 0 {
                println!("   {}: rolled back {}", mod_name, count);
            }
            total += count;
            if !all && total > 0 {
                break;
            }
        }
        if total == 0 {
            println!("   no-op");
        }
    }

    Ok(())
}
