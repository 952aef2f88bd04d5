//! `runeforge status` - per-mod migration and overlay state.

use anyhow::Result;
use colored::Colorize;

use crate::migrate::{self, DbKind};
use crate::overlay;
use crate::workspace::Workspace;

fn migration_line(workspace: &Workspace, mod_name: &str, db: DbKind) -> Result<String> {
    let counts = migrate::status(&workspace.root, mod_name, db)?;
    let mut line = format!(
        "   {}: {} applied, {} pending",
        db.tag(),
        counts.applied,
        counts.pending
    );
    if counts.drifted > 0 {
        line.push_str(&format!(", {} drifted", counts.drifted.to_string().yellow()));
    }
    Ok(line)
}

pub fn execute(mod_filter: Option<&str>) -> Result<()> {
    let workspace = Workspace::locate()?;
    let mods = workspace.selected_mods(mod_filter)?;
    if mods.is_empty() {
        println!("No mods in this workspace");
        return Ok(());
    }

    for mod_name in &mods {
        println!("{}", mod_name.bold());
        println!("{}", migration_line(&workspace, mod_name, DbKind::Dbc)?);
        println!("{}", migration_line(&workspace, mod_name, DbKind::World)?);
        let overlay_files = overlay::count_files(&workspace.mod_dir(mod_name))?;
        println!("   luaxml: {} file(s)", overlay_files);
    }

    Ok(())
}
