//! `runeforge create-*` - scaffolding commands.

use anyhow::Result;

use crate::migrate::DbKind;
use crate::scaffold;
use crate::workspace::Workspace;

pub fn execute_mod(name: &str) -> Result<()> {
    let workspace = Workspace::locate()?;
    scaffold::create_mod(&workspace, name)?;
    println!("   ✓ created mods/{}", name);
    Ok(())
}

pub fn execute_migration(mod_name: &str, db: DbKind, description: &str) -> Result<()> {
    let workspace = Workspace::locate()?;
    let file = scaffold::create_migration(&workspace, mod_name, db, description)?;
    println!("   ✓ created mods/{}/{}/{}", mod_name, db.sql_dir_name(), file);
    Ok(())
}

pub fn execute_script(mod_name: &str, name: &str) -> Result<()> {
    let workspace = Workspace::locate()?;
    let file = scaffold::create_script(&workspace, mod_name, name)?;
    println!("   ✓ created mods/{}/scripts/{}", mod_name, file);
    Ok(())
}

pub fn execute_addon(mod_name: &str, name: &str) -> Result<()> {
    let workspace = Workspace::locate()?;
    scaffold::create_addon(&workspace, mod_name, name)?;
    println!(
        "   ✓ created mods/{}/luaxml/Interface/FrameXML/{}.lua (+ .xml)",
        mod_name, name
    );
    Ok(())
}
