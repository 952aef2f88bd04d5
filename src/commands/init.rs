//! `runeforge init` - scaffold a new workspace.

use anyhow::Result;
use std::path::PathBuf;

use crate::paths;
use crate::scaffold;

pub fn execute(path: Option<PathBuf>) -> Result<()> {
    let root = match path {
        Some(path) => path,
        None => std::env::current_dir()?,
    };
    scaffold::init_workspace(&root)?;
    println!("   ✓ initialized workspace at {}", root.display());
    println!("     edit {} and run 'runeforge create-mod <name>'", paths::CONFIG_FILE);
    Ok(())
}
