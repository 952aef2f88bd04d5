//! Workspace and mod scaffolding.
//!
//! Thin template writers behind `init` and the `create-*` commands. Names
//! are validated before any filesystem mutation.

use anyhow::{bail, Context, Result};
use chrono::Local;
use std::fs;
use std::path::Path;

use crate::migrate::DbKind;
use crate::paths;
use crate::workspace::{self, Workspace};

/// The standard mod subdirectories, created empty by `create-mod`.
pub const MOD_SUBDIRS: [&str; 7] = [
    "dbc_sql",
    "world_sql",
    "scripts",
    "server-patches",
    "binary-edits",
    "assets",
    "luaxml",
];

/// Scaffold a new workspace at `root`: a defaults config plus the `mods/`
/// and `shared/` skeleton.
pub fn init_workspace(root: &Path) -> Result<()> {
    let config = paths::config_file(root);
    if config.exists() {
        bail!("{} already exists", config.display());
    }
    fs::create_dir_all(root).with_context(|| format!("Cannot create {}", root.display()))?;

    let defaults = crate::config::Config::default();
    let text = serde_json::to_string_pretty(&defaults).context("Cannot serialize defaults")?;
    fs::write(&config, text).with_context(|| format!("Cannot write {}", config.display()))?;

    fs::create_dir_all(paths::mods_dir(root))?;
    fs::create_dir_all(paths::shared_dir(root))?;
    Ok(())
}

/// Create an empty mod skeleton. Fails before touching the filesystem when
/// the name is malformed, reserved, or taken.
pub fn create_mod(workspace: &Workspace, name: &str) -> Result<()> {
    workspace::validate_mod_name(name)?;
    let mod_dir = workspace.mod_dir(name);
    if mod_dir.exists() {
        bail!("Mod '{}' already exists", name);
    }
    for subdir in MOD_SUBDIRS {
        fs::create_dir_all(mod_dir.join(subdir))
            .with_context(|| format!("Cannot create {}", mod_dir.join(subdir).display()))?;
    }
    Ok(())
}

fn require_mod(workspace: &Workspace, name: &str) -> Result<std::path::PathBuf> {
    let mod_dir = workspace.mod_dir(name);
    if !mod_dir.is_dir() {
        bail!("Mod '{}' does not exist", name);
    }
    Ok(mod_dir)
}

fn sanitize_description(description: &str) -> String {
    description
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Create a timestamped migration pair (apply + rollback stub). Returns the
/// apply file name.
pub fn create_migration(
    workspace: &Workspace,
    mod_name: &str,
    db: DbKind,
    description: &str,
) -> Result<String> {
    let mod_dir = require_mod(workspace, mod_name)?;
    let sql_dir = paths::mod_tree::sql_dir(&mod_dir, db.tag());
    fs::create_dir_all(&sql_dir)
        .with_context(|| format!("Cannot create {}", sql_dir.display()))?;

    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let stem = format!("{}_{}", stamp, sanitize_description(description));
    let apply = sql_dir.join(format!("{}.sql", stem));
    let rollback = sql_dir.join(format!("{}.rollback.sql", stem));

    fs::write(&apply, "-- Apply script\n")
        .with_context(|| format!("Cannot write {}", apply.display()))?;
    fs::write(&rollback, "-- Rollback script\n")
        .with_context(|| format!("Cannot write {}", rollback.display()))?;
    Ok(format!("{}.sql", stem))
}

/// Create a C++ script stub with a `Register_<name>` entry point.
pub fn create_script(workspace: &Workspace, mod_name: &str, name: &str) -> Result<String> {
    workspace::validate_mod_name(name)
        .with_context(|| format!("Script name '{}' is not usable", name))?;
    let mod_dir = require_mod(workspace, mod_name)?;
    let scripts_dir = paths::mod_tree::scripts_dir(&mod_dir);
    fs::create_dir_all(&scripts_dir)?;

    let file = scripts_dir.join(format!("{}.cpp", name));
    if file.exists() {
        bail!("{} already exists", file.display());
    }
    let symbol = name.replace('-', "_");
    let body = format!(
        "#include \"ScriptMgr.h\"\n\nvoid Register_{}()\n{{\n    // Register script classes here.\n}}\n",
        symbol
    );
    fs::write(&file, body).with_context(|| format!("Cannot write {}", file.display()))?;
    Ok(format!("{}.cpp", name))
}

/// Create a UI overlay stub pair under `luaxml/Interface/FrameXML/`.
pub fn create_addon(workspace: &Workspace, mod_name: &str, name: &str) -> Result<()> {
    workspace::validate_mod_name(name)
        .with_context(|| format!("Addon name '{}' is not usable", name))?;
    let mod_dir = require_mod(workspace, mod_name)?;
    let frame_xml = paths::mod_tree::luaxml_dir(&mod_dir)
        .join("Interface")
        .join("FrameXML");
    fs::create_dir_all(&frame_xml)
        .with_context(|| format!("Cannot create {}", frame_xml.display()))?;

    let lua = frame_xml.join(format!("{}.lua", name));
    let xml = frame_xml.join(format!("{}.xml", name));
    if lua.exists() || xml.exists() {
        bail!("Addon '{}' already exists in {}", name, mod_name);
    }

    fs::write(&lua, format!("-- {}\n\nlocal frame = CreateFrame(\"Frame\", \"{}Frame\")\n", name, name))?;
    fs::write(
        &xml,
        format!(
            "<Ui xmlns=\"http://www.blizzard.com/wow/ui/\">\n    <Script file=\"{}.lua\"/>\n</Ui>\n",
            name
        ),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_workspace() {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("ws");
        init_workspace(&root).unwrap();

        assert!(paths::config_file(&root).is_file());
        assert!(paths::mods_dir(&root).is_dir());
        assert!(paths::shared_dir(&root).is_dir());

        // Config round-trips through the loader.
        let ws = Workspace::open(&root).unwrap();
        assert_eq!(ws.config.client.locale, "enUS");

        assert!(init_workspace(&root).is_err());
    }

    #[test]
    fn test_create_mod_skeleton() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path().join("ws").as_path()).unwrap();
        let ws = Workspace::open(&temp.path().join("ws")).unwrap();

        create_mod(&ws, "epochs").unwrap();
        for subdir in MOD_SUBDIRS {
            assert!(ws.mod_dir("epochs").join(subdir).is_dir());
        }

        assert!(create_mod(&ws, "epochs").is_err());
    }

    #[test]
    fn test_create_mod_validates_before_mutation() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path().join("ws").as_path()).unwrap();
        let ws = Workspace::open(&temp.path().join("ws")).unwrap();

        assert!(create_mod(&ws, "shared").is_err());
        assert!(create_mod(&ws, "1bad").is_err());
        assert!(!ws.mod_dir("shared").exists());
        assert!(!ws.mod_dir("1bad").exists());
    }

    #[test]
    fn test_create_migration_pair() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path().join("ws").as_path()).unwrap();
        let ws = Workspace::open(&temp.path().join("ws")).unwrap();
        create_mod(&ws, "m").unwrap();

        let name = create_migration(&ws, "m", DbKind::Dbc, "add spell").unwrap();
        assert!(name.ends_with("_add_spell.sql"));

        let sql_dir = paths::mod_tree::sql_dir(&ws.mod_dir("m"), "dbc");
        assert!(sql_dir.join(&name).is_file());
        let rollback = name.replace(".sql", ".rollback.sql");
        assert!(sql_dir.join(rollback).is_file());
    }

    #[test]
    fn test_create_script_stub_has_register_symbol() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path().join("ws").as_path()).unwrap();
        let ws = Workspace::open(&temp.path().join("ws")).unwrap();
        create_mod(&ws, "m").unwrap();

        create_script(&ws, "m", "npc_tuner").unwrap();
        let file = paths::mod_tree::scripts_dir(&ws.mod_dir("m")).join("npc_tuner.cpp");
        let source = fs::read_to_string(file).unwrap();
        assert_eq!(
            crate::scripts::scan_register_symbol(&source).as_deref(),
            Some("Register_npc_tuner")
        );
    }

    #[test]
    fn test_create_addon_stub_pair() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path().join("ws").as_path()).unwrap();
        let ws = Workspace::open(&temp.path().join("ws")).unwrap();
        create_mod(&ws, "m").unwrap();

        create_addon(&ws, "m", "EpochTimer").unwrap();
        let frame_xml = paths::mod_tree::luaxml_dir(&ws.mod_dir("m"))
            .join("Interface")
            .join("FrameXML");
        assert!(frame_xml.join("EpochTimer.lua").is_file());
        assert!(frame_xml.join("EpochTimer.xml").is_file());
    }
}
