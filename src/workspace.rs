//! Workspace model - root discovery, config loading, mod enumeration.
//!
//! A workspace is any directory containing `runeforge.json`. The root is
//! located by walking ancestors of the current directory, so commands work
//! from anywhere inside the tree.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::config::Config;
use crate::paths;

/// Mod names that collide with workspace directories or the framework itself.
pub const RESERVED_MOD_NAMES: [&str; 5] = ["shared", "mods", "runeforge", "config", "build"];

/// An opened workspace: root directory plus parsed config.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: Config,
}

impl Workspace {
    /// Locate the workspace by walking ancestors of the current directory.
    pub fn locate() -> Result<Self> {
        let cwd = std::env::current_dir().context("Cannot determine current directory")?;
        Self::locate_from(&cwd)
    }

    /// Locate the workspace by walking ancestors of `start`.
    pub fn locate_from(start: &Path) -> Result<Self> {
        for dir in start.ancestors() {
            if paths::config_file(dir).is_file() {
                return Self::open(dir);
            }
        }
        bail!(
            "No workspace found: no {} in {} or any parent directory",
            paths::CONFIG_FILE,
            start.display()
        )
    }

    /// Open the workspace rooted at `root`.
    pub fn open(root: &Path) -> Result<Self> {
        let config_path = paths::config_file(root);
        let text = fs::read_to_string(&config_path)
            .with_context(|| format!("Cannot read {}", config_path.display()))?;
        let config = Config::from_str(&text)
            .with_context(|| format!("In {}", config_path.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
            config,
        })
    }

    /// All mod names, sorted ascending. Build order is this order; later
    /// mods win in shared namespaces.
    pub fn mods(&self) -> Result<Vec<String>> {
        let mods_dir = paths::mods_dir(&self.root);
        if !mods_dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in fs::read_dir(&mods_dir)
            .with_context(|| format!("Cannot read {}", mods_dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }

        names.sort();
        Ok(names)
    }

    /// Mods to process for this invocation: all of them, or the one selected
    /// by `--mod` (which must exist).
    pub fn selected_mods(&self, filter: Option<&str>) -> Result<Vec<String>> {
        let all = self.mods()?;
        match filter {
            None => Ok(all),
            Some(name) => {
                if all.iter().any(|m| m == name) {
                    Ok(vec![name.to_string()])
                } else {
                    bail!("Mod '{}' does not exist in this workspace", name)
                }
            }
        }
    }

    pub fn mod_dir(&self, name: &str) -> PathBuf {
        paths::mod_dir(&self.root, name)
    }

    pub fn locale(&self) -> &str {
        &self.config.client.locale
    }
}

fn mod_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*$").unwrap())
}

/// Validate a mod name before any filesystem mutation.
pub fn validate_mod_name(name: &str) -> Result<()> {
    if !mod_name_regex().is_match(name) {
        bail!(
            "Invalid mod name '{}': must start with a letter and contain only letters, digits, '_' and '-'",
            name
        );
    }
    if RESERVED_MOD_NAMES.contains(&name) {
        bail!("Invalid mod name '{}': reserved", name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn init_workspace(root: &Path) {
        fs::write(paths::config_file(root), "{}").unwrap();
    }

    #[test]
    fn test_locate_from_nested_directory() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path());
        let nested = temp.path().join("mods/foo/dbc_sql");
        fs::create_dir_all(&nested).unwrap();

        let ws = Workspace::locate_from(&nested).unwrap();
        assert_eq!(ws.root.canonicalize().unwrap(), temp.path().canonicalize().unwrap());
    }

    #[test]
    fn test_locate_fails_outside_workspace() {
        let temp = TempDir::new().unwrap();
        assert!(Workspace::locate_from(temp.path()).is_err());
    }

    #[test]
    fn test_mods_sorted_ascending() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path());
        for name in ["zeta", "alpha", "Mid"] {
            fs::create_dir_all(paths::mod_dir(temp.path(), name)).unwrap();
        }
        // Stray file should be ignored
        fs::write(paths::mods_dir(temp.path()).join("README.txt"), "x").unwrap();

        let ws = Workspace::open(temp.path()).unwrap();
        assert_eq!(ws.mods().unwrap(), vec!["Mid", "alpha", "zeta"]);
    }

    #[test]
    fn test_selected_mods_filter() {
        let temp = TempDir::new().unwrap();
        init_workspace(temp.path());
        fs::create_dir_all(paths::mod_dir(temp.path(), "a")).unwrap();
        fs::create_dir_all(paths::mod_dir(temp.path(), "b")).unwrap();

        let ws = Workspace::open(temp.path()).unwrap();
        assert_eq!(ws.selected_mods(Some("b")).unwrap(), vec!["b"]);
        assert!(ws.selected_mods(Some("missing")).is_err());
    }

    #[test]
    fn test_valid_mod_names() {
        for name in ["m", "MyMod", "epoch-2", "raid_tuning", "a1"] {
            assert!(validate_mod_name(name).is_ok(), "{} should be valid", name);
        }
    }

    #[test]
    fn test_invalid_mod_names() {
        for name in ["", "1mod", "-dash", "has space", "ümlaut", "mod.name"] {
            assert!(validate_mod_name(name).is_err(), "{} should be invalid", name);
        }
    }

    #[test]
    fn test_reserved_mod_names() {
        for name in RESERVED_MOD_NAMES {
            assert!(validate_mod_name(name).is_err(), "{} should be reserved", name);
        }
    }
}
