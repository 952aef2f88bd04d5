//! Overlay delta discovery.
//!
//! Each mod's `luaxml/` tree mirrors the layout expected inside the locale
//! archive. Discovery walks every mod's tree, compares bytes against the
//! same relative path under `shared/luaxml/baseline/`, and keeps the files
//! that are new or differ. Mods are walked in ascending name order and
//! entries overwrite, so the lexicographically later mod wins a conflict.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::paths;
use crate::workspace::Workspace;

/// Files whose bytes differ from the baseline, keyed by slash-separated
/// relative path. The map value is the winning source file.
#[derive(Debug, Default)]
pub struct OverlayDelta {
    pub files: BTreeMap<String, PathBuf>,
}

impl OverlayDelta {
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

/// Entries that never ship: dotfiles and editor/platform droppings.
fn skip_entry(name: &str) -> bool {
    name.starts_with('.') || name.eq_ignore_ascii_case("Thumbs.db")
}

fn relative_key(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .filter_map(|c| c.as_os_str().to_str())
        .collect();
    Some(parts.join("/"))
}

/// Whether `candidate` differs byte-wise from `baseline` (missing baseline
/// counts as different).
fn differs(candidate: &Path, baseline: &Path) -> Result<bool> {
    if !baseline.is_file() {
        return Ok(true);
    }
    let a = fs::read(candidate)
        .with_context(|| format!("Cannot read {}", candidate.display()))?;
    let b = fs::read(baseline)
        .with_context(|| format!("Cannot read {}", baseline.display()))?;
    Ok(a != b)
}

/// Collect all shippable files under one mod's overlay tree.
fn collect_tree(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    if !dir.is_dir() {
        return Ok(files);
    }
    for entry in WalkDir::new(dir) {
        let entry = entry.with_context(|| format!("Cannot walk {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if skip_entry(&name) {
            continue;
        }
        if let Some(key) = relative_key(dir, entry.path()) {
            files.push((key, entry.path().to_path_buf()));
        }
    }
    Ok(files)
}

/// Count all shippable overlay files of one mod (for `status`).
pub fn count_files(mod_dir: &Path) -> Result<usize> {
    Ok(collect_tree(&paths::mod_tree::luaxml_dir(mod_dir))?.len())
}

/// Discover the overlay delta across `mods` (already sorted ascending).
pub fn discover(workspace: &Workspace, mods: &[String]) -> Result<OverlayDelta> {
    let baseline_dir = paths::shared::luaxml_baseline_dir(&workspace.root);
    let mut delta = OverlayDelta::default();

    for mod_name in mods {
        let tree = paths::mod_tree::luaxml_dir(&workspace.mod_dir(mod_name));
        for (key, path) in collect_tree(&tree)? {
            let baseline = baseline_dir.join(key.replace('/', std::path::MAIN_SEPARATOR_STR));
            if differs(&path, &baseline)? {
                // Later mods overwrite earlier ones.
                delta.files.insert(key, path);
            } else {
                // A later mod shipping baseline bytes cancels an earlier win.
                delta.files.remove(&key);
            }
        }
    }

    Ok(delta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace(temp: &TempDir) -> Workspace {
        fs::write(paths::config_file(temp.path()), "{}").unwrap();
        Workspace::open(temp.path()).unwrap()
    }

    fn write_overlay(root: &Path, mod_name: &str, rel: &str, content: &str) {
        let path = paths::mod_tree::luaxml_dir(&paths::mod_dir(root, mod_name)).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn write_baseline(root: &Path, rel: &str, content: &str) {
        let path = paths::shared::luaxml_baseline_dir(root).join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn test_new_file_is_included() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        write_overlay(temp.path(), "a", "Interface/FrameXML/new.lua", "x");

        let delta = discover(&ws, &["a".to_string()]).unwrap();
        assert_eq!(delta.len(), 1);
        assert!(delta.files.contains_key("Interface/FrameXML/new.lua"));
    }

    #[test]
    fn test_identical_file_is_excluded() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        write_baseline(temp.path(), "I/x.lua", "same");
        write_overlay(temp.path(), "a", "I/x.lua", "same");

        let delta = discover(&ws, &["a".to_string()]).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_later_mod_wins_conflict() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        write_baseline(temp.path(), "I/x.lua", "base");
        write_overlay(temp.path(), "a", "I/x.lua", "a");
        write_overlay(temp.path(), "b", "I/x.lua", "b");

        let delta = discover(&ws, &["a".to_string(), "b".to_string()]).unwrap();
        assert_eq!(delta.len(), 1);
        let winner = &delta.files["I/x.lua"];
        assert_eq!(fs::read_to_string(winner).unwrap(), "b");
    }

    #[test]
    fn test_dotfiles_and_thumbs_are_skipped() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        write_overlay(temp.path(), "a", ".DS_Store", "junk");
        write_overlay(temp.path(), "a", "I/Thumbs.db", "junk");
        write_overlay(temp.path(), "a", "I/real.xml", "<Ui/>");

        let delta = discover(&ws, &["a".to_string()]).unwrap();
        assert_eq!(delta.len(), 1);
        assert!(delta.files.contains_key("I/real.xml"));
    }

    #[test]
    fn test_later_mod_restoring_baseline_cancels_earlier_win() {
        let temp = TempDir::new().unwrap();
        let ws = workspace(&temp);
        write_baseline(temp.path(), "I/x.lua", "base");
        write_overlay(temp.path(), "a", "I/x.lua", "changed");
        write_overlay(temp.path(), "b", "I/x.lua", "base");

        let delta = discover(&ws, &["a".to_string(), "b".to_string()]).unwrap();
        assert!(delta.is_empty());
    }

    #[test]
    fn test_count_files() {
        let temp = TempDir::new().unwrap();
        write_overlay(temp.path(), "a", "I/x.lua", "1");
        write_overlay(temp.path(), "a", "I/sub/y.xml", "2");
        write_overlay(temp.path(), "a", ".hidden", "3");

        let count = count_files(&paths::mod_dir(temp.path(), "a")).unwrap();
        assert_eq!(count, 2);
    }
}
