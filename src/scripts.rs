//! Script deployer.
//!
//! C++ scripts under `mods/<name>/scripts/` are copied into the server's
//! scripts directory, skipping files whose content fingerprint is already
//! tracked. Each script must expose a `Register_...` entry point; the
//! deployer regenerates a deterministic `custom_script_loader.cpp` that
//! forward-declares every deployed symbol and calls them in deployment
//! order.
//!
//! Removal detection operates only over the set of mods actually processed
//! in the invocation - entries for unprocessed mods are never pruned.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::paths;
use crate::tracker::{self, TrackerEntry, TrackerKind, TrackerSet};
use crate::workspace::Workspace;

/// Deployed scripts and the generated loader share this extension.
pub const SCRIPT_EXT: &str = "cpp";

/// The generated aggregation stub.
pub const LOADER_FILE: &str = "custom_script_loader.cpp";

/// Tracker extra field carrying the script's registration symbol.
const SYMBOL_FIELD: &str = "symbol";

fn register_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*void\s+(Register_[A-Za-z0-9_]+)\s*\(\s*\)").unwrap())
}

/// First top-level `void Register_...()` declaration in a source file.
pub fn scan_register_symbol(source: &str) -> Option<String> {
    register_regex()
        .captures(source)
        .map(|c| c[1].to_string())
}

/// Deterministic loader source: header comment, forward declarations, one
/// entry function calling each symbol in deployment order. No timestamps.
pub fn generate_loader(symbols: &[String]) -> String {
    let mut out = String::new();
    out.push_str("// Generated by runeforge - do not edit.\n");
    out.push_str("// Re-run the build after adding or removing mod scripts.\n\n");
    for symbol in symbols {
        out.push_str(&format!("void {}();\n", symbol));
    }
    out.push_str("\nvoid AddCustomScripts()\n{\n");
    for symbol in symbols {
        out.push_str(&format!("    {}();\n", symbol));
    }
    out.push_str("}\n");
    out
}

#[derive(Debug, Default)]
pub struct ScriptStats {
    pub deployed: usize,
    pub skipped: usize,
    pub removed: usize,
    pub warned: usize,
}

impl ScriptStats {
    pub fn changed(&self) -> bool {
        self.deployed > 0 || self.removed > 0
    }
}

fn entry_mod(name: &str) -> &str {
    name.split('/').next().unwrap_or(name)
}

fn entry_symbol(entry: &TrackerEntry) -> Option<String> {
    entry
        .extra
        .get(SYMBOL_FIELD)
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Stage driver: deploy changed scripts of `mods`, purge removed ones, and
/// regenerate the loader stub when anything changed.
pub fn run(workspace: &Workspace, mods: &[String], force: bool) -> Result<ScriptStats> {
    let mut tracker = TrackerSet::load(&workspace.root, TrackerKind::Scripts)?;
    let mut stats = ScriptStats::default();

    // Scripts present on disk for the processed mods, in (mod, file) order.
    let mut present: Vec<(String, PathBuf)> = Vec::new();
    for mod_name in mods {
        let dir = paths::mod_tree::scripts_dir(&workspace.mod_dir(mod_name));
        if !dir.is_dir() {
            continue;
        }
        let mut names: Vec<String> = Vec::new();
        for entry in
            fs::read_dir(&dir).with_context(|| format!("Cannot read {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(&format!(".{}", SCRIPT_EXT)) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        for name in names {
            present.push((format!("{}/{}", mod_name, name), dir.join(&name)));
        }
    }

    let processed: HashSet<&str> = mods.iter().map(String::as_str).collect();
    let has_tracked_work = tracker
        .applied
        .iter()
        .any(|e| processed.contains(entry_mod(&e.name)));
    if present.is_empty() && !has_tracked_work {
        return Ok(stats);
    }

    let scripts_path = &workspace.config.server.scripts_path;
    if scripts_path.as_os_str().is_empty() {
        bail!("server.scripts_path is not configured");
    }
    fs::create_dir_all(scripts_path)
        .with_context(|| format!("Cannot create {}", scripts_path.display()))?;

    let mut present_keys = HashSet::new();
    for (key, path) in &present {
        let source = fs::read_to_string(path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        let Some(symbol) = scan_register_symbol(&source) else {
            eprintln!("Warning: {} has no Register_ entry point, skipping", key);
            stats.warned += 1;
            continue;
        };
        present_keys.insert(key.clone());

        let digest = tracker::md5_hex(source.as_bytes());
        if !force {
            if let Some(entry) = tracker.get(key) {
                if entry.md5.as_deref() == Some(digest.as_str()) {
                    stats.skipped += 1;
                    continue;
                }
            }
        }

        let file_name = path.file_name().unwrap_or_default();
        let dest = scripts_path.join(file_name);
        fs::copy(path, &dest)
            .with_context(|| format!("Cannot copy {} to {}", path.display(), dest.display()))?;

        let mut entry = TrackerEntry::new(key, Some(digest));
        entry
            .extra
            .insert(SYMBOL_FIELD.to_string(), serde_json::Value::String(symbol));
        tracker.upsert(entry);
        stats.deployed += 1;
    }

    // Purge entries whose source vanished - but only within the processed
    // mods; the destination file itself is left in place.
    let removed: Vec<String> = tracker
        .applied
        .iter()
        .filter(|e| processed.contains(entry_mod(&e.name)) && !present_keys.contains(&e.name))
        .map(|e| e.name.clone())
        .collect();
    for name in &removed {
        tracker.remove(name);
        stats.removed += 1;
    }

    if stats.changed() {
        let mut symbols = Vec::new();
        for entry in &tracker.applied {
            match entry_symbol(entry) {
                Some(symbol) => symbols.push(symbol),
                None => eprintln!(
                    "Warning: tracker entry {} has no recorded symbol, omitting from loader",
                    entry.name
                ),
            }
        }
        let loader = scripts_path.join(LOADER_FILE);
        fs::write(&loader, generate_loader(&symbols))
            .with_context(|| format!("Cannot write {}", loader.display()))?;

        tracker.save(&workspace.root, TrackerKind::Scripts)?;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn workspace_with_scripts_path(temp: &TempDir) -> Workspace {
        let scripts = temp.path().join("server/scripts/custom");
        fs::write(
            paths::config_file(temp.path()),
            format!(r#"{{"server": {{"scripts_path": "{}"}}}}"#, scripts.display()),
        )
        .unwrap();
        Workspace::open(temp.path()).unwrap()
    }

    fn add_script(root: &Path, mod_name: &str, file: &str, symbol: &str) {
        let dir = paths::mod_tree::scripts_dir(&paths::mod_dir(root, mod_name));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join(file),
            format!("#include \"ScriptMgr.h\"\n\nvoid {}()\n{{\n}}\n", symbol),
        )
        .unwrap();
    }

    #[test]
    fn test_scan_register_symbol() {
        let src = "#include \"X.h\"\n\nvoid Register_npc_tuner()\n{\n}\n";
        assert_eq!(
            scan_register_symbol(src).as_deref(),
            Some("Register_npc_tuner")
        );
        assert_eq!(scan_register_symbol("int main() {}"), None);
        // Indented declarations still count as entry points.
        assert_eq!(
            scan_register_symbol("  void Register_x ()"),
            Some("Register_x".to_string())
        );
    }

    #[test]
    fn test_generate_loader_is_deterministic() {
        let symbols = vec!["Register_a".to_string(), "Register_b".to_string()];
        let first = generate_loader(&symbols);
        let second = generate_loader(&symbols);
        assert_eq!(first, second);
        assert!(first.contains("void Register_a();"));
        assert!(first.contains("    Register_b();"));
        assert!(first.contains("void AddCustomScripts()"));
    }

    #[test]
    fn test_deploy_and_loader() {
        let temp = TempDir::new().unwrap();
        let ws = workspace_with_scripts_path(&temp);
        add_script(temp.path(), "m", "npc_tuner.cpp", "Register_npc_tuner");

        let stats = run(&ws, &["m".to_string()], false).unwrap();
        assert_eq!(stats.deployed, 1);

        let scripts = &ws.config.server.scripts_path;
        assert!(scripts.join("npc_tuner.cpp").is_file());
        let loader = fs::read_to_string(scripts.join(LOADER_FILE)).unwrap();
        assert!(loader.contains("Register_npc_tuner();"));
    }

    #[test]
    fn test_unchanged_script_skipped_and_loader_untouched() {
        let temp = TempDir::new().unwrap();
        let ws = workspace_with_scripts_path(&temp);
        add_script(temp.path(), "m", "a.cpp", "Register_a");
        run(&ws, &["m".to_string()], false).unwrap();

        let loader = ws.config.server.scripts_path.join(LOADER_FILE);
        fs::remove_file(&loader).unwrap();

        let stats = run(&ws, &["m".to_string()], false).unwrap();
        assert_eq!(stats.deployed, 0);
        assert_eq!(stats.skipped, 1);
        // Nothing changed, so the loader is not rewritten.
        assert!(!loader.exists());
    }

    #[test]
    fn test_script_without_symbol_warns_and_skips() {
        let temp = TempDir::new().unwrap();
        let ws = workspace_with_scripts_path(&temp);
        let dir = paths::mod_tree::scripts_dir(&paths::mod_dir(temp.path(), "m"));
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("helper.cpp"), "static int x = 1;\n").unwrap();

        let stats = run(&ws, &["m".to_string()], false).unwrap();
        assert_eq!(stats.warned, 1);
        assert_eq!(stats.deployed, 0);
        assert!(!ws.config.server.scripts_path.join("helper.cpp").exists());
    }

    #[test]
    fn test_removed_script_purged_and_loader_rewritten() {
        let temp = TempDir::new().unwrap();
        let ws = workspace_with_scripts_path(&temp);
        add_script(temp.path(), "m", "a.cpp", "Register_a");
        add_script(temp.path(), "m", "b.cpp", "Register_b");
        run(&ws, &["m".to_string()], false).unwrap();

        let dir = paths::mod_tree::scripts_dir(&paths::mod_dir(temp.path(), "m"));
        fs::remove_file(dir.join("a.cpp")).unwrap();

        let stats = run(&ws, &["m".to_string()], false).unwrap();
        assert_eq!(stats.removed, 1);

        let loader =
            fs::read_to_string(ws.config.server.scripts_path.join(LOADER_FILE)).unwrap();
        assert!(!loader.contains("Register_a"));
        assert!(loader.contains("Register_b();"));
        // Deployed file stays in place; only the tracker entry is purged.
        assert!(ws.config.server.scripts_path.join("a.cpp").is_file());
    }

    #[test]
    fn test_unprocessed_mods_are_not_pruned() {
        let temp = TempDir::new().unwrap();
        let ws = workspace_with_scripts_path(&temp);
        add_script(temp.path(), "a", "a.cpp", "Register_a");
        add_script(temp.path(), "b", "b.cpp", "Register_b");
        run(&ws, &["a".to_string(), "b".to_string()], false).unwrap();

        // Process only mod "a"; mod "b"'s entry must survive even though its
        // file is not in the processed set.
        add_script(temp.path(), "a", "a.cpp", "Register_a2");
        let stats = run(&ws, &["a".to_string()], false).unwrap();
        assert_eq!(stats.removed, 0);

        let loader =
            fs::read_to_string(ws.config.server.scripts_path.join(LOADER_FILE)).unwrap();
        assert!(loader.contains("Register_a2();"));
        assert!(loader.contains("Register_b();"));
    }

    #[test]
    fn test_deployment_order_is_stable() {
        let temp = TempDir::new().unwrap();
        let ws = workspace_with_scripts_path(&temp);
        add_script(temp.path(), "m", "z_late.cpp", "Register_z");
        run(&ws, &["m".to_string()], false).unwrap();
        add_script(temp.path(), "m", "a_early.cpp", "Register_a");
        run(&ws, &["m".to_string()], false).unwrap();

        let loader =
            fs::read_to_string(ws.config.server.scripts_path.join(LOADER_FILE)).unwrap();
        // z deployed first, so it is called first even though a sorts earlier.
        let z_at = loader.find("    Register_z();").unwrap();
        let a_at = loader.find("    Register_a();").unwrap();
        assert!(z_at < a_at);
    }
}
