//! `runeforge extract` - populate baseline trees, or copy a baseline file
//! into a mod as an editing starting point.
//!
//! Baselines are populated from an explicit `--source` directory (the
//! operator's unpacked client data); the framework does not read the
//! client's own archives.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::paths;
use crate::workspace::Workspace;

#[derive(Debug, Default)]
pub struct ExtractArgs {
    pub dbc: bool,
    pub luaxml: bool,
    pub source: Option<PathBuf>,
    pub filter: Option<String>,
    pub mod_name: Option<String>,
    pub dest: Option<String>,
}

fn matches_filter(name: &str, filter: Option<&str>) -> bool {
    match filter {
        Some(prefix) => name.starts_with(prefix),
        None => true,
    }
}

/// Copy `source` tree into `baseline`, preserving relative paths.
fn populate_baseline(source: &Path, baseline: &Path, filter: Option<&str>) -> Result<usize> {
    if !source.is_dir() {
        bail!("Source directory {} does not exist", source.display());
    }
    let mut copied = 0;
    for entry in WalkDir::new(source) {
        let entry = entry.with_context(|| format!("Cannot walk {}", source.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let Some(name) = rel.to_str() else { continue };
        if !matches_filter(name, filter) {
            continue;
        }
        let dest = baseline.join(rel);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        fs::copy(entry.path(), &dest)
            .with_context(|| format!("Cannot copy {}", entry.path().display()))?;
        copied += 1;
    }
    Ok(copied)
}

/// Copy one baseline file into a mod tree.
fn copy_into_mod(
    workspace: &Workspace,
    baseline: &Path,
    mod_name: &str,
    rel: &str,
    into_luaxml: bool,
) -> Result<PathBuf> {
    let mod_dir = workspace.mod_dir(mod_name);
    if !mod_dir.is_dir() {
        bail!("Mod '{}' does not exist", mod_name);
    }
    let source = baseline.join(rel);
    if !source.is_file() {
        bail!("Baseline file {} does not exist", source.display());
    }
    let dest = if into_luaxml {
        paths::mod_tree::luaxml_dir(&mod_dir).join(rel)
    } else {
        mod_dir.join(rel)
    };
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    fs::copy(&source, &dest)
        .with_context(|| format!("Cannot copy {}", source.display()))?;
    Ok(dest)
}

pub fn execute(args: ExtractArgs) -> Result<()> {
    if args.dbc == args.luaxml {
        bail!("Pass exactly one of --dbc or --luaxml");
    }
    let workspace = Workspace::locate()?;
    let baseline = if args.dbc {
        paths::shared::dbc_baseline_dir(&workspace.root)
    } else {
        paths::shared::luaxml_baseline_dir(&workspace.root)
    };

    match (&args.mod_name, &args.dest) {
        (Some(mod_name), Some(dest)) => {
            let copied = copy_into_mod(&workspace, &baseline, mod_name, dest, args.luaxml)?;
            println!("   ✓ {}", copied.display());
        }
        (Some(_), None) | (None, Some(_)) => {
            bail!("--mod and --dest must be used together");
        }
        (None, None) => {
            let source = args
                .source
                .context("--source is required to populate the baseline")?;
            fs::create_dir_all(&baseline)
                .with_context(|| format!("Cannot create {}", baseline.display()))?;
            let copied = populate_baseline(&source, &baseline, args.filter.as_deref())?;
            println!("   ✓ {} file(s) -> {}", copied, baseline.display());
        }
    }
    Ok(())
}
