//! Source patch applicator.
//!
//! Unified diffs under `mods/<name>/server-patches/` are applied to the
//! external server source tree via the `patch` tool. Every file is checked
//! with a dry run first; a diff that no longer applies is a warning, not a
//! build failure.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::paths;
use crate::tracker::{TrackerEntry, TrackerKind, TrackerSet};
use crate::workspace::Workspace;

/// Locate the `patch` tool on PATH.
pub fn patch_tool() -> Result<PathBuf> {
    which::which("patch").context("The 'patch' tool is not on PATH")
}

fn patch_command(tool: &Path, source_dir: &Path, patch_file: &Path, dry_run: bool) -> Command {
    let mut cmd = Command::new(tool);
    cmd.arg("-p1").arg("-N").arg("-s");
    if dry_run {
        cmd.arg("--dry-run");
    }
    cmd.arg("-d").arg(source_dir).arg("-i").arg(patch_file);
    cmd
}

/// Dry-run check: does this diff still apply cleanly?
pub fn check_applies(tool: &Path, source_dir: &Path, patch_file: &Path) -> Result<bool> {
    let status = patch_command(tool, source_dir, patch_file, true)
        .status()
        .with_context(|| format!("Cannot run {}", tool.display()))?;
    Ok(status.success())
}

fn apply(tool: &Path, source_dir: &Path, patch_file: &Path) -> Result<()> {
    let status = patch_command(tool, source_dir, patch_file, false)
        .status()
        .with_context(|| format!("Cannot run {}", tool.display()))?;
    if !status.success() {
        bail!(
            "patch failed for {} (it passed the dry run)",
            patch_file.display()
        );
    }
    Ok(())
}

#[derive(Debug, Default)]
pub struct SourcePatchStats {
    pub applied: usize,
    pub skipped: usize,
    pub warned: usize,
}

/// Stage driver: apply every untracked `*.patch` across `mods`.
pub fn run(workspace: &Workspace, mods: &[String], force: bool) -> Result<SourcePatchStats> {
    let mut tracker = TrackerSet::load(&workspace.root, TrackerKind::ServerPatches)?;
    let mut stats = SourcePatchStats::default();

    // (key, path) pairs in (mod, file) order.
    let mut pending = Vec::new();
    for mod_name in mods {
        let dir = paths::mod_tree::server_patches_dir(&workspace.mod_dir(mod_name));
        if !dir.is_dir() {
            continue;
        }
        let mut names: Vec<String> = Vec::new();
        for entry in
            std::fs::read_dir(&dir).with_context(|| format!("Cannot read {}", dir.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(".patch") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        for name in names {
            let key = format!("{}/{}", mod_name, name);
            if !force && tracker.contains(&key) {
                stats.skipped += 1;
                continue;
            }
            pending.push((key, dir.join(&name)));
        }
    }
    if pending.is_empty() {
        return Ok(stats);
    }

    let source_dir = &workspace.config.server.source_path;
    if source_dir.as_os_str().is_empty() {
        bail!("server.source_path is not configured");
    }
    if !source_dir.is_dir() {
        bail!("server.source_path {} does not exist", source_dir.display());
    }
    let tool = patch_tool()?;

    for (key, path) in &pending {
        if !check_applies(&tool, source_dir, path)? {
            eprintln!("Warning: {} does not apply cleanly, skipping", key);
            stats.warned += 1;
            continue;
        }
        apply(&tool, source_dir, path)?;
        tracker.upsert(TrackerEntry::new(key, None));
        stats.applied += 1;
    }
    tracker.save(&workspace.root, TrackerKind::ServerPatches)?;

    Ok(stats)
}
