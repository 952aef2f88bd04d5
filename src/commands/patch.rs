//! `runeforge patch` - drive the binary patch applicator directly.
//!
//! Without flags this applies pending binary edits exactly like the build's
//! binary stage. `--list` shows every edit and its tracker state,
//! `--dry-run` validates without writing, `--restore` puts the `.clean`
//! backup back and clears the tracker.

use anyhow::{Context, Result};
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

use crate::patch::binary;
use crate::tracker::{TrackerKind, TrackerSet};
use crate::workspace::Workspace;

pub fn execute(
    exe_path: Option<PathBuf>,
    list: bool,
    dry_run: bool,
    restore: bool,
) -> Result<()> {
    let workspace = Workspace::locate()?;
    let mods = workspace.mods()?;

    if restore {
        let exe = match exe_path {
            Some(path) => path,
            None => binary::locate_exe(&workspace)?,
        };
        binary::restore(&workspace, &exe)?;
        println!("   ✓ restored {}", exe.display());
        return Ok(());
    }

    if list {
        let tracker = TrackerSet::load(&workspace.root, TrackerKind::BinaryEdits)?;
        let edits = binary::discover(&workspace, &mods)?;
        if edits.is_empty() {
            println!("No binary edits in this workspace");
            return Ok(());
        }
        for edit in edits {
            let text = fs::read_to_string(&edit.path)
                .with_context(|| format!("Cannot read {}", edit.path.display()))?;
            let patches = binary::parse_patch_file(&text)
                .with_context(|| format!("In {}", edit.path.display()))?;
            let state = if tracker.contains(&edit.key) {
                "applied".green()
            } else {
                "pending".yellow()
            };
            println!("   {} [{}] {} patch run(s)", edit.key, state, patches.len());
        }
        return Ok(());
    }

    if dry_run {
        let exe = match exe_path {
            Some(path) => path,
            None => binary::locate_exe(&workspace)?,
        };
        let size = fs::metadata(&exe)
            .with_context(|| format!("Cannot stat {}", exe.display()))?
            .len() as usize;
        let mut image = vec![0u8; size];
        for edit in binary::discover(&workspace, &mods)? {
            let text = fs::read_to_string(&edit.path)
                .with_context(|| format!("Cannot read {}", edit.path.display()))?;
            let patches = binary::parse_patch_file(&text)
                .with_context(|| format!("In {}", edit.path.display()))?;
            let written = binary::apply_patches(&mut image, &patches)
                .with_context(|| format!("In {}", edit.path.display()))?;
            println!("   ✓ {} would write {} byte(s)", edit.key, written);
        }
        return Ok(());
    }

    let stats = binary::run_with_exe(&workspace, &mods, false, exe_path.as_deref())?;
    println!("   applied {}, skipped {}", stats.applied, stats.skipped);
    Ok(())
}
