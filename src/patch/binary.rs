//! Binary patch applicator.
//!
//! Each `mods/<name>/binary-edits/*.json` file describes byte writes into
//! the client executable: `{"patches": [{"address": "0x...", "bytes":
//! ["0x..", ...]}]}`. Addresses accept a `0x` prefix or raw hex. A patch
//! file applies once and is recorded in the tracker; re-runs skip it. The
//! first run captures a `<exe>.clean` backup and warns when its MD5 does
//! not match the known pristine client.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::paths;
use crate::tracker::{self, TrackerEntry, TrackerKind, TrackerSet};
use crate::workspace::Workspace;

/// The fixed-version client executable.
pub const CLIENT_EXE: &str = "Wow.exe";

/// MD5 of the pristine client executable this framework targets.
pub const PRISTINE_EXE_MD5: &str = "75ff1d46e96c7e16353cd1b9432dbcba";

#[derive(Debug, Deserialize)]
struct PatchFileJson {
    patches: Vec<PatchEntryJson>,
}

#[derive(Debug, Deserialize)]
struct PatchEntryJson {
    address: String,
    bytes: Vec<String>,
}

/// One decoded byte-write run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryPatch {
    pub address: u64,
    pub bytes: Vec<u8>,
}

fn parse_hex(text: &str) -> Result<u64> {
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16).with_context(|| format!("Invalid hex value '{}'", text))
}

/// Parse one binary-edit JSON file.
pub fn parse_patch_file(text: &str) -> Result<Vec<BinaryPatch>> {
    let parsed: PatchFileJson =
        serde_json::from_str(text).context("Malformed binary-edit file")?;
    let mut patches = Vec::with_capacity(parsed.patches.len());
    for entry in parsed.patches {
        let address = parse_hex(&entry.address)?;
        let mut bytes = Vec::with_capacity(entry.bytes.len());
        for b in &entry.bytes {
            let value = parse_hex(b)?;
            if value > 0xFF {
                bail!("Byte value '{}' out of range", b);
            }
            bytes.push(value as u8);
        }
        patches.push(BinaryPatch { address, bytes });
    }
    Ok(patches)
}

/// Apply byte writes to an in-memory image. Any write past the end of the
/// image is fatal. Returns the number of bytes written.
pub fn apply_patches(image: &mut [u8], patches: &[BinaryPatch]) -> Result<usize> {
    let mut written = 0;
    for patch in patches {
        for (index, &byte) in patch.bytes.iter().enumerate() {
            let at = patch.address as usize + index;
            if at >= image.len() {
                bail!(
                    "Write at 0x{:X} past end of executable ({} bytes)",
                    at,
                    image.len()
                );
            }
            image[at] = byte;
            written += 1;
        }
    }
    Ok(written)
}

/// Resolve the target executable under `client.path`.
pub fn locate_exe(workspace: &Workspace) -> Result<PathBuf> {
    let client = &workspace.config.client.path;
    if client.as_os_str().is_empty() {
        bail!("client.path is not configured");
    }
    let exe = client.join(CLIENT_EXE);
    if !exe.is_file() {
        bail!("Client executable not found at {}", exe.display());
    }
    Ok(exe)
}

pub fn backup_path(exe: &Path) -> PathBuf {
    let mut name = exe.file_name().unwrap_or_default().to_os_string();
    name.push(".clean");
    exe.with_file_name(name)
}

/// Capture a pristine backup on first contact; warn when its MD5 is not
/// the expected client build.
pub fn ensure_clean_backup(exe: &Path) -> Result<()> {
    let backup = backup_path(exe);
    if backup.is_file() {
        return Ok(());
    }
    fs::copy(exe, &backup)
        .with_context(|| format!("Cannot back up executable to {}", backup.display()))?;
    let digest = tracker::md5_hex(
        &fs::read(&backup).with_context(|| format!("Cannot read {}", backup.display()))?,
    );
    if digest != PRISTINE_EXE_MD5 {
        eprintln!(
            "Warning: {} has MD5 {} (expected pristine {}), backup may already be modified",
            exe.display(),
            digest,
            PRISTINE_EXE_MD5
        );
    }
    Ok(())
}

/// Restore the executable from its `.clean` backup and clear the tracker.
pub fn restore(workspace: &Workspace, exe: &Path) -> Result<()> {
    let backup = backup_path(exe);
    if !backup.is_file() {
        bail!("No backup at {}", backup.display());
    }
    fs::copy(&backup, exe)
        .with_context(|| format!("Cannot restore {}", exe.display()))?;

    let mut set = TrackerSet::load(&workspace.root, TrackerKind::BinaryEdits)?;
    set.applied.clear();
    set.save(&workspace.root, TrackerKind::BinaryEdits)?;
    Ok(())
}

/// One pending patch file discovered under a mod.
#[derive(Debug)]
pub struct PendingEdit {
    pub key: String,
    pub path: PathBuf,
}

/// Enumerate `binary-edits/*.json` across `mods`, in (mod, file) order.
pub fn discover(workspace: &Workspace, mods: &[String]) -> Result<Vec<PendingEdit>> {
    let mut edits = Vec::new();
    for mod_name in mods {
        let dir = paths::mod_tree::binary_edits_dir(&workspace.mod_dir(mod_name));
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
                if name.ends_with(".json") {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        for name in names {
            edits.push(PendingEdit {
                key: format!("{}/{}", mod_name, name),
                path: dir.join(&name),
            });
        }
    }
    Ok(edits)
}

#[derive(Debug, Default)]
pub struct BinaryStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Stage driver: apply every untracked binary-edit file.
///
/// With `force`, tracked files re-apply against the *current* executable -
/// the `.clean` backup is not restored first (use `patch --restore` for
/// that).
pub fn run(workspace: &Workspace, mods: &[String], force: bool) -> Result<BinaryStats> {
    run_with_exe(workspace, mods, force, None)
}

/// Like [`run`], but with an explicit target executable (the `patch`
/// command's positional override).
pub fn run_with_exe(
    workspace: &Workspace,
    mods: &[String],
    force: bool,
    exe_override: Option<&Path>,
) -> Result<BinaryStats> {
    let mut tracker = TrackerSet::load(&workspace.root, TrackerKind::BinaryEdits)?;
    let mut stats = BinaryStats::default();

    let mut pending = Vec::new();
    for edit in discover(workspace, mods)? {
        if !force && tracker.contains(&edit.key) {
            stats.skipped += 1;
            continue;
        }
        pending.push(edit);
    }
    if pending.is_empty() {
        return Ok(stats);
    }

    let exe = match exe_override {
        Some(path) => {
            if !path.is_file() {
                bail!("Executable not found at {}", path.display());
            }
            path.to_path_buf()
        }
        None => locate_exe(workspace)?,
    };
    ensure_clean_backup(&exe)?;

    let mut image =
        fs::read(&exe).with_context(|| format!("Cannot read {}", exe.display()))?;
    for edit in &pending {
        let text = fs::read_to_string(&edit.path)
            .with_context(|| format!("Cannot read {}", edit.path.display()))?;
        let patches =
            parse_patch_file(&text).with_context(|| format!("In {}", edit.path.display()))?;
        apply_patches(&mut image, &patches)
            .with_context(|| format!("In {}", edit.path.display()))?;
    }

    fs::write(&exe, &image).with_context(|| format!("Cannot write {}", exe.display()))?;
    for edit in &pending {
        tracker.upsert(TrackerEntry::new(&edit.key, None));
        stats.applied += 1;
    }
    tracker.save(&workspace.root, TrackerKind::BinaryEdits)?;

    Ok(stats)
}
