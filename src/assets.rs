//! Asset copier.
//!
//! A mod's `assets/config.json` is an array of `{source, destination}`
//! pairs. `source` is relative to the mod's `assets/` directory and doubles
//! as the tracker key; `destination` is a directory under the client
//! installation (`"."` for the client root). Unchanged files are skipped by
//! content fingerprint.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::paths;
use crate::tracker::{self, TrackerEntry, TrackerKind, TrackerSet};
use crate::workspace::Workspace;

#[derive(Debug, Clone, Deserialize)]
pub struct AssetPair {
    pub source: String,
    pub destination: String,
}

/// Load a mod's asset manifest; `None` when the mod ships no assets.
pub fn load_manifest(mod_dir: &Path) -> Result<Option<Vec<AssetPair>>> {
    let path = paths::mod_tree::assets_config(mod_dir);
    if !path.is_file() {
        return Ok(None);
    }
    let text =
        fs::read_to_string(&path).with_context(|| format!("Cannot read {}", path.display()))?;
    let pairs: Vec<AssetPair> = serde_json::from_str(&text)
        .with_context(|| format!("Malformed asset manifest {}", path.display()))?;
    Ok(Some(pairs))
}

#[derive(Debug, Default)]
pub struct AssetStats {
    pub copied: usize,
    pub skipped: usize,
}

/// Stage driver: copy changed assets of `mods` into the client tree.
pub fn run(workspace: &Workspace, mods: &[String], force: bool) -> Result<AssetStats> {
    let mut tracker = TrackerSet::load(&workspace.root, TrackerKind::Assets)?;
    let mut stats = AssetStats::default();
    let mut dirty = false;

    for mod_name in mods {
        let mod_dir = workspace.mod_dir(mod_name);
        let Some(pairs) = load_manifest(&mod_dir)? else {
            continue;
        };

        let client = &workspace.config.client.path;
        if client.as_os_str().is_empty() {
            bail!("client.path is not configured");
        }

        for pair in pairs {
            let source = paths::mod_tree::assets_dir(&mod_dir).join(&pair.source);
            let bytes = fs::read(&source)
                .with_context(|| format!("Cannot read asset {}", source.display()))?;
            let digest = tracker::md5_hex(&bytes);

            let key = format!("{}/{}", mod_name, pair.source);
            if !force {
                if let Some(entry) = tracker.get(&key) {
                    if entry.md5.as_deref() == Some(digest.as_str()) {
                        stats.skipped += 1;
                        continue;
                    }
                }
            }

            let file_name = source
                .file_name()
                .with_context(|| format!("Asset {} has no file name", source.display()))?;
            let dest_dir = if pair.destination == "." {
                client.clone()
            } else {
                client.join(&pair.destination)
            };
            fs::create_dir_all(&dest_dir)
                .with_context(|| format!("Cannot create {}", dest_dir.display()))?;
            let dest = dest_dir.join(file_name);
            fs::write(&dest, &bytes)
                .with_context(|| format!("Cannot write {}", dest.display()))?;

            tracker.upsert(TrackerEntry::new(&key, Some(digest)));
            stats.copied += 1;
            dirty = true;
        }
    }

    if dirty {
        tracker.save(&workspace.root, TrackerKind::Assets)?;
    }
    Ok(stats)
}
