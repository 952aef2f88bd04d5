//! Tracker store - per-artifact-kind "applied" sets under `shared/`.
//!
//! Trackers record single-shot artifacts (binary edits, server patches,
//! assets, scripts). A missing tracker file is an empty set, never an
//! error. Saves rewrite the file in full; the build is single-threaded per
//! invocation so there is no concurrent-write handling. Unknown JSON fields
//! are preserved across rewrites for forward compatibility.

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::paths;

/// Hex MD5 of a byte buffer - the content fingerprint trackers store.
pub fn md5_hex(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// The artifact kinds with a tracker file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerKind {
    BinaryEdits,
    ServerPatches,
    Assets,
    Scripts,
}

impl TrackerKind {
    /// File name stem: `shared/<tag>_applied.json`.
    pub fn tag(&self) -> &'static str {
        match self {
            TrackerKind::BinaryEdits => "binary_edits",
            TrackerKind::ServerPatches => "server_patches",
            TrackerKind::Assets => "assets",
            TrackerKind::Scripts => "scripts",
        }
    }
}

/// One applied artifact.
///
/// `name` is `<mod>/<artifact>`. Artifacts whose content may change while
/// the identifier stays stable (assets, scripts) carry `md5`; monolithic
/// one-shots (binary edits, source patches) omit it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TrackerEntry {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub applied_at: String,
    pub applied_by: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TrackerEntry {
    /// A fresh entry stamped with the current time and user.
    pub fn new(name: &str, md5: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            md5,
            version: None,
            applied_at: Utc::now().to_rfc3339(),
            applied_by: std::env::var("USER").unwrap_or_else(|_| "unknown".to_string()),
            extra: serde_json::Map::new(),
        }
    }
}

/// The applied set for one artifact kind.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackerSet {
    #[serde(default)]
    pub applied: Vec<TrackerEntry>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl TrackerSet {
    /// Load the tracker for `kind`; a missing file yields an empty set.
    pub fn load(root: &Path, kind: TrackerKind) -> Result<Self> {
        let path = paths::shared::tracker_file(root, kind.tag());
        if !path.is_file() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Malformed tracker {}", path.display()))
    }

    /// Rewrite the tracker file in full, creating `shared/` if missing.
    pub fn save(&self, root: &Path, kind: TrackerKind) -> Result<()> {
        let path = paths::shared::tracker_file(root, kind.tag());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("Cannot serialize tracker")?;
        fs::write(&path, text).with_context(|| format!("Cannot write {}", path.display()))?;
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&TrackerEntry> {
        self.applied.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace the entry with the same name, or append. Appending preserves
    /// the original application order, which the script deployer relies on.
    pub fn upsert(&mut self, entry: TrackerEntry) {
        match self.applied.iter_mut().find(|e| e.name == entry.name) {
            Some(existing) => *existing = entry,
            None => self.applied.push(entry),
        }
    }

    /// Remove by name; returns whether an entry was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.applied.len();
        self.applied.retain(|e| e.name != name);
        self.applied.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_is_empty_set() {
        let temp = TempDir::new().unwrap();
        let set = TrackerSet::load(temp.path(), TrackerKind::Assets).unwrap();
        assert!(set.applied.is_empty());
    }

    #[test]
    fn test_save_load_round_trip() {
        let temp = TempDir::new().unwrap();
        let mut set = TrackerSet::default();
        set.upsert(TrackerEntry::new("m/p.json", None));
        set.upsert(TrackerEntry::new("m/icon.blp", Some("d41d8cd9".to_string())));
        set.save(temp.path(), TrackerKind::BinaryEdits).unwrap();

        let loaded = TrackerSet::load(temp.path(), TrackerKind::BinaryEdits).unwrap();
        assert_eq!(loaded.applied.len(), 2);
        assert!(loaded.contains("m/p.json"));
        assert_eq!(loaded.get("m/icon.blp").unwrap().md5.as_deref(), Some("d41d8cd9"));
    }

    #[test]
    fn test_unknown_fields_survive_rewrite() {
        let temp = TempDir::new().unwrap();
        let path = paths::shared::tracker_file(temp.path(), TrackerKind::Scripts.tag());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(
            &path,
            r#"{"applied":[{"name":"m/a.cpp","applied_at":"2025-01-01T00:00:00Z","applied_by":"ci","future_field":42}],"tool_version":"9.9"}"#,
        )
        .unwrap();

        let mut set = TrackerSet::load(temp.path(), TrackerKind::Scripts).unwrap();
        set.upsert(TrackerEntry::new("m/b.cpp", Some("abc".to_string())));
        set.save(temp.path(), TrackerKind::Scripts).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("future_field"));
        assert!(text.contains("tool_version"));
    }

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut set = TrackerSet::default();
        set.upsert(TrackerEntry::new("m/a", Some("v1".to_string())));
        set.upsert(TrackerEntry::new("m/b", None));
        set.upsert(TrackerEntry::new("m/a", Some("v2".to_string())));

        assert_eq!(set.applied.len(), 2);
        // Order preserved: a before b
        assert_eq!(set.applied[0].name, "m/a");
        assert_eq!(set.applied[0].md5.as_deref(), Some("v2"));
    }

    #[test]
    fn test_remove() {
        let mut set = TrackerSet::default();
        set.upsert(TrackerEntry::new("m/a", None));
        assert!(set.remove("m/a"));
        assert!(!set.remove("m/a"));
        assert!(set.applied.is_empty());
    }
}
