//! Single source of truth for ALL Runeforge filesystem layout.
//!
//! This module defines WHERE data lives. It has no I/O, no validation,
//! no business logic. One file shows the entire filesystem layout.
//!
//! # Workspace layout
//!
//! ```text
//! workspace/
//! ├── runeforge.json                       # Workspace config
//! ├── mods/<name>/                         # One directory per mod
//! │   ├── dbc_sql/                         # Migrations for the DBC database
//! │   ├── world_sql/                       # Migrations for the world database
//! │   ├── scripts/                         # C++ server scripts
//! │   ├── server-patches/                  # Unified diffs for the server source
//! │   ├── binary-edits/                    # Byte patches for the client exe
//! │   ├── assets/                          # Files copied into the client tree
//! │   └── luaxml/                          # Client UI overlay tree
//! ├── shared/                              # Cross-mod state
//! │   ├── migrations_applied/<mod>/<db>/   # Applied-migration markers
//! │   ├── <kind>_applied.json              # Tracker files
//! │   ├── dbc/baseline/                    # Pristine DBC files
//! │   └── luaxml/baseline/                 # Pristine UI overlay tree
//! └── build/                               # Build outputs (rebuildable)
//!     └── dbc/                             # Exported DBC files
//! ```

use std::path::{Path, PathBuf};

/// Workspace configuration file name. Its presence marks the workspace root.
pub const CONFIG_FILE: &str = "runeforge.json";

/// Workspace config file: `runeforge.json`
pub fn config_file(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

/// Mod container directory: `mods/`
pub fn mods_dir(root: &Path) -> PathBuf {
    root.join("mods")
}

/// A single mod's directory: `mods/<name>/`
pub fn mod_dir(root: &Path, name: &str) -> PathBuf {
    mods_dir(root).join(name)
}

/// Cross-mod state directory: `shared/`
pub fn shared_dir(root: &Path) -> PathBuf {
    root.join("shared")
}

/// Build output directory (rebuildable): `build/`
pub fn build_dir(root: &Path) -> PathBuf {
    root.join("build")
}

/// Per-mod artifact paths, relative to a mod directory.
pub mod mod_tree {
    use super::*;

    /// Migration directory for a database: `mods/<name>/<db>_sql/`
    pub fn sql_dir(mod_dir: &Path, db_tag: &str) -> PathBuf {
        mod_dir.join(format!("{}_sql", db_tag))
    }

    /// Server scripts: `mods/<name>/scripts/`
    pub fn scripts_dir(mod_dir: &Path) -> PathBuf {
        mod_dir.join("scripts")
    }

    /// Unified diffs for the server source: `mods/<name>/server-patches/`
    pub fn server_patches_dir(mod_dir: &Path) -> PathBuf {
        mod_dir.join("server-patches")
    }

    /// Client binary edits: `mods/<name>/binary-edits/`
    pub fn binary_edits_dir(mod_dir: &Path) -> PathBuf {
        mod_dir.join("binary-edits")
    }

    /// Client asset files: `mods/<name>/assets/`
    pub fn assets_dir(mod_dir: &Path) -> PathBuf {
        mod_dir.join("assets")
    }

    /// Asset manifest: `mods/<name>/assets/config.json`
    pub fn assets_config(mod_dir: &Path) -> PathBuf {
        assets_dir(mod_dir).join("config.json")
    }

    /// UI overlay tree: `mods/<name>/luaxml/`
    pub fn luaxml_dir(mod_dir: &Path) -> PathBuf {
        mod_dir.join("luaxml")
    }
}

/// Shared (cross-mod) state paths.
pub mod shared {
    use super::*;

    /// Applied-migration marker root: `shared/migrations_applied/`
    pub fn migrations_applied_dir(root: &Path) -> PathBuf {
        shared_dir(root).join("migrations_applied")
    }

    /// Marker directory for one (mod, db): `shared/migrations_applied/<mod>/<db>/`
    pub fn marker_dir(root: &Path, mod_name: &str, db_tag: &str) -> PathBuf {
        migrations_applied_dir(root).join(mod_name).join(db_tag)
    }

    /// Marker file for one applied migration:
    /// `shared/migrations_applied/<mod>/<db>/<file>.applied`
    pub fn marker_file(root: &Path, mod_name: &str, db_tag: &str, file_name: &str) -> PathBuf {
        marker_dir(root, mod_name, db_tag).join(format!("{}.applied", file_name))
    }

    /// Tracker file for an artifact kind: `shared/<kind>_applied.json`
    pub fn tracker_file(root: &Path, kind_tag: &str) -> PathBuf {
        shared_dir(root).join(format!("{}_applied.json", kind_tag))
    }

    /// Pristine DBC files: `shared/dbc/baseline/`
    pub fn dbc_baseline_dir(root: &Path) -> PathBuf {
        shared_dir(root).join("dbc").join("baseline")
    }

    /// Pristine UI overlay tree: `shared/luaxml/baseline/`
    pub fn luaxml_baseline_dir(root: &Path) -> PathBuf {
        shared_dir(root).join("luaxml").join("baseline")
    }
}

/// Build output paths.
pub mod build {
    use super::*;

    /// Exported DBC files: `build/dbc/`
    pub fn dbc_out_dir(root: &Path) -> PathBuf {
        build_dir(root).join("dbc")
    }
}

/// External client installation paths.
pub mod client {
    use super::*;

    /// The client's archive data directory: `<client>/Data/`
    pub fn data_dir(client_path: &Path) -> PathBuf {
        client_path.join("Data")
    }

    /// The client's locale data directory: `<client>/Data/<locale>/`
    pub fn locale_dir(client_path: &Path, locale: &str) -> PathBuf {
        data_dir(client_path).join(locale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_layout() {
        let root = Path::new("/tmp/ws");

        assert_eq!(config_file(root), PathBuf::from("/tmp/ws/runeforge.json"));
        assert_eq!(mod_dir(root, "epochs"), PathBuf::from("/tmp/ws/mods/epochs"));
        assert_eq!(build::dbc_out_dir(root), PathBuf::from("/tmp/ws/build/dbc"));
    }

    #[test]
    fn test_marker_file_layout() {
        let root = Path::new("/tmp/ws");
        let marker = shared::marker_file(root, "m", "dbc", "20250101_000000_add.sql");
        assert_eq!(
            marker,
            PathBuf::from("/tmp/ws/shared/migrations_applied/m/dbc/20250101_000000_add.sql.applied")
        );
    }

    #[test]
    fn test_tracker_file_layout() {
        let root = Path::new("/tmp/ws");
        assert_eq!(
            shared::tracker_file(root, "binary_edits"),
            PathBuf::from("/tmp/ws/shared/binary_edits_applied.json")
        );
    }

    #[test]
    fn test_client_paths() {
        let client = Path::new("/games/client");
        assert_eq!(
            client::locale_dir(client, "enUS"),
            PathBuf::from("/games/client/Data/enUS")
        );
    }
}
