//! Migration engine - per-(mod, database) discovery, apply, drift
//! re-apply, rollback.
//!
//! A migration is a pair of files in `mods/<name>/<db>_sql/`:
//! `<ts>_<desc>.sql` and optional `<ts>_<desc>.rollback.sql`. An empty
//! marker file under `shared/migrations_applied/` records application; the
//! marker's mtime is meaningful - an apply file newer than its marker means
//! the migration drifted and is rolled back then re-applied.
//!
//! Markers are written only after the apply script succeeds, and deleted
//! only after the rollback script succeeds, so a crashed run converges on
//! the next invocation.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::db::SqlRunner;
use crate::paths;

/// The two migration-bearing databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbKind {
    Dbc,
    World,
}

impl DbKind {
    /// Marker directory tag.
    pub fn tag(&self) -> &'static str {
        match self {
            DbKind::Dbc => "dbc",
            DbKind::World => "world",
        }
    }

    /// Per-mod migration directory name.
    pub fn sql_dir_name(&self) -> &'static str {
        match self {
            DbKind::Dbc => "dbc_sql",
            DbKind::World => "world_sql",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "dbc" => Some(DbKind::Dbc),
            "world" => Some(DbKind::World),
            _ => None,
        }
    }
}

/// One discovered migration.
#[derive(Debug, Clone)]
pub struct Migration {
    pub file_name: String,
    pub path: PathBuf,
    /// Present only if the paired `.rollback.sql` file exists.
    pub rollback: Option<PathBuf>,
}

/// Classification of a migration against its marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationState {
    /// Marker exists and the apply file is not newer: skip.
    Applied,
    /// Marker exists but the apply file is newer: rollback then re-apply.
    Drifted,
    /// No marker: apply.
    Pending,
}

/// Per-(mod, db) apply counts.
#[derive(Debug, Default, Clone, Copy)]
pub struct ApplyStats {
    pub applied: usize,
    pub reapplied: usize,
    pub skipped: usize,
}

impl ApplyStats {
    pub fn total_executed(&self) -> usize {
        self.applied + self.reapplied
    }
}

/// Enumerate `<mod>/<db>_sql/*.sql`, excluding rollback files, sorted by
/// file name (Unicode code-point order; the timestamp prefix makes this the
/// application order).
pub fn discover(mod_dir: &Path, db: DbKind) -> Result<Vec<Migration>> {
    let sql_dir = paths::mod_tree::sql_dir(mod_dir, db.tag());
    if !sql_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut migrations = Vec::new();
    for entry in
        fs::read_dir(&sql_dir).with_context(|| format!("Cannot read {}", sql_dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.ends_with(".sql") || name.ends_with(".rollback.sql") {
            continue;
        }

        let rollback_name = format!("{}.rollback.sql", name.trim_end_matches(".sql"));
        let rollback_path = sql_dir.join(&rollback_name);
        migrations.push(Migration {
            path: sql_dir.join(&name),
            rollback: rollback_path.is_file().then_some(rollback_path),
            file_name: name,
        });
    }

    migrations.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(migrations)
}

fn mtime(path: &Path) -> Result<SystemTime> {
    fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("Cannot stat {}", path.display()))
}

/// Classify one migration against its marker file.
pub fn classify(migration: &Migration, marker: &Path) -> Result<MigrationState> {
    if !marker.is_file() {
        return Ok(MigrationState::Pending);
    }
    if mtime(&migration.path)? > mtime(marker)? {
        Ok(MigrationState::Drifted)
    } else {
        Ok(MigrationState::Applied)
    }
}

fn run_file(runner: &mut dyn SqlRunner, path: &Path) -> Result<()> {
    let sql = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    runner
        .run_script(&sql)
        .with_context(|| format!("In migration {}", path.display()))
}

fn write_marker(marker: &Path) -> Result<()> {
    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create {}", parent.display()))?;
    }
    fs::write(marker, b"").with_context(|| format!("Cannot write {}", marker.display()))
}

/// Apply all pending (and drifted) migrations of one mod against one
/// database. Fails fast: the first failing script halts the stage with the
/// marker unwritten, so the migration stays pending.
pub fn apply_mod(
    runner: &mut dyn SqlRunner,
    root: &Path,
    mod_name: &str,
    db: DbKind,
) -> Result<ApplyStats> {
    let mut stats = ApplyStats::default();

    for migration in discover(&paths::mod_dir(root, mod_name), db)? {
        let marker = paths::shared::marker_file(root, mod_name, db.tag(), &migration.file_name);

        match classify(&migration, &marker)? {
            MigrationState::Applied => {
                stats.skipped += 1;
            }
            MigrationState::Drifted => {
                eprintln!(
                    "Warning: {}/{} changed since it was applied, rolling back and re-applying",
                    mod_name, migration.file_name
                );
                match &migration.rollback {
                    Some(rollback) => run_file(runner, rollback)?,
                    None => eprintln!(
                        "Warning: no rollback file for {}/{}, re-applying over the previous state",
                        mod_name, migration.file_name
                    ),
                }
                fs::remove_file(&marker)
                    .with_context(|| format!("Cannot remove {}", marker.display()))?;

                run_file(runner, &migration.path)?;
                write_marker(&marker)?;
                stats.reapplied += 1;
            }
            MigrationState::Pending => {
                run_file(runner, &migration.path)?;
                write_marker(&marker)?;
                stats.applied += 1;
            }
        }
    }

    Ok(stats)
}

/// Roll back applied migrations of one mod in descending order.
///
/// Rollback files are required here - a marked migration without one is a
/// fatal error. Stops after the first rollback unless `all` is set.
pub fn rollback_mod(
    runner: &mut dyn SqlRunner,
    root: &Path,
    mod_name: &str,
    db: DbKind,
    all: bool,
) -> Result<usize> {
    let mut migrations = discover(&paths::mod_dir(root, mod_name), db)?;
    migrations.sort_by(|a, b| b.file_name.cmp(&a.file_name));

    let mut rolled_back = 0;
    for migration in &migrations {
        let marker = paths::shared::marker_file(root, mod_name, db.tag(), &migration.file_name);
        if !marker.is_file() {
            continue;
        }

        let Some(rollback) = &migration.rollback else {
            bail!(
                "Cannot roll back {}/{}: no {}.rollback.sql",
                mod_name,
                migration.file_name,
                migration.file_name.trim_end_matches(".sql")
            );
        };

        run_file(runner, rollback)?;
        fs::remove_file(&marker)
            .with_context(|| format!("Cannot remove {}", marker.display()))?;
        rolled_back += 1;

        if !all {
            break;
        }
    }

    Ok(rolled_back)
}

/// Applied/pending/drifted counts for `status`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StatusCounts {
    pub applied: usize,
    pub pending: usize,
    pub drifted: usize,
}

pub fn status(root: &Path, mod_name: &str, db: DbKind) -> Result<StatusCounts> {
    let mut counts = StatusCounts::default();
    for migration in discover(&paths::mod_dir(root, mod_name), db)? {
        let marker = paths::shared::marker_file(root, mod_name, db.tag(), &migration.file_name);
        match classify(&migration, &marker)? {
            MigrationState::Applied => counts.applied += 1,
            MigrationState::Drifted => counts.drifted += 1,
            MigrationState::Pending => counts.pending += 1,
        }
    }
    Ok(counts)
}
