//! Build orchestrator.
//!
//! Runs the stages in fixed order, each individually skippable and
//! selectable: dbc_sql migrations, world_sql migrations, binary edits,
//! server patches, assets, DBC export, overlay discovery, script deploy,
//! then packaging. Mods are iterated in ascending name order inside every
//! stage; later mods win shared namespaces. A stage that finds no work
//! prints a no-op line rather than staying silent.

use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use colored::Colorize;
use std::collections::HashSet;
use std::fs;

use crate::archive;
use crate::assets;
use crate::db::Gateway;
use crate::dbc::export;
use crate::migrate::{self, DbKind};
use crate::overlay::{self, OverlayDelta};
use crate::patch;
use crate::paths;
use crate::scripts;
use crate::workspace::Workspace;

/// Stage tags accepted as positional `build` arguments. `dbc` covers the
/// whole DBC path: migrations, export and the primary archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum Stage {
    #[value(name = "dbc_sql")]
    DbcSql,
    #[value(name = "world_sql")]
    WorldSql,
    #[value(name = "binary")]
    Binary,
    #[value(name = "server-patches")]
    ServerPatches,
    #[value(name = "assets")]
    Assets,
    #[value(name = "dbc")]
    Dbc,
    #[value(name = "luaxml")]
    Luaxml,
    #[value(name = "scripts")]
    Scripts,
}

/// Everything the `build` command surface can select.
#[derive(Debug, Default, Clone)]
pub struct BuildOptions {
    /// Positional subset; empty means every stage.
    pub stages: Vec<Stage>,
    pub mod_filter: Option<String>,
    pub skip: Vec<Stage>,
    pub force: bool,
    pub force_binary_edits: bool,
    pub force_server_patches: bool,
    pub force_assets: bool,
    pub force_scripts: bool,
}

impl BuildOptions {
    fn enabled(&self, stage: Stage) -> bool {
        if self.skip.contains(&stage) {
            return false;
        }
        if self.stages.is_empty() {
            return true;
        }
        let subset: HashSet<Stage> = self.stages.iter().copied().collect();
        // `dbc` implies the migration half as well.
        subset.contains(&stage) || (stage == Stage::DbcSql && subset.contains(&Stage::Dbc))
    }
}

fn stage_header(title: &str) {
    println!("\n{}", format!("== {} ==", title).cyan().bold());
}

fn no_op() {
    println!("   no-op");
}

/// Run the full build for this invocation.
pub fn run(workspace: &Workspace, opts: &BuildOptions) -> Result<()> {
    let mods = workspace.selected_mods(opts.mod_filter.as_deref())?;

    if opts.enabled(Stage::DbcSql) {
        run_migrations(workspace, &mods, DbKind::Dbc)?;
    }
    if opts.enabled(Stage::WorldSql) {
        run_migrations(workspace, &mods, DbKind::World)?;
    }
    if opts.enabled(Stage::Binary) {
        run_binary(workspace, &mods, opts.force || opts.force_binary_edits)?;
    }
    if opts.enabled(Stage::ServerPatches) {
        run_server_patches(workspace, &mods, opts.force || opts.force_server_patches)?;
    }
    if opts.enabled(Stage::Assets) {
        run_assets(workspace, &mods, opts.force || opts.force_assets)?;
    }
    if opts.enabled(Stage::Dbc) {
        run_export(workspace)?;
    }

    let mut delta: Option<OverlayDelta> = None;
    if opts.enabled(Stage::Luaxml) {
        delta = Some(run_overlay_discovery(workspace, &mods)?);
    }
    if opts.enabled(Stage::Scripts) {
        run_scripts(workspace, &mods, opts.force || opts.force_scripts)?;
    }
    if opts.enabled(Stage::Dbc) || opts.enabled(Stage::Luaxml) {
        run_packaging(workspace, opts, delta.as_ref())?;
    }

    println!("\n{}", "Build finished".green().bold());
    Ok(())
}

fn run_migrations(workspace: &Workspace, mods: &[String], db: DbKind) -> Result<()> {
    stage_header(&format!("Applying {} migrations", db.sql_dir_name()));

    let cfg = match db {
        DbKind::Dbc => &workspace.config.databases.primary,
        DbKind::World => &workspace.config.databases.world,
    };
    let mut gateway = Gateway::new(cfg);

    let mut any = false;
    for mod_name in mods {
        let stats = migrate::apply_mod(&mut gateway, &workspace.root, mod_name, db)?;
        let total = stats.applied + stats.reapplied + stats.skipped;
        if total == 0 {
            continue;
        }
        any = true;
        let mut line = format!(
            "   {}: applied {}, skipped {}",
            mod_name, stats.applied, stats.skipped
        );
        if stats.reapplied > 0 {
            line.push_str(&format!(", re-applied {}", stats.reapplied));
        }
        println!("{}", line);
    }
    if !any {
        no_op();
    }
    Ok(())
}

fn run_binary(workspace: &Workspace, mods: &[String], force: bool) -> Result<()> {
    stage_header("Binary edits");
    let stats = patch::binary::run(workspace, mods, force)?;
    if stats.applied == 0 && stats.skipped == 0 {
        no_op();
    } else {
        println!("   applied {}, skipped {}", stats.applied, stats.skipped);
    }
    Ok(())
}

fn run_server_patches(workspace: &Workspace, mods: &[String], force: bool) -> Result<()> {
    stage_header("Server patches");
    let stats = patch::source::run(workspace, mods, force)?;
    if stats.applied == 0 && stats.skipped == 0 && stats.warned == 0 {
        no_op();
    } else {
        println!(
            "   applied {}, skipped {}, not applicable {}",
            stats.applied, stats.skipped, stats.warned
        );
    }
    Ok(())
}

fn run_assets(workspace: &Workspace, mods: &[String], force: bool) -> Result<()> {
    stage_header("Assets");
    let stats = assets::run(workspace, mods, force)?;
    if stats.copied == 0 && stats.skipped == 0 {
        no_op();
    } else {
        println!("   copied {}, skipped {}", stats.copied, stats.skipped);
    }
    Ok(())
}

fn run_export(workspace: &Workspace) -> Result<()> {
    stage_header("DBC export");
    let gateway = Gateway::new(&workspace.config.databases.primary);
    let summary = export::export_all(&gateway, &workspace.root)?;
    if summary.exported.is_empty() {
        no_op();
    } else {
        for file in &summary.exported {
            println!("   ✓ {}", file);
        }
        println!(
            "   exported {}, unchanged {}",
            summary.exported.len(),
            summary.skipped
        );
    }
    Ok(())
}

fn run_overlay_discovery(workspace: &Workspace, mods: &[String]) -> Result<OverlayDelta> {
    stage_header("Overlay discovery");
    let delta = overlay::discover(workspace, mods)?;
    if delta.is_empty() {
        no_op();
    } else {
        println!("   {} file(s) differ from baseline", delta.len());
    }
    Ok(delta)
}

fn run_scripts(workspace: &Workspace, mods: &[String], force: bool) -> Result<()> {
    stage_header("Scripts");
    let stats = scripts::run(workspace, mods, force)?;
    if !stats.changed() && stats.skipped == 0 && stats.warned == 0 {
        no_op();
    } else {
        println!(
            "   deployed {}, skipped {}, removed {}",
            stats.deployed, stats.skipped, stats.removed
        );
    }
    Ok(())
}

fn run_packaging(
    workspace: &Workspace,
    opts: &BuildOptions,
    delta: Option<&OverlayDelta>,
) -> Result<()> {
    stage_header("Packaging");
    let mut any = false;

    if opts.enabled(Stage::Dbc) {
        let out_dir = paths::build::dbc_out_dir(&workspace.root);
        let mut exported: Vec<String> = Vec::new();
        if out_dir.is_dir() {
            for entry in fs::read_dir(&out_dir)
                .with_context(|| format!("Cannot read {}", out_dir.display()))?
            {
                let entry = entry?;
                if entry.file_type()?.is_file() {
                    if let Some(name) = entry.file_name().to_str() {
                        exported.push(name.to_string());
                    }
                }
            }
        }
        exported.sort();

        if !exported.is_empty() {
            let data_path = &workspace.config.server.data_path;
            if data_path.as_os_str().is_empty() {
                bail!("server.data_path is not configured");
            }
            fs::create_dir_all(data_path)
                .with_context(|| format!("Cannot create {}", data_path.display()))?;
            for name in &exported {
                fs::copy(out_dir.join(name), data_path.join(name))
                    .with_context(|| format!("Cannot copy {} to server data", name))?;
            }
            println!("   ✓ {} DBC file(s) -> {}", exported.len(), data_path.display());

            let client = &workspace.config.client.path;
            if client.as_os_str().is_empty() {
                bail!("client.path is not configured");
            }
            let dest = paths::client::data_dir(client)
                .join(&workspace.config.output.primary_archive_name);
            let members = archive::pack_dir(&out_dir, archive::DBC_ARCHIVE_PREFIX, &dest)?;
            println!("   ✓ {} ({} member(s))", dest.display(), members);
            any = true;
        }
    }

    if opts.enabled(Stage::Luaxml) {
        if let Some(delta) = delta {
            if !delta.is_empty() {
                let client = &workspace.config.client.path;
                if client.as_os_str().is_empty() {
                    bail!("client.path is not configured");
                }
                let dest = paths::client::locale_dir(client, workspace.locale())
                    .join(workspace.config.overlay_archive_name());
                let members = archive::pack_overlay(delta, &dest)?;
                println!("   ✓ {} ({} member(s))", dest.display(), members);
                any = true;
            }
        }
    }

    if !any {
        no_op();
    }
    Ok(())
}
