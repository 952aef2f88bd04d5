use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use runeforge::build::{BuildOptions, Stage};
use runeforge::commands;
use runeforge::commands::extract::ExtractArgs;
use runeforge::migrate::DbKind;

/// Database selector for migration commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Db {
    /// Working DBC database
    Dbc,
    /// Server world database
    World,
}

impl From<Db> for DbKind {
    fn from(db: Db) -> Self {
        match db {
            Db::Dbc => DbKind::Dbc,
            Db::World => DbKind::World,
        }
    }
}

#[derive(Parser)]
#[command(
    name = "runeforge",
    version = env!("CARGO_PKG_VERSION"),
    about = "Modding framework for a fixed-version game client and server",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the build pipeline (all stages, or a subset)
    Build {
        /// Stage subset: dbc_sql, world_sql, binary, server-patches,
        /// assets, dbc, luaxml, scripts
        stages: Vec<Stage>,

        /// Only build this mod
        #[arg(long = "mod")]
        mod_name: Option<String>,

        /// Skip the dbc_sql migration stage
        #[arg(long)]
        skip_dbc_sql: bool,

        /// Skip the world_sql migration stage
        #[arg(long)]
        skip_world_sql: bool,

        /// Skip the binary edit stage
        #[arg(long)]
        skip_binary: bool,

        /// Skip the server patch stage
        #[arg(long)]
        skip_server_patches: bool,

        /// Skip the asset copy stage
        #[arg(long)]
        skip_assets: bool,

        /// Skip DBC export and the primary archive
        #[arg(long)]
        skip_dbc: bool,

        /// Skip overlay discovery and the locale archive
        #[arg(long)]
        skip_luaxml: bool,

        /// Skip the script deploy stage
        #[arg(long)]
        skip_scripts: bool,

        /// Ignore every tracker and re-apply all artifact kinds
        #[arg(long)]
        force: bool,

        /// Re-apply binary edits already in the tracker
        #[arg(long)]
        force_binary_edits: bool,

        /// Re-apply server patches already in the tracker
        #[arg(long)]
        force_server_patches: bool,

        /// Re-copy assets already in the tracker
        #[arg(long)]
        force_assets: bool,

        /// Re-deploy scripts already in the tracker
        #[arg(long)]
        force_scripts: bool,
    },

    /// Roll back applied migrations (most recent first)
    Rollback {
        /// Only roll back this mod
        #[arg(long = "mod")]
        mod_name: Option<String>,

        /// Database to roll back (default: both)
        #[arg(long, value_enum)]
        db: Option<Db>,

        /// Unwind every applied migration instead of only the last
        #[arg(long)]
        all: bool,
    },

    /// Show per-mod applied/pending migrations and overlay counts
    Status {
        /// Only show this mod
        #[arg(long = "mod")]
        mod_name: Option<String>,
    },

    /// Import client data into the relational store
    Import {
        #[command(subcommand)]
        target: ImportTarget,
    },

    /// Populate baseline trees, or copy a baseline file into a mod
    Extract {
        /// Operate on DBC files
        #[arg(long)]
        dbc: bool,

        /// Operate on the UI overlay tree
        #[arg(long)]
        luaxml: bool,

        /// Source directory to populate the baseline from
        #[arg(long)]
        source: Option<PathBuf>,

        /// Only copy files whose relative path starts with this prefix
        #[arg(long)]
        filter: Option<String>,

        /// Copy one baseline file into this mod instead
        #[arg(long = "mod", requires = "dest")]
        mod_name: Option<String>,

        /// Relative path of the baseline file to copy (with --mod)
        #[arg(long, requires = "mod_name")]
        dest: Option<String>,
    },

    /// Apply, inspect or undo client binary edits
    Patch {
        /// Target executable (default: the configured client's)
        exe_path: Option<PathBuf>,

        /// List every binary edit and its tracker state
        #[arg(long)]
        list: bool,

        /// Validate patches without writing the executable
        #[arg(long)]
        dry_run: bool,

        /// Restore the .clean backup and clear the tracker
        #[arg(long)]
        restore: bool,
    },

    /// Create an empty mod skeleton
    CreateMod {
        /// Mod name (letters, digits, '_' and '-'; must start with a letter)
        name: String,
    },

    /// Create a timestamped migration pair (apply + rollback stub)
    CreateMigration {
        /// Mod to create the migration in
        mod_name: String,

        /// Short description, becomes part of the file name
        description: String,

        /// Target database (default: dbc)
        #[arg(long, value_enum)]
        db: Option<Db>,
    },

    /// Create a C++ server script stub
    CreateScript {
        /// Mod to create the script in
        mod_name: String,

        /// Script name
        name: String,
    },

    /// Create a UI overlay (Lua/XML) stub pair
    CreateAddon {
        /// Mod to create the addon in
        mod_name: String,

        /// Addon name
        name: String,
    },

    /// Scaffold a new workspace
    Init {
        /// Directory to initialize (default: current directory)
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ImportTarget {
    /// Import a directory of DBC files
    Dbc {
        /// Source directory (default: shared/dbc/baseline)
        #[arg(long)]
        source: Option<PathBuf>,

        /// Import into this database instead of the configured primary
        #[arg(long)]
        database: Option<String>,

        /// Leave tables that already exist untouched
        #[arg(long)]
        skip_existing: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Build {
            stages,
            mod_name,
            skip_dbc_sql,
            skip_world_sql,
            skip_binary,
            skip_server_patches,
            skip_assets,
            skip_dbc,
            skip_luaxml,
            skip_scripts,
            force,
            force_binary_edits,
            force_server_patches,
            force_assets,
            force_scripts,
        } => {
            let mut skip = Vec::new();
            for (flag, stage) in [
                (skip_dbc_sql, Stage::DbcSql),
                (skip_world_sql, Stage::WorldSql),
                (skip_binary, Stage::Binary),
                (skip_server_patches, Stage::ServerPatches),
                (skip_assets, Stage::Assets),
                (skip_dbc, Stage::Dbc),
                (skip_luaxml, Stage::Luaxml),
                (skip_scripts, Stage::Scripts),
            ] {
                if flag {
                    skip.push(stage);
                }
            }
            commands::build::execute(BuildOptions {
                stages,
                mod_filter: mod_name,
                skip,
                force,
                force_binary_edits,
                force_server_patches,
                force_assets,
                force_scripts,
            })?;
        }
        Commands::Rollback { mod_name, db, all } => {
            commands::rollback::execute(mod_name.as_deref(), db.map(Into::into), all)?;
        }
        Commands::Status { mod_name } => {
            commands::status::execute(mod_name.as_deref())?;
        }
        Commands::Import { target } => match target {
            ImportTarget::Dbc {
                source,
                database,
                skip_existing,
            } => {
                commands::import::execute_dbc(source, database, skip_existing)?;
            }
        },
        Commands::Extract {
            dbc,
            luaxml,
            source,
            filter,
            mod_name,
            dest,
        } => {
            commands::extract::execute(ExtractArgs {
                dbc,
                luaxml,
                source,
                filter,
                mod_name,
                dest,
            })?;
        }
        Commands::Patch {
            exe_path,
            list,
            dry_run,
            restore,
        } => {
            commands::patch::execute(exe_path, list, dry_run, restore)?;
        }
        Commands::CreateMod { name } => {
            commands::create::execute_mod(&name)?;
        }
        Commands::CreateMigration {
            mod_name,
            description,
            db,
        } => {
            commands::create::execute_migration(&mod_name, db.unwrap_or(Db::Dbc).into(), &description)?;
        }
        Commands::CreateScript { mod_name, name } => {
            commands::create::execute_script(&mod_name, &name)?;
        }
        Commands::CreateAddon { mod_name, name } => {
            commands::create::execute_addon(&mod_name, &name)?;
        }
        Commands::Init { path } => {
            commands::init::execute(path)?;
        }
    }

    Ok(())
}
