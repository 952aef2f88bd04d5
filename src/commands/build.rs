//! `runeforge build` - run the pipeline.

use anyhow::Result;

use crate::build::{self, BuildOptions};
use crate::workspace::Workspace;

pub fn execute(opts: BuildOptions) -> Result<()> {
    let workspace = Workspace::locate()?;
    build::run(&workspace, &opts)
}
