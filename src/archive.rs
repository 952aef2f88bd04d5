//! Compressed container output.
//!
//! Archives are deflate containers written with member timestamps pinned to
//! a fixed value, so identical inputs produce byte-identical archives
//! across runs. Member names use backslashes - the client's path
//! convention.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::overlay::OverlayDelta;

/// In-archive directory for exported DBC files.
pub const DBC_ARCHIVE_PREFIX: &str = "DBFilesClient";

fn member_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        // Epoch timestamp keeps archives reproducible.
        .last_modified_time(zip::DateTime::default())
}

/// Incremental archive writer.
pub struct ArchiveWriter {
    zip: ZipWriter<File>,
    members: usize,
}

impl ArchiveWriter {
    /// Create the archive at `path`, creating parent directories.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Cannot create {}", parent.display()))?;
        }
        let file =
            File::create(path).with_context(|| format!("Cannot create {}", path.display()))?;
        Ok(Self {
            zip: ZipWriter::new(file),
            members: 0,
        })
    }

    /// Add one member. `rel` may use forward slashes; the stored name is
    /// backslashed.
    pub fn add_member(&mut self, rel: &str, bytes: &[u8]) -> Result<()> {
        let name = rel.replace('/', "\\");
        self.zip
            .start_file(name.as_str(), member_options())
            .with_context(|| format!("Cannot start member {}", name))?;
        self.zip
            .write_all(bytes)
            .with_context(|| format!("Cannot write member {}", name))?;
        self.members += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<usize> {
        self.zip.finish().context("Cannot finalize archive")?;
        Ok(self.members)
    }
}

/// Pack an overlay delta into the archive at `dest`. Returns the member
/// count.
pub fn pack_overlay(delta: &OverlayDelta, dest: &Path) -> Result<usize> {
    let mut writer = ArchiveWriter::create(dest)?;
    for (rel, source) in &delta.files {
        let bytes =
            fs::read(source).with_context(|| format!("Cannot read {}", source.display()))?;
        writer.add_member(rel, &bytes)?;
    }
    writer.finish()
}

/// Pack every file in `dir` (sorted by name) under `prefix` into the
/// archive at `dest`. Returns the member count.
pub fn pack_dir(dir: &Path, prefix: &str, dest: &Path) -> Result<usize> {
    let mut names: Vec<String> = Vec::new();
    if dir.is_dir() {
        for entry in
            fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))?
        {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
    }
    names.sort();

    let mut writer = ArchiveWriter::create(dest)?;
    for name in &names {
        let path = dir.join(name);
        let bytes = fs::read(&path).with_context(|| format!("Cannot read {}", path.display()))?;
        writer.add_member(&format!("{}/{}", prefix, name), &bytes)?;
    }
    writer.finish()
}
