//! The primary archive must always ship the cumulative export set.
//!
//! Exported DBC files accumulate in `build/dbc/` across builds: a table
//! exported by an earlier build keeps its file when a later build skips it
//! (unchanged fingerprint), and packaging rebuilds the archive from the
//! whole directory. The incremental "touch one table" workflow must not
//! drop the other tables from what ships to the client.

use std::fs::{self, File};
use std::io::Read;
use std::path::Path;

use runeforge::archive;
use runeforge::paths;
use tempfile::TempDir;

fn archive_member(path: &Path, name: &str) -> Vec<u8> {
    let mut zip = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
    let mut member = zip.by_name(name).unwrap();
    let mut content = Vec::new();
    member.read_to_end(&mut content).unwrap();
    content
}

#[test]
fn test_incremental_build_keeps_unchanged_tables_in_archive() {
    let temp = TempDir::new().unwrap();
    let out_dir = paths::build::dbc_out_dir(temp.path());
    fs::create_dir_all(&out_dir).unwrap();
    let dest = temp.path().join("patch-rf.mpq");

    // Build 1: both tables drifted, both exported.
    fs::write(out_dir.join("Talent.dbc"), b"talent v1").unwrap();
    fs::write(out_dir.join("Map.dbc"), b"map v1").unwrap();
    assert_eq!(
        archive::pack_dir(&out_dir, archive::DBC_ARCHIVE_PREFIX, &dest).unwrap(),
        2
    );

    // Build 2: only Talent drifted again; Map's file is left in place from
    // the previous export and must still ship.
    fs::write(out_dir.join("Talent.dbc"), b"talent v2").unwrap();
    assert_eq!(
        archive::pack_dir(&out_dir, archive::DBC_ARCHIVE_PREFIX, &dest).unwrap(),
        2
    );

    assert_eq!(
        archive_member(&dest, "DBFilesClient\\Talent.dbc"),
        b"talent v2"
    );
    assert_eq!(archive_member(&dest, "DBFilesClient\\Map.dbc"), b"map v1");
}

#[test]
fn test_unchanged_rebuild_produces_identical_archive() {
    let temp = TempDir::new().unwrap();
    let out_dir = paths::build::dbc_out_dir(temp.path());
    fs::create_dir_all(&out_dir).unwrap();
    fs::write(out_dir.join("Languages.dbc"), b"langs").unwrap();

    let first = temp.path().join("one.mpq");
    let second = temp.path().join("two.mpq");
    archive::pack_dir(&out_dir, archive::DBC_ARCHIVE_PREFIX, &first).unwrap();
    archive::pack_dir(&out_dir, archive::DBC_ARCHIVE_PREFIX, &second).unwrap();

    assert_eq!(fs::read(&first).unwrap(), fs::read(&second).unwrap());
}
