// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vfsimport::{
    DbRepository, ImportConfig, ImportOptions, ImportOutcome, Importer, MemoryReport, Result,
};

/// An unpacked export archive in a temporary directory.
///
/// Keep the fixture alive for as long as the archive is used.
pub struct ArchiveFixture {
    dir: TempDir,
}

impl ArchiveFixture {
    /// Create an archive whose manifest declares `version` and holds `body`
    pub fn new(version: u32, body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("manifest.xml"), manifest(version, body)).unwrap();
        Self { dir }
    }

    /// Add an archive entry
    pub fn file(self, name: &str, content: impl AsRef<[u8]>) -> Self {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
        self
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Pack the fixture into a zip file next to it and return its path
    pub fn zip(&self, out: &TempDir) -> PathBuf {
        use std::io::Write;
        use zip::write::SimpleFileOptions;

        let zip_path = out.path().join("export.zip");
        let mut writer = zip::ZipWriter::new(fs::File::create(&zip_path).unwrap());
        let mut stack = vec![self.dir.path().to_path_buf()];
        while let Some(dir) = stack.pop() {
            for entry in fs::read_dir(&dir).unwrap() {
                let path = entry.unwrap().path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let name = path
                    .strip_prefix(self.dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/");
                writer.start_file(name, SimpleFileOptions::default()).unwrap();
                writer.write_all(&fs::read(&path).unwrap()).unwrap();
            }
        }
        writer.finish().unwrap();
        zip_path
    }
}

/// Complete manifest document for `version`
pub fn manifest(version: u32, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<export>
  <info>
    <creator>Admin</creator>
    <opencms_version>5.0.0</opencms_version>
    <createdate>Mon, 01 Mar 2004 10:00:00 GMT</createdate>
    <project>Offline</project>
    <export_version>{version}</export_version>
  </info>
{body}
</export>"#
    )
}

/// A `<file>` entry for a folder
pub fn folder(destination: &str) -> String {
    format!(
        "<file><destination>{destination}</destination><type>folder</type></file>"
    )
}

/// In-memory repository logged in as the administrator
pub fn repo() -> DbRepository {
    DbRepository::open_in_memory().unwrap()
}

/// Import `fixture` below `/` with `config`, collecting the report
pub fn run(
    repo: &DbRepository,
    fixture: &ArchiveFixture,
    config: ImportConfig,
) -> (Result<ImportOutcome>, MemoryReport) {
    run_with(repo, fixture.path(), "/", config, &ImportOptions::default())
}

pub fn run_with(
    repo: &DbRepository,
    locator: &Path,
    destination: &str,
    config: ImportConfig,
    options: &ImportOptions,
) -> (Result<ImportOutcome>, MemoryReport) {
    let importer = Importer::new(config).unwrap();
    let report = MemoryReport::new();
    let outcome = importer.import_archive(repo, locator, destination, &report, options);
    (outcome, report)
}
