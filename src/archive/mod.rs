// src/archive/mod.rs

//! Archive reader
//!
//! An archive is an unpacked export directory or a zip/tar container that
//! holds `manifest.xml` plus the payload entries the manifest refers to.
//! Entries are looked up by their manifest name; a missing entry is an
//! ordinary error the importers recover from.

mod detect;

pub use detect::{ArchiveFormat, detect_format};

use crate::error::{Error, Result};
use crate::manifest::Manifest;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use zip::ZipArchive;

/// Well-known name of the manifest entry
pub const MANIFEST_ENTRY: &str = "manifest.xml";

/// Maximum size of a single entry (512 MB)
pub const MAX_ENTRY_SIZE: u64 = 512 * 1024 * 1024;

enum Backend {
    Directory(PathBuf),
    Zip(ZipArchive<BufReader<File>>),
    /// Tar streams are sequential, so their regular files are loaded up front
    Tar(HashMap<String, Vec<u8>>),
    Closed,
}

/// An open import archive
pub struct Archive {
    locator: PathBuf,
    format: ArchiveFormat,
    backend: Backend,
}

impl Archive {
    /// Open the archive at `locator`
    pub fn open(locator: impl AsRef<Path>) -> Result<Self> {
        let locator = locator.as_ref();
        let format = detect_format(locator)?;
        debug!("Opening {} archive {}", format.name(), locator.display());

        let backend = match format {
            ArchiveFormat::Directory => Backend::Directory(locator.to_path_buf()),
            ArchiveFormat::Zip => {
                let file = File::open(locator)?;
                let zip = ZipArchive::new(BufReader::new(file)).map_err(|e| {
                    Error::NotAnArchive(format!("{}: {}", locator.display(), e))
                })?;
                Backend::Zip(zip)
            }
            ArchiveFormat::Tar => Backend::Tar(load_tar(File::open(locator)?, locator)?),
            ArchiveFormat::TarGz => {
                let decoder = flate2::read::GzDecoder::new(File::open(locator)?);
                Backend::Tar(load_tar(decoder, locator)?)
            }
            ArchiveFormat::TarZst => {
                let decoder = zstd::stream::read::Decoder::new(File::open(locator)?)?;
                Backend::Tar(load_tar(decoder, locator)?)
            }
        };

        Ok(Self {
            locator: locator.to_path_buf(),
            format,
            backend,
        })
    }

    pub fn locator(&self) -> &Path {
        &self.locator
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.backend, Backend::Closed)
    }

    /// Whether an entry with this name exists
    pub fn contains(&mut self, name: &str) -> bool {
        let name = normalize_entry_name(name);
        match &mut self.backend {
            Backend::Directory(root) => {
                entry_path(root, &name).is_some_and(|p| p.is_file())
            }
            Backend::Zip(zip) => zip.by_name(&name).is_ok(),
            Backend::Tar(entries) => entries.contains_key(&name),
            Backend::Closed => false,
        }
    }

    /// Read the full content of entry `name`
    pub fn read_entry(&mut self, name: &str) -> Result<Vec<u8>> {
        let name = normalize_entry_name(name);
        match &mut self.backend {
            Backend::Directory(root) => {
                let path = entry_path(root, &name)
                    .filter(|p| p.is_file())
                    .ok_or_else(|| Error::EntryMissing(name.clone()))?;
                let file = File::open(&path)?;
                let declared = file.metadata()?.len();
                read_fully(file, declared, &name)
            }
            Backend::Zip(zip) => {
                let entry = match zip.by_name(&name) {
                    Ok(entry) => entry,
                    Err(zip::result::ZipError::FileNotFound) => {
                        return Err(Error::EntryMissing(name));
                    }
                    Err(e) => return Err(e.into()),
                };
                if entry.is_dir() {
                    return Err(Error::EntryMissing(name));
                }
                let declared = entry.size();
                read_fully(entry, declared, &name)
            }
            Backend::Tar(entries) => entries
                .get(&name)
                .cloned()
                .ok_or(Error::EntryMissing(name)),
            Backend::Closed => Err(Error::IoError(format!(
                "archive {} is closed",
                self.locator.display()
            ))),
        }
    }

    /// Read and parse `manifest.xml`
    pub fn read_manifest(&mut self) -> Result<Manifest> {
        let bytes = match self.read_entry(MANIFEST_ENTRY) {
            Ok(bytes) => bytes,
            Err(Error::EntryMissing(_)) => {
                return Err(Error::InvalidManifest(format!(
                    "{} has no {}",
                    self.locator.display(),
                    MANIFEST_ENTRY
                )));
            }
            Err(e) => return Err(e),
        };
        Manifest::parse(&bytes)
    }

    /// Release the container handle; safe to call more than once
    pub fn close(&mut self) {
        if !self.is_closed() {
            debug!("Closing archive {}", self.locator.display());
            self.backend = Backend::Closed;
        }
    }
}

impl Drop for Archive {
    fn drop(&mut self) {
        self.close();
    }
}

/// Normalize a manifest entry name to the container's relative form
pub fn normalize_entry_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    let mut name = name.as_str();
    loop {
        if let Some(rest) = name.strip_prefix("./") {
            name = rest;
        } else if let Some(rest) = name.strip_prefix('/') {
            name = rest;
        } else {
            break;
        }
    }
    name.to_string()
}

/// Resolve an entry inside a directory archive, refusing to leave the root
fn entry_path(root: &Path, name: &str) -> Option<PathBuf> {
    let relative = Path::new(name);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        warn!("Refusing archive entry outside the archive root: {}", name);
        return None;
    }
    Some(root.join(relative))
}

/// Read until `declared` bytes have been consumed, tolerating short reads
fn read_fully(mut reader: impl Read, declared: u64, name: &str) -> Result<Vec<u8>> {
    if declared > MAX_ENTRY_SIZE {
        return Err(Error::IoError(format!(
            "entry {} is too large ({} bytes)",
            name, declared
        )));
    }
    let mut buffer = vec![0u8; declared as usize];
    let mut filled = 0usize;
    while filled < buffer.len() {
        let n = reader.read(&mut buffer[filled..])?;
        if n == 0 {
            return Err(Error::IoError(format!(
                "entry {} truncated after {} of {} bytes",
                name, filled, declared
            )));
        }
        filled += n;
    }
    Ok(buffer)
}

fn load_tar<R: Read>(reader: R, locator: &Path) -> Result<HashMap<String, Vec<u8>>> {
    let mut archive = tar::Archive::new(reader);
    let mut entries = HashMap::new();

    let iter = archive
        .entries()
        .map_err(|e| Error::NotAnArchive(format!("{}: {}", locator.display(), e)))?;
    for entry in iter {
        let entry = entry.map_err(|e| {
            Error::NotAnArchive(format!("{}: {}", locator.display(), e))
        })?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = normalize_entry_name(&entry.path()?.to_string_lossy());
        let declared = entry.header().size()?;
        let content = read_fully(entry, declared, &name)?;
        entries.insert(name, content);
    }

    debug!("Loaded {} entries from {}", entries.len(), locator.display());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn write_dir_archive() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("manifest.xml"), "<export/>").unwrap();
        std::fs::create_dir_all(dir.path().join("a")).unwrap();
        std::fs::write(dir.path().join("a/b.txt"), "hello").unwrap();
        dir
    }

    /// Reader that hands out at most one byte per call
    struct Trickle(Cursor<Vec<u8>>);

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            let len = buf.len().min(1);
            self.0.read(&mut buf[..len])
        }
    }

    #[test]
    fn test_directory_archive() {
        let dir = write_dir_archive();
        let mut archive = Archive::open(dir.path()).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Directory);
        assert_eq!(archive.read_entry("a/b.txt").unwrap(), b"hello");
        assert_eq!(archive.read_entry("/a/b.txt").unwrap(), b"hello");
        assert!(archive.contains("a/b.txt"));
        assert!(matches!(
            archive.read_entry("a/missing.txt"),
            Err(Error::EntryMissing(_))
        ));
        assert!(matches!(archive.read_entry("a"), Err(Error::EntryMissing(_))));
    }

    #[test]
    fn test_directory_rejects_escape() {
        let dir = write_dir_archive();
        let mut archive = Archive::open(dir.path().join("a")).unwrap();
        assert!(matches!(
            archive.read_entry("../manifest.xml"),
            Err(Error::EntryMissing(_))
        ));
    }

    #[test]
    fn test_zip_archive() {
        let file = tempfile::Builder::new().suffix(".zip").tempfile().unwrap();
        {
            let mut zip = zip::ZipWriter::new(file.reopen().unwrap());
            let options = zip::write::SimpleFileOptions::default();
            zip.start_file("manifest.xml", options).unwrap();
            zip.write_all(b"<export/>").unwrap();
            zip.start_file("a/b.txt", options).unwrap();
            zip.write_all(b"zipped").unwrap();
            zip.finish().unwrap();
        }

        let mut archive = Archive::open(file.path()).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::Zip);
        assert_eq!(archive.read_entry("a/b.txt").unwrap(), b"zipped");
        assert!(matches!(
            archive.read_entry("nope"),
            Err(Error::EntryMissing(_))
        ));
        assert_eq!(archive.read_manifest().unwrap().version, 0);
    }

    #[test]
    fn test_tar_gz_archive() {
        let file = tempfile::Builder::new().suffix(".tar.gz").tempfile().unwrap();
        {
            let encoder = flate2::write::GzEncoder::new(
                file.reopen().unwrap(),
                flate2::Compression::default(),
            );
            let mut builder = tar::Builder::new(encoder);
            let data = b"tarred";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_entry_type(tar::EntryType::Regular);
            header.set_cksum();
            builder.append_data(&mut header, "./a/b.txt", &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let mut archive = Archive::open(file.path()).unwrap();
        assert_eq!(archive.format(), ArchiveFormat::TarGz);
        assert_eq!(archive.read_entry("a/b.txt").unwrap(), b"tarred");
    }

    #[test]
    fn test_missing_manifest_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let mut archive = Archive::open(dir.path()).unwrap();
        assert!(matches!(
            archive.read_manifest(),
            Err(Error::InvalidManifest(_))
        ));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = write_dir_archive();
        let mut archive = Archive::open(dir.path()).unwrap();
        archive.close();
        archive.close();
        assert!(archive.is_closed());
        assert!(archive.read_entry("a/b.txt").is_err());
    }

    #[test]
    fn test_read_fully_handles_short_reads() {
        let reader = Trickle(Cursor::new(b"abcdef".to_vec()));
        assert_eq!(read_fully(reader, 6, "x").unwrap(), b"abcdef");

        let reader = Trickle(Cursor::new(b"abc".to_vec()));
        assert!(read_fully(reader, 6, "x").is_err());
    }

    #[test]
    fn test_normalize_entry_name() {
        assert_eq!(normalize_entry_name("/a/b"), "a/b");
        assert_eq!(normalize_entry_name("./a/b"), "a/b");
        assert_eq!(normalize_entry_name("a\\b"), "a/b");
        assert_eq!(normalize_entry_name("a/b"), "a/b");
    }
}
