// src/archive/detect.rs

//! Archive container detection
//!
//! Uses magic bytes for reliable detection, falling back to file extensions.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Supported archive containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    /// Unpacked export directory
    Directory,
    Zip,
    Tar,
    TarGz,
    TarZst,
}

impl ArchiveFormat {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar.gz",
            Self::TarZst => "tar.zst",
        }
    }
}

/// Detect the container format at `path`
pub fn detect_format(path: impl AsRef<Path>) -> Result<ArchiveFormat> {
    let path = path.as_ref();

    let metadata = std::fs::metadata(path)
        .map_err(|_| Error::NotFound(path.display().to_string()))?;
    if metadata.is_dir() {
        return Ok(ArchiveFormat::Directory);
    }

    if let Ok(mut file) = File::open(path) {
        let mut magic = [0u8; 264];
        let n = read_prefix(&mut file, &mut magic);

        // Zip local file header, or end-of-central-directory for an empty zip
        if n >= 4 && (magic[0..4] == *b"PK\x03\x04" || magic[0..4] == *b"PK\x05\x06") {
            return Ok(ArchiveFormat::Zip);
        }
        // Gzip: 1f 8b
        if n >= 2 && magic[0..2] == [0x1F, 0x8B] {
            return Ok(ArchiveFormat::TarGz);
        }
        // Zstd: 28 b5 2f fd
        if n >= 4 && magic[0..4] == [0x28, 0xB5, 0x2F, 0xFD] {
            return Ok(ArchiveFormat::TarZst);
        }
        // POSIX tar: "ustar" at offset 257
        if n >= 262 && magic[257..262] == *b"ustar" {
            return Ok(ArchiveFormat::Tar);
        }
    }

    let name = path.to_string_lossy().to_lowercase();
    if name.ends_with(".zip") {
        Ok(ArchiveFormat::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveFormat::TarGz)
    } else if name.ends_with(".tar.zst") {
        Ok(ArchiveFormat::TarZst)
    } else if name.ends_with(".tar") {
        Ok(ArchiveFormat::Tar)
    } else {
        Err(Error::NotAnArchive(path.display().to_string()))
    }
}

/// Fill as much of `buf` as the file provides
fn read_prefix(file: &mut File, buf: &mut [u8]) -> usize {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) | Err(_) => break,
            Ok(n) => filled += n,
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_detect_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(detect_format(dir.path()).unwrap(), ArchiveFormat::Directory);
    }

    #[test]
    fn test_detect_zip_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"PK\x03\x04rest-of-header").unwrap();
        assert_eq!(detect_format(file.path()).unwrap(), ArchiveFormat::Zip);
    }

    #[test]
    fn test_detect_gzip_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x1F, 0x8B, 0x08, 0x00]).unwrap();
        assert_eq!(detect_format(file.path()).unwrap(), ArchiveFormat::TarGz);
    }

    #[test]
    fn test_detect_zstd_magic() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0x28, 0xB5, 0x2F, 0xFD, 0x00]).unwrap();
        assert_eq!(detect_format(file.path()).unwrap(), ArchiveFormat::TarZst);
    }

    #[test]
    fn test_detect_by_extension() {
        let file = tempfile::Builder::new().suffix(".tar").tempfile().unwrap();
        assert_eq!(detect_format(file.path()).unwrap(), ArchiveFormat::Tar);
    }

    #[test]
    fn test_not_an_archive() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"plain text").unwrap();
        assert!(matches!(
            detect_format(file.path()),
            Err(Error::NotAnArchive(_))
        ));
    }

    #[test]
    fn test_missing_locator() {
        assert!(matches!(
            detect_format("/nonexistent/export.zip"),
            Err(Error::NotFound(_))
        ));
    }
}
