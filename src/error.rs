// src/error.rs

//! Error types for the import engine
//!
//! Only a handful of variants are fatal to a whole import run (see
//! [`Error::is_fatal`]). Everything else is caught per resource, per
//! principal or per access-control entry and turned into a report line.

use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Archive locator does not exist
    #[error("archive not found: {0}")]
    NotFound(String),

    /// Locator exists but is neither a directory nor a known container
    #[error("not an archive: {0}")]
    NotAnArchive(String),

    /// Named entry is absent from the archive
    #[error("archive entry missing: {0}")]
    EntryMissing(String),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("malformed XML: {0}")]
    MalformedXml(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// No importer is registered for the manifest's version marker
    #[error("no importer registered for export version {0}")]
    UnsupportedVersion(u32),

    #[error("unknown resource type: {0}")]
    UnknownResourceType(String),

    /// Resource, principal or property definition does not exist in the target
    #[error("not found in target repository: {0}")]
    NotFoundError(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("resource is locked by another user: {0}")]
    Locked(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("invalid UUID: {0}")]
    Uuid(#[from] uuid::Error),

    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid translation rule: {0}")]
    InvalidRule(String),

    #[error("parse error: {0}")]
    ParseError(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this error aborts a whole import run
    ///
    /// Archive open, manifest parse and version selection failures are
    /// fatal; every other error is reported and the run continues.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_)
                | Self::NotAnArchive(_)
                | Self::MalformedXml(_)
                | Self::InvalidManifest(_)
                | Self::UnsupportedVersion(_)
        )
    }
}

impl From<quick_xml::Error> for Error {
    fn from(e: quick_xml::Error) -> Self {
        Self::MalformedXml(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(e: regex::Error) -> Self {
        Self::InvalidRule(e.to_string())
    }
}
