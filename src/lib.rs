// src/lib.rs

//! Content archive import engine
//!
//! Reads export archives (directories, zip files or tarballs holding a
//! `manifest.xml` and the exported files) and writes their groups, users and
//! resources into a virtual file system repository.
//!
//! # Architecture
//!
//! - Archive reader: uniform entry access over every container format
//! - Manifest: typed records, interpreted per export version
//! - Importers: one per manifest version, selected through a registry
//! - Post-processing: link resolution, legacy page merge, body cleanup
//! - Target: the [`TargetRepository`] seam, with a SQLite implementation

pub mod archive;
pub mod config;
pub mod db;
mod error;
pub mod hash;
pub mod import;
pub mod manifest;
pub mod report;
pub mod target;
pub mod translate;
pub mod xml;

pub use archive::{Archive, ArchiveFormat};
pub use config::ImportConfig;
pub use db::DbRepository;
pub use error::{Error, Result};
pub use hash::{Fingerprint, HashAlgorithm, Hasher};
pub use import::{ImportOptions, ImportOutcome, Importer, ImporterRegistry, ResourceImporter};
pub use manifest::Manifest;
pub use report::{
    CallbackReport, LogReport, MemoryReport, ReportFormat, ReportSink, ReportSummary,
    SilentReport,
};
pub use target::{Resource, ResourceType, TargetRepository};
pub use translate::{PrincipalTranslator, ResourceTranslator};
