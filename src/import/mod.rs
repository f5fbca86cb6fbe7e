// src/import/mod.rs

//! Archive import engine
//!
//! [`Importer`] drives one run: it opens the archive, reads the manifest,
//! picks the resource importer for the manifest's version, imports groups
//! and users when the session may, writes every resource entry and finally
//! runs the post-processing passes (links, legacy page merge, body folder
//! cleanup).
//!
//! ```ignore
//! let importer = Importer::new(ImportConfig::default())?;
//! let repo = DbRepository::open("/var/lib/vfsimport/vfs.db")?;
//! let outcome = importer.import_archive(
//!     &repo,
//!     Path::new("export.zip"),
//!     "/sites/default/",
//!     &LogReport,
//!     &ImportOptions::default(),
//! )?;
//! println!("{} resources written", outcome.written.len());
//! ```

mod common;
mod context;
mod postprocess;
mod principals;
mod registry;
mod v2;
mod v3;
mod v4;
mod xmlpage;

pub use context::{
    ImportContext, PROPERTY_CONTENT_ENCODING, PROPERTY_LOCALE, PendingLink, WrittenFile,
    import_root,
};
pub use postprocess::{PROPERTY_BODY_CLASS, PROPERTY_TEMPLATE};
pub use principals::PrincipalPolicy;
pub use registry::{ImporterRegistry, ResourceImporter, UNIFIED_DOCUMENT_VERSION};
pub use v2::ImportVersion2;
pub use v3::ImportVersion3;
pub use v4::ImportVersion4;
pub use xmlpage::{DEFAULT_ELEMENT, PageElement, XmlPage, convert_legacy_body};

use crate::archive::Archive;
use crate::config::ImportConfig;
use crate::error::Result;
use crate::hash::Fingerprint;
use crate::manifest::Manifest;
use crate::report::{ReportFormat, ReportSink, ReportSummary, Reporter};
use crate::target::TargetRepository;
use crate::translate::{PrincipalTranslator, ResourceTranslator};
use std::path::Path;
use tracing::{info, warn};

/// Per-call import options
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Target paths that must not be written
    pub exclude: Vec<String>,
    /// Property stamped on every imported resource
    pub property: Option<(String, String)>,
}

/// Result of a completed import run
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub version: u32,
    /// Every resource written, in write order
    pub written: Vec<WrittenFile>,
    /// Resources imported from legacy page types
    pub imported_pages: Vec<String>,
    pub summary: ReportSummary,
}

impl ImportOutcome {
    pub fn written_paths(&self) -> Vec<&str> {
        self.written.iter().map(|w| w.path.as_str()).collect()
    }

    /// Fingerprints of the written files, parallel to the file paths
    pub fn file_codes(&self) -> Vec<(&str, &Fingerprint)> {
        self.written
            .iter()
            .filter_map(|w| w.fingerprint.as_ref().map(|f| (w.path.as_str(), f)))
            .collect()
    }
}

/// Imports archives into a target repository
pub struct Importer {
    config: ImportConfig,
    translator: ResourceTranslator,
    principals: PrincipalTranslator,
    registry: ImporterRegistry,
}

impl Importer {
    /// Build an importer; malformed translation rules are rejected here
    pub fn new(config: ImportConfig) -> Result<Self> {
        config.digest_algorithm()?;
        let translator = ResourceTranslator::from_config(&config)?;
        let principals = PrincipalTranslator::new(config.principals.clone());
        Ok(Self {
            config,
            translator,
            principals,
            registry: ImporterRegistry::new(),
        })
    }

    pub fn config(&self) -> &ImportConfig {
        &self.config
    }

    pub fn registry(&self) -> &ImporterRegistry {
        &self.registry
    }

    /// Registry for adding or replacing version importers
    pub fn registry_mut(&mut self) -> &mut ImporterRegistry {
        &mut self.registry
    }

    /// Import the archive at `locator` below `destination`
    ///
    /// Errors that stop the run are also reported to `report`. Once the
    /// archive is open it is closed and the target is notified, whatever
    /// the outcome.
    pub fn import_archive(
        &self,
        repo: &dyn TargetRepository,
        locator: &Path,
        destination: &str,
        report: &dyn ReportSink,
        options: &ImportOptions,
    ) -> Result<ImportOutcome> {
        let mut reporter = Reporter::new(report);
        let mut archive = match Archive::open(locator) {
            Ok(archive) => archive,
            Err(e) => {
                reporter.error(&format!("Cannot open {}: {e}", locator.display()));
                return Err(e);
            }
        };

        let result = self.import_opened(repo, &mut archive, reporter, destination, options);
        archive.close();

        if let Err(e) = repo.notify_import_finished() {
            warn!("Import completion notification failed: {}", e);
            report.print(
                ReportFormat::Warning,
                &format!("Import completion notification failed: {e}"),
            );
        }
        if let Ok(outcome) = &result {
            info!(
                "Imported {} (version {}): {} ok, {} skipped, {} warnings, {} errors",
                locator.display(),
                outcome.version,
                outcome.summary.ok,
                outcome.summary.skipped,
                outcome.summary.warnings,
                outcome.summary.errors
            );
        }
        result
    }

    fn import_opened(
        &self,
        repo: &dyn TargetRepository,
        archive: &mut Archive,
        mut reporter: Reporter<'_>,
        destination: &str,
        options: &ImportOptions,
    ) -> Result<ImportOutcome> {
        let manifest = match archive.read_manifest() {
            Ok(manifest) => manifest,
            Err(e) => {
                reporter.error(&format!("Cannot read manifest: {e}"));
                return Err(e);
            }
        };

        reporter.note(&format!("Import Version {}", manifest.version));
        report_info(&mut reporter, &manifest);

        let importer = match self.registry.select(manifest.version) {
            Ok(importer) => importer,
            Err(e) => {
                reporter.error(&format!("Cannot import: {e}"));
                return Err(e);
            }
        };

        let mut ctx = ImportContext::new(
            repo,
            archive,
            &self.config,
            &self.translator,
            &self.principals,
            options,
            reporter,
            destination,
        )?;

        if repo.is_admin()? {
            let policy = importer.principal_policy();
            principals::import_groups(&mut ctx, &manifest, policy)?;
            principals::import_users(&mut ctx, &manifest, policy)?;
        }

        importer.import_resources(&mut ctx, &manifest)?;
        postprocess::convert_pointer_to_siblings(&mut ctx);
        if importer.merges_legacy_pages() && self.config.convert_to_xml_page {
            postprocess::merge_page_files(&mut ctx);
            postprocess::remove_folders(&mut ctx);
        }

        let summary = ctx.report.summary();
        Ok(ImportOutcome {
            version: manifest.version,
            written: ctx.written,
            imported_pages: ctx.imported_pages,
            summary,
        })
    }

    /// Destination paths of archive files that already exist in the target
    pub fn conflicting_files(
        &self,
        repo: &dyn TargetRepository,
        locator: &Path,
        destination: &str,
    ) -> Result<Vec<String>> {
        let manifest = read_manifest(locator)?;
        let import_path = import_root(destination);

        let mut conflicts = Vec::new();
        for entry in &manifest.resources {
            if entry.source.as_deref().is_none_or(str::is_empty) {
                continue;
            }
            let Some(name) = entry.destination.as_deref() else {
                continue;
            };
            let path = self
                .translator
                .translate(&format!("{import_path}{}", name.trim_start_matches('/')));
            if let Some(existing) = repo.read_resource(&path)?
                && !existing.is_deleted()
            {
                conflicts.push(path);
            }
        }
        Ok(conflicts)
    }

    /// Top-level folders touched by the archive
    ///
    /// A top-level folder that does not exist yet means the whole tree is
    /// affected, and the result collapses to `/`.
    pub fn project_resources(
        &self,
        repo: &dyn TargetRepository,
        locator: &Path,
        destination: &str,
    ) -> Result<Vec<String>> {
        let manifest = read_manifest(locator)?;
        let import_path = import_root(destination);

        let mut resources: Vec<String> = Vec::new();
        for entry in &manifest.resources {
            let Some(name) = entry.destination.as_deref() else {
                continue;
            };
            let name = name.trim_start_matches('/');
            let top = match name.find('/') {
                Some(index) => &name[..=index],
                None => continue,
            };
            let folder = format!("{import_path}{top}");
            if resources.contains(&folder) || resources.iter().any(|r| r == "/") {
                continue;
            }
            match repo.read_resource(&folder)? {
                Some(found) if found.is_folder() && !found.is_deleted() => resources.push(folder),
                _ => resources.push("/".to_string()),
            }
        }

        if resources.iter().any(|r| r == "/") {
            return Ok(vec!["/".to_string()]);
        }
        Ok(resources)
    }
}

fn read_manifest(locator: &Path) -> Result<Manifest> {
    let mut archive = Archive::open(locator)?;
    let manifest = archive.read_manifest();
    archive.close();
    manifest
}

fn report_info(reporter: &mut Reporter<'_>, manifest: &Manifest) {
    let info = &manifest.info;
    let fields = [
        ("Exported by", &info.creator),
        ("Exported from", &info.opencms_version),
        ("Export date", &info.create_date),
        ("Project", &info.project),
    ];
    for (label, value) in fields {
        if let Some(value) = value.as_deref().filter(|v| !v.is_empty()) {
            reporter.note(&format!("{label}: {value}"));
        }
    }
}
