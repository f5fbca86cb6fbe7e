// src/import/registry.rs

//! Version dispatch
//!
//! Each manifest schema version is handled by one [`ResourceImporter`].
//! The registry maps version numbers to importers; callers may register
//! additional versions or replace the bundled ones.

use super::context::ImportContext;
use super::principals::PrincipalPolicy;
use super::{v2::ImportVersion2, v3::ImportVersion3, v4::ImportVersion4};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use std::collections::BTreeMap;

/// First version whose archives already carry unified documents
pub const UNIFIED_DOCUMENT_VERSION: u32 = 3;

/// Imports the resource section of one manifest schema version
pub trait ResourceImporter: Send + Sync {
    fn version(&self) -> u32;

    /// How groups and users of this version are identified
    fn principal_policy(&self) -> PrincipalPolicy {
        PrincipalPolicy::default()
    }

    /// Walk the manifest's resources in order and write them to the target
    fn import_resources(&self, ctx: &mut ImportContext<'_>, manifest: &Manifest) -> Result<()>;

    /// Whether legacy page/body pairs need merging after the main pass
    fn merges_legacy_pages(&self) -> bool {
        self.version() < UNIFIED_DOCUMENT_VERSION
    }
}

pub struct ImporterRegistry {
    importers: BTreeMap<u32, Box<dyn ResourceImporter>>,
}

impl ImporterRegistry {
    /// Registry without any importer
    pub fn empty() -> Self {
        Self {
            importers: BTreeMap::new(),
        }
    }

    /// Registry with the bundled importers for versions 2, 3 and 4
    pub fn new() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(ImportVersion2));
        registry.register(Box::new(ImportVersion3));
        registry.register(Box::new(ImportVersion4));
        registry
    }

    /// Add an importer, returning the one it replaces
    pub fn register(
        &mut self,
        importer: Box<dyn ResourceImporter>,
    ) -> Option<Box<dyn ResourceImporter>> {
        self.importers.insert(importer.version(), importer)
    }

    pub fn select(&self, version: u32) -> Result<&dyn ResourceImporter> {
        self.importers
            .get(&version)
            .map(|importer| importer.as_ref())
            .ok_or(Error::UnsupportedVersion(version))
    }

    pub fn versions(&self) -> Vec<u32> {
        self.importers.keys().copied().collect()
    }
}

impl Default for ImporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}
