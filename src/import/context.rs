// src/import/context.rs

//! Per-run import state
//!
//! One [`ImportContext`] is built for every call to
//! [`Importer::import_archive`](super::Importer::import_archive) and dropped
//! when the run ends. The pointer table, the page/body bookkeeping and the
//! property-definition memo live here, never in an importer.

use super::ImportOptions;
use crate::archive::Archive;
use crate::config::ImportConfig;
use crate::error::{Error, Result};
use crate::hash::{Fingerprint, HashAlgorithm, fingerprint};
use crate::report::Reporter;
use crate::target::{
    AccessControlEntry, Property, Resource, TargetRepository, User, parent_folder,
};
use crate::translate::{PrincipalTranslator, ResourceTranslator};
use crate::xml;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

/// Property holding the character encoding of a legacy body
pub const PROPERTY_CONTENT_ENCODING: &str = "content-encoding";

/// Property holding the locale list of a resource or folder
pub const PROPERTY_LOCALE: &str = "locale";

/// A link resource waiting for the post-processing pass
#[derive(Debug, Clone)]
pub struct PendingLink {
    /// Raw link target: an absolute path or a literal value
    pub target: String,
    pub properties: Vec<Property>,
    /// Descriptor synthesized from the manifest entry
    pub resource: Resource,
    pub access_entries: Vec<AccessControlEntry>,
}

/// A resource written during the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: String,
    /// Content code of files; folders have none
    pub fingerprint: Option<Fingerprint>,
}

pub struct ImportContext<'a> {
    pub repo: &'a dyn TargetRepository,
    pub archive: &'a mut Archive,
    pub config: &'a ImportConfig,
    pub translator: &'a ResourceTranslator,
    pub principals: &'a PrincipalTranslator,
    pub options: &'a ImportOptions,
    pub report: Reporter<'a>,
    /// Destination root, always ending with `/`
    pub import_path: String,
    pub digest: HashAlgorithm,
    pub current_user: User,
    /// Pointer table keyed by destination path
    pub links: BTreeMap<String, PendingLink>,
    /// Legacy page control files awaiting merge
    pub pages: Vec<String>,
    /// Legacy body folders awaiting cleanup, in declaration order
    pub body_folders: Vec<String>,
    pub imported_pages: Vec<String>,
    /// Archive source of each resource id seen so far
    pub resource_sources: HashMap<String, String>,
    pub written: Vec<WrittenFile>,
    checked_definitions: HashSet<String>,
}

impl<'a> ImportContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        repo: &'a dyn TargetRepository,
        archive: &'a mut Archive,
        config: &'a ImportConfig,
        translator: &'a ResourceTranslator,
        principals: &'a PrincipalTranslator,
        options: &'a ImportOptions,
        report: Reporter<'a>,
        destination: &str,
    ) -> Result<Self> {
        let current_user = repo.current_user()?;
        Ok(Self {
            repo,
            archive,
            config,
            translator,
            principals,
            options,
            report,
            import_path: import_root(destination),
            digest: config.digest_algorithm()?,
            current_user,
            links: BTreeMap::new(),
            pages: Vec::new(),
            body_folders: Vec::new(),
            imported_pages: Vec::new(),
            resource_sources: HashMap::new(),
            written: Vec::new(),
            checked_definitions: HashSet::new(),
        })
    }

    /// Absolute target path of a manifest destination, before translation
    pub fn full_path(&self, destination: &str, folder: bool) -> String {
        let mut path = format!("{}{}", self.import_path, destination.trim_start_matches('/'));
        if folder && !path.ends_with('/') {
            path.push('/');
        }
        path
    }

    /// Create the definition for `key` unless this run already checked it
    pub fn ensure_property_definition(&mut self, key: &str) -> Result<()> {
        if self.checked_definitions.contains(key) {
            return Ok(());
        }
        if self.repo.read_property_definition(key)?.is_none() {
            debug!("Creating property definition {}", key);
            match self.repo.create_property_definition(key) {
                Ok(_) | Err(Error::AlreadyExists(_)) => {}
                Err(e) => return Err(e),
            }
        }
        self.checked_definitions.insert(key.to_string());
        Ok(())
    }

    pub fn ensure_property_definitions(&mut self, properties: &[Property]) -> Result<()> {
        for property in properties {
            self.ensure_property_definition(&property.key)?;
        }
        Ok(())
    }

    /// Locale of a resource: its own `locale` property, then the nearest
    /// folder's, then the configured default
    pub fn locale_for(&self, path: &str, properties: &[Property]) -> String {
        let own = Property::find(properties, PROPERTY_LOCALE)
            .and_then(|p| p.value())
            .map(str::to_string);
        let inherited = || {
            let parent = parent_folder(path)?;
            let prop = self
                .repo
                .read_property(&parent, PROPERTY_LOCALE, true)
                .ok()
                .flatten()?;
            prop.value().map(str::to_string)
        };

        own.or_else(inherited)
            .and_then(|value| first_locale(&value))
            .unwrap_or_else(|| self.config.default_locale.clone())
    }

    /// Decode a legacy body with its declared or the default encoding
    pub fn decode_body(&mut self, path: &str, bytes: &[u8], properties: &[Property]) -> String {
        let encoding = Property::find(properties, PROPERTY_CONTENT_ENCODING)
            .and_then(|p| p.value())
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.config.default_encoding.clone());

        let (text, known) = xml::decode_text(bytes, &encoding);
        if !known {
            self.report.warning(&format!(
                "Unknown encoding {encoding} for {path}, decoded as UTF-8"
            ));
        }
        text
    }

    pub fn record_written(&mut self, path: &str, content: Option<&[u8]>) {
        let fingerprint = content.map(|data| fingerprint(self.digest, data));
        self.written.push(WrittenFile {
            path: path.to_string(),
            fingerprint,
        });
    }
}

/// Normalize a destination root to `/.../`
pub fn import_root(destination: &str) -> String {
    let trimmed = destination.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{trimmed}/")
    }
}

fn first_locale(value: &str) -> Option<String> {
    value
        .split(',')
        .next()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
}

/// Report prefix for entry `index` (1-based) of `total`
pub fn progress_label(index: usize, total: usize) -> String {
    format!("( {index} / {total} )")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_root() {
        assert_eq!(import_root(""), "/");
        assert_eq!(import_root("/"), "/");
        assert_eq!(import_root("sites/default"), "/sites/default/");
        assert_eq!(import_root("/sites/default/"), "/sites/default/");
    }

    #[test]
    fn test_first_locale() {
        assert_eq!(first_locale("de, en").as_deref(), Some("de"));
        assert_eq!(first_locale(" ").as_deref(), None);
    }

    #[test]
    fn test_progress_label() {
        assert_eq!(progress_label(3, 12), "( 3 / 12 )");
    }
}
