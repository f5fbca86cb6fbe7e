// src/config.rs

//! Import configuration
//!
//! Loaded from TOML and passed to the importer at construction time. A
//! missing file section falls back to the defaults below.
//!
//! ```toml
//! convert_to_xml_page = true
//! default_encoding = "ISO-8859-1"
//! immutable_resources = ["/system/shared/"]
//! ignored_properties = ["internal"]
//!
//! [translation]
//! rules = ["s#/default/vfs/content/bodys/(.*)#/default/vfs/system/bodies/$1#"]
//!
//! [principals.users]
//! Guest = "guest"
//! ```

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Folder legacy page bodies were exported to
pub const DEFAULT_BODIES_FOLDER: &str = "/system/bodies/";

/// Complete import configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConfig {
    /// Directory-name translation
    #[serde(default)]
    pub translation: TranslationConfig,

    /// Paths that are never overwritten once they exist
    #[serde(default)]
    pub immutable_resources: Vec<String>,

    /// Property keys dropped on import
    #[serde(default)]
    pub ignored_properties: Vec<String>,

    /// Convert legacy pages into unified xml pages
    #[serde(default = "default_true")]
    pub convert_to_xml_page: bool,

    /// Encoding of legacy page bodies without a content-encoding property
    #[serde(default = "default_encoding")]
    pub default_encoding: String,

    /// Locale for unified documents when no locale property is set
    #[serde(default = "default_locale")]
    pub default_locale: String,

    #[serde(default = "default_bodies_folder")]
    pub bodies_folder: String,

    /// Legacy principal names mapped to target names
    #[serde(default)]
    pub principals: PrincipalTranslationConfig,

    /// Fingerprint algorithm name ("md5" or "sha256")
    #[serde(default = "default_digest")]
    pub digest: String,
}

/// Translation rules applied to destination paths
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Rules of the form `s#search#replace#`
    #[serde(default)]
    pub rules: Vec<String>,

    /// Keep applying later rules after one matched
    #[serde(default)]
    pub continue_matching: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrincipalTranslationConfig {
    #[serde(default)]
    pub users: HashMap<String, String>,
    #[serde(default)]
    pub groups: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

fn default_encoding() -> String {
    "UTF-8".to_string()
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_bodies_folder() -> String {
    DEFAULT_BODIES_FOLDER.to_string()
}

fn default_digest() -> String {
    "md5".to_string()
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            translation: TranslationConfig::default(),
            immutable_resources: Vec::new(),
            ignored_properties: Vec::new(),
            convert_to_xml_page: true,
            default_encoding: default_encoding(),
            default_locale: default_locale(),
            bodies_folder: default_bodies_folder(),
            principals: PrincipalTranslationConfig::default(),
            digest: default_digest(),
        }
    }
}

impl ImportConfig {
    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self> {
        let config: ImportConfig = toml::from_str(content)?;
        config.digest_algorithm()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&content)
    }

    pub fn digest_algorithm(&self) -> Result<HashAlgorithm> {
        self.digest.parse().map_err(Error::Config)
    }

    /// Whether `path` is protected from being overwritten
    pub fn is_immutable(&self, path: &str) -> bool {
        self.immutable_resources.iter().any(|p| p == path)
    }

    pub fn is_ignored_property(&self, key: &str) -> bool {
        self.ignored_properties.iter().any(|p| p == key)
    }
}
