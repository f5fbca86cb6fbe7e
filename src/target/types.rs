// src/target/types.rs

//! Value types exchanged with the target repository

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Release date of a resource that was never given one
pub const DATE_RELEASED_DEFAULT: i64 = 0;

/// Expiry date of a resource that never expires
pub const DATE_EXPIRED_DEFAULT: i64 = i64::MAX;

/// Path separator; folder paths end with it
pub const FOLDER_SEPARATOR: char = '/';

/// Resource types known to the target repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Folder,
    Plain,
    Binary,
    Image,
    Jsp,
    /// Legacy page control file
    Page,
    /// Legacy page variant without a separate body file
    NewPage,
    /// Unified document
    XmlPage,
    /// Pointer to another resource or a literal link
    Link,
    XmlTemplate,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Folder => "folder",
            ResourceType::Plain => "plain",
            ResourceType::Binary => "binary",
            ResourceType::Image => "image",
            ResourceType::Jsp => "jsp",
            ResourceType::Page => "page",
            ResourceType::NewPage => "newpage",
            ResourceType::XmlPage => "xmlpage",
            ResourceType::Link => "pointer",
            ResourceType::XmlTemplate => "XMLTemplate",
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ResourceType::Folder)
    }

    /// Page types that are converted into unified documents
    pub fn is_legacy_page(&self) -> bool {
        matches!(self, ResourceType::Page | ResourceType::NewPage)
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "folder" => Ok(ResourceType::Folder),
            "plain" => Ok(ResourceType::Plain),
            "binary" => Ok(ResourceType::Binary),
            "image" => Ok(ResourceType::Image),
            "jsp" => Ok(ResourceType::Jsp),
            "page" => Ok(ResourceType::Page),
            "newpage" => Ok(ResourceType::NewPage),
            "xmlpage" => Ok(ResourceType::XmlPage),
            "link" | "pointer" => Ok(ResourceType::Link),
            "xmltemplate" => Ok(ResourceType::XmlTemplate),
            _ => Err(format!("Invalid resource type: {s}")),
        }
    }
}

/// Lifecycle state of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceState {
    Unchanged,
    Changed,
    #[default]
    New,
    Deleted,
}

impl ResourceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceState::Unchanged => "unchanged",
            ResourceState::Changed => "changed",
            ResourceState::New => "new",
            ResourceState::Deleted => "deleted",
        }
    }
}

impl FromStr for ResourceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unchanged" => Ok(ResourceState::Unchanged),
            "changed" => Ok(ResourceState::Changed),
            "new" => Ok(ResourceState::New),
            "deleted" => Ok(ResourceState::Deleted),
            _ => Err(format!("Invalid resource state: {s}")),
        }
    }
}

/// A resource descriptor
///
/// The structure id identifies this path entry; the resource id is shared
/// by all siblings; the content id names the stored content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub structure_id: Uuid,
    pub resource_id: Uuid,
    pub content_id: Uuid,
    pub path: String,
    pub resource_type: ResourceType,
    pub flags: i32,
    pub state: ResourceState,
    pub date_created: i64,
    pub user_created: Uuid,
    pub date_last_modified: i64,
    pub user_last_modified: Uuid,
    pub date_released: i64,
    pub date_expired: i64,
    pub size: i64,
}

impl Resource {
    /// New descriptor with fresh identities, owned by `user` at time `now`
    pub fn new(path: impl Into<String>, resource_type: ResourceType, user: Uuid, now: i64) -> Self {
        Self {
            structure_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            content_id: Uuid::new_v4(),
            path: path.into(),
            resource_type,
            flags: 0,
            state: ResourceState::New,
            date_created: now,
            user_created: user,
            date_last_modified: now,
            user_last_modified: user,
            date_released: DATE_RELEASED_DEFAULT,
            date_expired: DATE_EXPIRED_DEFAULT,
            size: 0,
        }
    }

    pub fn is_folder(&self) -> bool {
        self.resource_type.is_folder()
    }

    pub fn is_deleted(&self) -> bool {
        self.state == ResourceState::Deleted
    }

    /// Last path segment without a trailing separator
    pub fn name(&self) -> &str {
        resource_name(&self.path)
    }
}

/// Last segment of `path`, ignoring a trailing separator
pub fn resource_name(path: &str) -> &str {
    let trimmed = path.strip_suffix(FOLDER_SEPARATOR).unwrap_or(path);
    match trimmed.rfind(FOLDER_SEPARATOR) {
        Some(pos) => &trimmed[pos + 1..],
        None => trimmed,
    }
}

/// Folder containing `path`, with a trailing separator; the root has none
pub fn parent_folder(path: &str) -> Option<String> {
    let trimmed = path.strip_suffix(FOLDER_SEPARATOR).unwrap_or(path);
    trimmed
        .rfind(FOLDER_SEPARATOR)
        .map(|pos| trimmed[..=pos].to_string())
}

/// A property with its per-structure and per-resource (shared) values
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Property {
    pub key: String,
    pub structure_value: Option<String>,
    pub resource_value: Option<String>,
}

impl Property {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn structure(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            structure_value: Some(value.into()),
            resource_value: None,
        }
    }

    /// Effective value: the structure value wins over the shared one
    pub fn value(&self) -> Option<&str> {
        self.structure_value
            .as_deref()
            .or(self.resource_value.as_deref())
    }

    /// Look up `key` in a property list
    pub fn find<'a>(properties: &'a [Property], key: &str) -> Option<&'a Property> {
        properties.iter().find(|p| p.key == key)
    }
}

/// A registered property key; values can only be written for defined keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDefinition {
    pub name: String,
}

/// Permissions granted to a principal on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessControlEntry {
    pub resource_id: Uuid,
    pub principal_id: Uuid,
    pub allowed: i32,
    pub denied: i32,
    pub flags: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub flags: i32,
    pub parent_id: Option<Uuid>,
}

/// Free-form user info, serialized as JSON by the repository
pub type UserInfo = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub flags: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub section: String,
    pub default_group: Option<String>,
    pub user_type: i32,
    pub info: UserInfo,
}

/// Everything needed to create a user
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewUser {
    pub id: Option<Uuid>,
    pub name: String,
    /// Decoded password material, stored as given
    pub password: String,
    pub recovery_password: String,
    pub description: String,
    pub flags: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub address: String,
    pub section: String,
    pub default_group: Option<String>,
    pub user_type: i32,
    pub info: UserInfo,
}
