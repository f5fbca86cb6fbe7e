// src/target/mod.rs

//! Target repository abstraction
//!
//! Importers never touch storage directly. Everything they need from the
//! content repository (resource and property persistence, principals,
//! access control, locking) goes through [`TargetRepository`], so the
//! import engine can run against the bundled SQLite store or any other
//! implementation.

mod types;

pub use types::{
    AccessControlEntry, DATE_EXPIRED_DEFAULT, DATE_RELEASED_DEFAULT, FOLDER_SEPARATOR, Group,
    NewUser, Property, PropertyDefinition, Resource, ResourceState, ResourceType, User, UserInfo,
    parent_folder, resource_name,
};

use crate::error::{Error, Result};
use uuid::Uuid;

/// Operations the import engine requires from a content repository
///
/// Paths are absolute; folder paths end with `/`. Reads return `Ok(None)`
/// when the requested object does not exist.
pub trait TargetRepository {
    /// The user the import runs as
    fn current_user(&self) -> Result<User>;

    /// Whether the current user may import principals
    fn is_admin(&self) -> Result<bool>;

    /// Resolve a resource type by its registered name
    fn resource_type(&self, name: &str) -> Result<ResourceType> {
        name.parse()
            .map_err(|_| Error::UnknownResourceType(name.to_string()))
    }

    /// Read a resource, including ones marked deleted
    fn read_resource(&self, path: &str) -> Result<Option<Resource>>;

    /// Persist a resource with the identities and metadata of `resource`
    ///
    /// With `content == None` a file shares the content already stored for
    /// its resource id, which is how siblings are created. An existing
    /// resource at `path` is replaced.
    fn import_resource(
        &self,
        path: &str,
        resource: &Resource,
        content: Option<&[u8]>,
        properties: &[Property],
    ) -> Result<Resource>;

    /// Create a resource with fresh identities owned by the current user
    fn create_resource(
        &self,
        path: &str,
        resource_type: ResourceType,
        content: &[u8],
        properties: &[Property],
    ) -> Result<Resource>;

    fn read_file(&self, path: &str) -> Result<Vec<u8>>;

    /// Replace the content and type of an existing file
    ///
    /// Dates and users are taken from `resource`, so callers can restore
    /// the original modification stamp.
    fn write_file(&self, resource: &Resource, content: &[u8]) -> Result<Resource>;

    fn lock_resource(&self, path: &str) -> Result<()>;

    fn unlock_resource(&self, path: &str) -> Result<()>;

    /// Delete a resource; siblings sharing its content survive when
    /// `preserve_siblings` is set
    fn delete_resource(&self, path: &str, preserve_siblings: bool) -> Result<()>;

    /// Live files directly inside `folder`
    fn files_in_folder(&self, folder: &str) -> Result<Vec<Resource>>;

    /// Live folders directly inside `folder`
    fn sub_folders(&self, folder: &str) -> Result<Vec<Resource>>;

    fn read_property_definition(&self, key: &str) -> Result<Option<PropertyDefinition>>;

    fn create_property_definition(&self, key: &str) -> Result<PropertyDefinition>;

    /// Read one property, optionally walking up the parent folders
    fn read_property(&self, path: &str, key: &str, search_parents: bool)
    -> Result<Option<Property>>;

    fn read_properties(&self, path: &str) -> Result<Vec<Property>>;

    fn write_property(&self, path: &str, property: &Property) -> Result<()>;

    /// Replace the access control list of `resource` as one batch
    fn import_access_control_entries(
        &self,
        resource: &Resource,
        entries: &[AccessControlEntry],
    ) -> Result<()>;

    fn read_access_control_entries(&self, resource_id: Uuid) -> Result<Vec<AccessControlEntry>>;

    fn read_group(&self, name: &str) -> Result<Option<Group>>;

    fn read_group_by_id(&self, id: Uuid) -> Result<Option<Group>>;

    /// Create a group below the named parent; the parent must exist
    fn create_group(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        flags: i32,
        parent: Option<&str>,
    ) -> Result<Group>;

    fn read_user(&self, name: &str) -> Result<Option<User>>;

    fn read_user_by_id(&self, id: Uuid) -> Result<Option<User>>;

    fn create_user(&self, user: &NewUser) -> Result<User>;

    fn add_user_to_group(&self, user: &str, group: &str) -> Result<()>;

    fn user_groups(&self, user: &str) -> Result<Vec<Group>>;

    /// Broadcast that an import finished so caches are invalidated
    fn notify_import_finished(&self) -> Result<()>;
}
