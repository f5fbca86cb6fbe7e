// src/db/repository.rs

//! [`TargetRepository`] over a SQLite connection
//!
//! The repository acts on behalf of one session user. New resources are
//! owned by that user, locks are taken in its name, and principal import
//! is allowed only when it belongs to the administrators group.

use super::migrations::{ADMIN_GROUP_ID, ADMIN_USER_NAME};
use super::models::{principal, property, resource};
use super::schema;
use crate::error::{Error, Result};
use crate::target::{
    AccessControlEntry, FOLDER_SEPARATOR, Group, NewUser, Property, PropertyDefinition, Resource,
    ResourceState, ResourceType, TargetRepository, User, parent_folder,
};
use rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

/// Milliseconds since the epoch
fn now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Canonical storage path: folders end with a separator, files do not
fn storage_path(path: &str, folder: bool) -> String {
    let trimmed = path.trim_end_matches(FOLDER_SEPARATOR);
    if folder {
        format!("{trimmed}/")
    } else if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct DbRepository {
    conn: Connection,
    session_user: Uuid,
}

impl DbRepository {
    /// Wrap a connection, migrating it and logging in as the administrator
    pub fn new(conn: Connection) -> Result<Self> {
        schema::migrate(&conn)?;
        let admin = principal::find_user_by_name(&conn, ADMIN_USER_NAME)?
            .ok_or_else(|| Error::NotFoundError(format!("user {ADMIN_USER_NAME}")))?;
        Ok(Self {
            conn,
            session_user: admin.id,
        })
    }

    pub fn open(db_path: &str) -> Result<Self> {
        Self::new(super::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(super::open_in_memory()?)
    }

    /// Switch the session to another existing user
    pub fn login(&mut self, name: &str) -> Result<()> {
        let user = principal::find_user_by_name(&self.conn, name)?
            .ok_or_else(|| Error::NotFoundError(format!("user {name}")))?;
        debug!("Session user is now {}", user.name);
        self.session_user = user.id;
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Incremented by every finished import
    pub fn cache_generation(&self) -> Result<u64> {
        let value: String = self.conn.query_row(
            "SELECT value FROM repository_meta WHERE key = 'cache_generation'",
            [],
            |row| row.get(0),
        )?;
        value
            .parse()
            .map_err(|_| Error::ParseError(format!("cache generation: {value}")))
    }

    /// Stored password material of a user
    pub fn stored_password(&self, name: &str) -> Result<Option<String>> {
        principal::find_password(&self.conn, name)
    }

    /// Resource at `path`, trying the folder form when the file form is absent
    fn lookup(&self, path: &str) -> Result<Option<Resource>> {
        if let Some(found) = resource::find_by_path(&self.conn, path)? {
            return Ok(Some(found));
        }
        if !path.ends_with(FOLDER_SEPARATOR) {
            return resource::find_by_path(&self.conn, &format!("{path}/"));
        }
        if path.len() > 1 {
            return resource::find_by_path(&self.conn, path.trim_end_matches(FOLDER_SEPARATOR));
        }
        Ok(None)
    }

    /// Live resource at `path`
    fn require(&self, path: &str) -> Result<Resource> {
        match self.lookup(path)? {
            Some(found) if !found.is_deleted() => Ok(found),
            _ => Err(Error::NotFoundError(path.to_string())),
        }
    }

    fn require_parent(&self, path: &str) -> Result<()> {
        if let Some(parent) = parent_folder(path) {
            let folder = self.require(&parent)?;
            if !folder.is_folder() {
                return Err(Error::NotFoundError(format!("folder {parent}")));
            }
        }
        Ok(())
    }

    /// Fail when another user holds the lock on `path`
    fn check_lock(&self, path: &str) -> Result<()> {
        match resource::lock_owner(&self.conn, path)? {
            Some(owner) if owner != self.session_user => Err(Error::Locked(path.to_string())),
            _ => Ok(()),
        }
    }

    fn require_definition(&self, key: &str) -> Result<()> {
        if property::definition_exists(&self.conn, key)? {
            Ok(())
        } else {
            Err(Error::NotFoundError(format!("property definition {key}")))
        }
    }

    /// Drop content that no row references any more
    fn release_content(&self, resource_id: Uuid) -> Result<()> {
        if resource::reference_count(&self.conn, resource_id)? == 0 {
            resource::delete_content(&self.conn, resource_id)?;
        }
        Ok(())
    }
}

impl TargetRepository for DbRepository {
    fn current_user(&self) -> Result<User> {
        principal::find_user_by_id(&self.conn, self.session_user)?
            .ok_or_else(|| Error::NotFoundError(format!("user {}", self.session_user)))
    }

    fn is_admin(&self) -> Result<bool> {
        let groups = principal::groups_of_user(&self.conn, self.session_user)?;
        Ok(groups.iter().any(|g| g.id == ADMIN_GROUP_ID))
    }

    fn read_resource(&self, path: &str) -> Result<Option<Resource>> {
        self.lookup(path)
    }

    fn import_resource(
        &self,
        path: &str,
        descriptor: &Resource,
        content: Option<&[u8]>,
        properties: &[Property],
    ) -> Result<Resource> {
        let path = storage_path(path, descriptor.is_folder());
        self.require_parent(&path)?;
        for prop in properties {
            self.require_definition(&prop.key)?;
        }

        let tx = self.conn.unchecked_transaction()?;

        if let Some(existing) = self.lookup(&path)? {
            self.check_lock(&existing.path)?;
            resource::delete_row(&tx, existing.structure_id)?;
            if existing.resource_id != descriptor.resource_id {
                self.release_content(existing.resource_id)?;
            }
        }

        let mut stored = descriptor.clone();
        stored.path = path;
        stored.state = ResourceState::New;
        stored.size = 0;

        let data = if stored.is_folder() {
            None
        } else {
            match content {
                Some(data) => Some(data.to_vec()),
                None => match resource::read_content(&tx, stored.resource_id)? {
                    Some(shared) => {
                        stored.size = shared.len() as i64;
                        None
                    }
                    None => Some(Vec::new()),
                },
            }
        };

        resource::insert(&tx, &stored)?;
        if let Some(data) = data {
            resource::write_content(&tx, stored.resource_id, stored.content_id, &data)?;
            stored.size = data.len() as i64;
        }
        for prop in properties {
            property::write(&tx, &stored, prop)?;
        }

        tx.commit()?;
        debug!("Imported {} as {}", stored.path, stored.resource_type.as_str());
        Ok(stored)
    }

    fn create_resource(
        &self,
        path: &str,
        resource_type: ResourceType,
        content: &[u8],
        properties: &[Property],
    ) -> Result<Resource> {
        let descriptor = Resource::new(path, resource_type, self.session_user, now());
        let content = (!resource_type.is_folder()).then_some(content);
        self.import_resource(path, &descriptor, content, properties)
    }

    fn read_file(&self, path: &str) -> Result<Vec<u8>> {
        let found = self.require(path)?;
        if found.is_folder() {
            return Err(Error::NotFoundError(format!("file {path}")));
        }
        Ok(resource::read_content(&self.conn, found.resource_id)?.unwrap_or_default())
    }

    fn write_file(&self, descriptor: &Resource, content: &[u8]) -> Result<Resource> {
        let existing = self.require(&descriptor.path)?;
        self.check_lock(&existing.path)?;

        let mut stored = descriptor.clone();
        stored.structure_id = existing.structure_id;
        stored.resource_id = existing.resource_id;
        stored.content_id = existing.content_id;
        stored.path = existing.path.clone();
        stored.size = content.len() as i64;
        stored.state = match existing.state {
            ResourceState::New => ResourceState::New,
            _ => ResourceState::Changed,
        };

        let tx = self.conn.unchecked_transaction()?;
        resource::update(&tx, &stored)?;
        resource::write_content(&tx, stored.resource_id, stored.content_id, content)?;
        tx.commit()?;
        Ok(stored)
    }

    fn lock_resource(&self, path: &str) -> Result<()> {
        let found = self.require(path)?;
        self.check_lock(&found.path)?;
        resource::set_lock(&self.conn, &found.path, Some(self.session_user))
    }

    fn unlock_resource(&self, path: &str) -> Result<()> {
        let found = self.require(path)?;
        if !self.is_admin()? {
            self.check_lock(&found.path)?;
        }
        resource::set_lock(&self.conn, &found.path, None)
    }

    fn delete_resource(&self, path: &str, preserve_siblings: bool) -> Result<()> {
        let found = self.require(path)?;
        self.check_lock(&found.path)?;

        if found.is_folder() {
            let folder = &found.path;
            if !resource::children(&self.conn, folder, false)?.is_empty()
                || !resource::children(&self.conn, folder, true)?.is_empty()
            {
                return Err(Error::PermissionDenied(format!(
                    "folder {folder} is not empty"
                )));
            }
        }

        let targets = if preserve_siblings {
            vec![found.clone()]
        } else {
            resource::find_siblings(&self.conn, found.resource_id)?
        };

        let tx = self.conn.unchecked_transaction()?;
        for target in &targets {
            // never-published resources vanish, others are marked
            if target.state == ResourceState::New {
                resource::delete_row(&tx, target.structure_id)?;
            } else {
                resource::set_state(&tx, target.structure_id, ResourceState::Deleted)?;
            }
        }
        if resource::reference_count(&tx, found.resource_id)? == 0 {
            resource::delete_content(&tx, found.resource_id)?;
        }
        tx.commit()?;

        debug!("Deleted {} ({} structure entries)", found.path, targets.len());
        Ok(())
    }

    fn files_in_folder(&self, folder: &str) -> Result<Vec<Resource>> {
        resource::children(&self.conn, &storage_path(folder, true), false)
    }

    fn sub_folders(&self, folder: &str) -> Result<Vec<Resource>> {
        resource::children(&self.conn, &storage_path(folder, true), true)
    }

    fn read_property_definition(&self, key: &str) -> Result<Option<PropertyDefinition>> {
        Ok(property::definition_exists(&self.conn, key)?.then(|| PropertyDefinition {
            name: key.to_string(),
        }))
    }

    fn create_property_definition(&self, key: &str) -> Result<PropertyDefinition> {
        if property::definition_exists(&self.conn, key)? {
            return Err(Error::AlreadyExists(format!("property definition {key}")));
        }
        property::insert_definition(&self.conn, key)?;
        Ok(PropertyDefinition {
            name: key.to_string(),
        })
    }

    fn read_property(
        &self,
        path: &str,
        key: &str,
        search_parents: bool,
    ) -> Result<Option<Property>> {
        let mut current = Some(self.require(path)?.path);
        while let Some(path) = current {
            if let Some(found) = self.lookup(&path)?.filter(|r| !r.is_deleted()) {
                let props = property::find_for_resource(&self.conn, &found)?;
                if let Some(prop) = props.into_iter().find(|p| p.key == key) {
                    return Ok(Some(prop));
                }
            }
            if !search_parents {
                break;
            }
            current = parent_folder(&path);
        }
        Ok(None)
    }

    fn read_properties(&self, path: &str) -> Result<Vec<Property>> {
        let found = self.require(path)?;
        property::find_for_resource(&self.conn, &found)
    }

    fn write_property(&self, path: &str, prop: &Property) -> Result<()> {
        let found = self.require(path)?;
        self.require_definition(&prop.key)?;
        property::write(&self.conn, &found, prop)
    }

    fn import_access_control_entries(
        &self,
        target: &Resource,
        entries: &[AccessControlEntry],
    ) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        property::delete_access_entries(&tx, target.resource_id)?;
        for entry in entries {
            if !principal::principal_exists(&tx, entry.principal_id)? {
                return Err(Error::NotFoundError(format!(
                    "principal {}",
                    entry.principal_id
                )));
            }
            let entry = AccessControlEntry {
                resource_id: target.resource_id,
                ..*entry
            };
            property::insert_access_entry(&tx, &entry)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn read_access_control_entries(&self, resource_id: Uuid) -> Result<Vec<AccessControlEntry>> {
        property::find_access_entries(&self.conn, resource_id)
    }

    fn read_group(&self, name: &str) -> Result<Option<Group>> {
        principal::find_group_by_name(&self.conn, name)
    }

    fn read_group_by_id(&self, id: Uuid) -> Result<Option<Group>> {
        principal::find_group_by_id(&self.conn, id)
    }

    fn create_group(
        &self,
        id: Uuid,
        name: &str,
        description: &str,
        flags: i32,
        parent: Option<&str>,
    ) -> Result<Group> {
        if principal::find_group_by_name(&self.conn, name)?.is_some()
            || principal::find_group_by_id(&self.conn, id)?.is_some()
        {
            return Err(Error::AlreadyExists(format!("group {name}")));
        }

        let parent_id = match parent.filter(|p| !p.is_empty()) {
            Some(parent) => Some(
                principal::find_group_by_name(&self.conn, parent)?
                    .ok_or_else(|| Error::NotFoundError(format!("group {parent}")))?
                    .id,
            ),
            None => None,
        };

        let group = Group {
            id,
            name: name.to_string(),
            description: description.to_string(),
            flags,
            parent_id,
        };
        principal::insert_group(&self.conn, &group)?;
        info!("Created group {}", group.name);
        Ok(group)
    }

    fn read_user(&self, name: &str) -> Result<Option<User>> {
        principal::find_user_by_name(&self.conn, name)
    }

    fn read_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        principal::find_user_by_id(&self.conn, id)
    }

    fn create_user(&self, user: &NewUser) -> Result<User> {
        let id = user.id.unwrap_or_else(Uuid::new_v4);
        if principal::find_user_by_name(&self.conn, &user.name)?.is_some()
            || principal::find_user_by_id(&self.conn, id)?.is_some()
        {
            return Err(Error::AlreadyExists(format!("user {}", user.name)));
        }

        principal::insert_user(&self.conn, id, user)?;
        info!("Created user {}", user.name);
        principal::find_user_by_id(&self.conn, id)?
            .ok_or_else(|| Error::Internal(format!("user {} vanished after insert", user.name)))
    }

    fn add_user_to_group(&self, user: &str, group: &str) -> Result<()> {
        let user = principal::find_user_by_name(&self.conn, user)?
            .ok_or_else(|| Error::NotFoundError(format!("user {user}")))?;
        let group = principal::find_group_by_name(&self.conn, group)?
            .ok_or_else(|| Error::NotFoundError(format!("group {group}")))?;
        principal::add_member(&self.conn, user.id, group.id)
    }

    fn user_groups(&self, user: &str) -> Result<Vec<Group>> {
        let user = principal::find_user_by_name(&self.conn, user)?
            .ok_or_else(|| Error::NotFoundError(format!("user {user}")))?;
        principal::groups_of_user(&self.conn, user.id)
    }

    fn notify_import_finished(&self) -> Result<()> {
        self.conn.execute(
            "UPDATE repository_meta SET value = CAST(CAST(value AS INTEGER) + 1 AS TEXT)
             WHERE key = 'cache_generation'",
            [],
        )?;
        debug!("Import finished, caches invalidated");
        Ok(())
    }
}
