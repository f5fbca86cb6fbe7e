// src/db/models/resource.rs

//! Resource rows and their content
//!
//! A row in `resources` is one structure entry (a path). Siblings are rows
//! sharing a `resource_id`; their content lives once in `contents`.

use super::{conversion_error, optional_uuid_column, uuid_column};
use crate::error::Result;
use crate::target::{Resource, ResourceState, ResourceType, parent_folder};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

const COLUMNS: &str = "structure_id, resource_id, content_id, path, type_name, flags, state,
     date_created, user_created, date_last_modified, user_last_modified,
     date_released, date_expired, size";

pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Resource> {
    let type_name: String = row.get(4)?;
    let resource_type = type_name
        .parse::<ResourceType>()
        .map_err(|e| conversion_error(4, e))?;
    let state: String = row.get(6)?;
    let state = state
        .parse::<ResourceState>()
        .map_err(|e| conversion_error(6, e))?;

    Ok(Resource {
        structure_id: uuid_column(row, 0)?,
        resource_id: uuid_column(row, 1)?,
        content_id: uuid_column(row, 2)?,
        path: row.get(3)?,
        resource_type,
        flags: row.get(5)?,
        state,
        date_created: row.get(7)?,
        user_created: uuid_column(row, 8)?,
        date_last_modified: row.get(9)?,
        user_last_modified: uuid_column(row, 10)?,
        date_released: row.get(11)?,
        date_expired: row.get(12)?,
        size: row.get(13)?,
    })
}

pub fn find_by_path(conn: &Connection, path: &str) -> Result<Option<Resource>> {
    let sql = format!("SELECT {COLUMNS} FROM resources WHERE path = ?1");
    Ok(conn.query_row(&sql, [path], from_row).optional()?)
}

/// Live rows sharing `resource_id`
pub fn find_siblings(conn: &Connection, resource_id: Uuid) -> Result<Vec<Resource>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM resources WHERE resource_id = ?1 AND state != 'deleted' ORDER BY path"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([resource_id.to_string()], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Live direct children of `folder`
pub fn children(conn: &Connection, folder: &str, folders: bool) -> Result<Vec<Resource>> {
    let op = if folders { "=" } else { "!=" };
    let sql = format!(
        "SELECT {COLUMNS} FROM resources
         WHERE parent_path = ?1 AND state != 'deleted' AND type_name {op} 'folder'
         ORDER BY path"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([folder], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn insert(conn: &Connection, resource: &Resource) -> Result<()> {
    let parent = parent_folder(&resource.path).unwrap_or_default();
    conn.execute(
        "INSERT INTO resources (structure_id, resource_id, content_id, path, parent_path,
                                type_name, flags, state, date_created, user_created,
                                date_last_modified, user_last_modified, date_released,
                                date_expired, size)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            resource.structure_id.to_string(),
            resource.resource_id.to_string(),
            resource.content_id.to_string(),
            &resource.path,
            parent,
            resource.resource_type.as_str(),
            resource.flags,
            resource.state.as_str(),
            resource.date_created,
            resource.user_created.to_string(),
            resource.date_last_modified,
            resource.user_last_modified.to_string(),
            resource.date_released,
            resource.date_expired,
            resource.size,
        ],
    )?;
    Ok(())
}

/// Update the mutable metadata of an existing row
pub fn update(conn: &Connection, resource: &Resource) -> Result<()> {
    conn.execute(
        "UPDATE resources SET type_name = ?2, flags = ?3, state = ?4, date_last_modified = ?5,
                user_last_modified = ?6, date_released = ?7, date_expired = ?8, size = ?9
         WHERE structure_id = ?1",
        params![
            resource.structure_id.to_string(),
            resource.resource_type.as_str(),
            resource.flags,
            resource.state.as_str(),
            resource.date_last_modified,
            resource.user_last_modified.to_string(),
            resource.date_released,
            resource.date_expired,
            resource.size,
        ],
    )?;
    Ok(())
}

pub fn set_state(conn: &Connection, structure_id: Uuid, state: ResourceState) -> Result<()> {
    conn.execute(
        "UPDATE resources SET state = ?2, locked_by = NULL WHERE structure_id = ?1",
        params![structure_id.to_string(), state.as_str()],
    )?;
    Ok(())
}

/// Remove a row together with its structure properties
pub fn delete_row(conn: &Connection, structure_id: Uuid) -> Result<()> {
    let id = structure_id.to_string();
    conn.execute("DELETE FROM resources WHERE structure_id = ?1", [&id])?;
    conn.execute(
        "DELETE FROM properties WHERE scope = 'structure' AND owner_id = ?1",
        [&id],
    )?;
    Ok(())
}

pub fn lock_owner(conn: &Connection, path: &str) -> Result<Option<Uuid>> {
    let owner = conn
        .query_row(
            "SELECT locked_by FROM resources WHERE path = ?1",
            [path],
            |row| optional_uuid_column(row, 0),
        )
        .optional()?;
    Ok(owner.flatten())
}

pub fn set_lock(conn: &Connection, path: &str, owner: Option<Uuid>) -> Result<()> {
    conn.execute(
        "UPDATE resources SET locked_by = ?2 WHERE path = ?1",
        params![path, owner.map(|id| id.to_string())],
    )?;
    Ok(())
}

pub fn read_content(conn: &Connection, resource_id: Uuid) -> Result<Option<Vec<u8>>> {
    Ok(conn
        .query_row(
            "SELECT data FROM contents WHERE resource_id = ?1",
            [resource_id.to_string()],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn write_content(
    conn: &Connection,
    resource_id: Uuid,
    content_id: Uuid,
    data: &[u8],
) -> Result<()> {
    conn.execute(
        "INSERT INTO contents (resource_id, content_id, data) VALUES (?1, ?2, ?3)
         ON CONFLICT(resource_id) DO UPDATE SET content_id = excluded.content_id,
                                               data = excluded.data",
        params![resource_id.to_string(), content_id.to_string(), data],
    )?;
    // siblings report the shared size
    conn.execute(
        "UPDATE resources SET size = ?2 WHERE resource_id = ?1",
        params![resource_id.to_string(), data.len() as i64],
    )?;
    Ok(())
}

/// Remove content, shared properties and permissions of a resource id
pub fn delete_content(conn: &Connection, resource_id: Uuid) -> Result<()> {
    let id = resource_id.to_string();
    conn.execute("DELETE FROM contents WHERE resource_id = ?1", [&id])?;
    conn.execute(
        "DELETE FROM properties WHERE scope = 'resource' AND owner_id = ?1",
        [&id],
    )?;
    conn.execute(
        "DELETE FROM access_control_entries WHERE resource_id = ?1",
        [&id],
    )?;
    Ok(())
}

/// Rows of any state that still reference `resource_id`
pub fn reference_count(conn: &Connection, resource_id: Uuid) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM resources WHERE resource_id = ?1",
        [resource_id.to_string()],
        |row| row.get(0),
    )?)
}
