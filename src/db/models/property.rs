// src/db/models/property.rs

//! Property definitions, property values and access control rows

use super::uuid_column;
use crate::error::Result;
use crate::target::{AccessControlEntry, Property, Resource};
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::collections::BTreeMap;
use uuid::Uuid;

pub fn definition_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM property_definitions WHERE name = ?1",
            [name],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn insert_definition(conn: &Connection, name: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO property_definitions (name) VALUES (?1)",
        [name],
    )?;
    Ok(())
}

/// All properties of a resource, keyed and ordered by name
pub fn find_for_resource(conn: &Connection, resource: &Resource) -> Result<Vec<Property>> {
    let mut stmt = conn.prepare(
        "SELECT name, scope, value FROM properties
         WHERE (scope = 'structure' AND owner_id = ?1) OR (scope = 'resource' AND owner_id = ?2)
         ORDER BY name",
    )?;
    let rows = stmt.query_map(
        params![
            resource.structure_id.to_string(),
            resource.resource_id.to_string()
        ],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        },
    )?;

    let mut merged: BTreeMap<String, Property> = BTreeMap::new();
    for row in rows {
        let (name, scope, value) = row?;
        let entry = merged
            .entry(name.clone())
            .or_insert_with(|| Property::new(name));
        if scope == "structure" {
            entry.structure_value = Some(value);
        } else {
            entry.resource_value = Some(value);
        }
    }
    Ok(merged.into_values().collect())
}

/// Write both values of `property`; `None` values are removed
pub fn write(conn: &Connection, resource: &Resource, property: &Property) -> Result<()> {
    let scopes = [
        ("structure", resource.structure_id, &property.structure_value),
        ("resource", resource.resource_id, &property.resource_value),
    ];
    for (scope, owner, value) in scopes {
        match value {
            Some(value) => {
                conn.execute(
                    "INSERT INTO properties (name, scope, owner_id, value) VALUES (?1, ?2, ?3, ?4)
                     ON CONFLICT(name, scope, owner_id) DO UPDATE SET value = excluded.value",
                    params![&property.key, scope, owner.to_string(), value],
                )?;
            }
            None => {
                conn.execute(
                    "DELETE FROM properties WHERE name = ?1 AND scope = ?2 AND owner_id = ?3",
                    params![&property.key, scope, owner.to_string()],
                )?;
            }
        }
    }
    Ok(())
}

fn ace_from_row(row: &Row) -> rusqlite::Result<AccessControlEntry> {
    Ok(AccessControlEntry {
        resource_id: uuid_column(row, 0)?,
        principal_id: uuid_column(row, 1)?,
        allowed: row.get(2)?,
        denied: row.get(3)?,
        flags: row.get(4)?,
    })
}

pub fn find_access_entries(conn: &Connection, resource_id: Uuid) -> Result<Vec<AccessControlEntry>> {
    let mut stmt = conn.prepare(
        "SELECT resource_id, principal_id, allowed, denied, flags
         FROM access_control_entries WHERE resource_id = ?1 ORDER BY principal_id",
    )?;
    let rows = stmt
        .query_map([resource_id.to_string()], ace_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

pub fn delete_access_entries(conn: &Connection, resource_id: Uuid) -> Result<()> {
    conn.execute(
        "DELETE FROM access_control_entries WHERE resource_id = ?1",
        [resource_id.to_string()],
    )?;
    Ok(())
}

pub fn insert_access_entry(conn: &Connection, entry: &AccessControlEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO access_control_entries (resource_id, principal_id, allowed, denied, flags)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(resource_id, principal_id) DO UPDATE SET
             allowed = excluded.allowed, denied = excluded.denied, flags = excluded.flags",
        params![
            entry.resource_id.to_string(),
            entry.principal_id.to_string(),
            entry.allowed,
            entry.denied,
            entry.flags,
        ],
    )?;
    Ok(())
}
