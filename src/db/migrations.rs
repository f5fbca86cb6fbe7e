// src/db/migrations.rs
//! Database migration implementations
//!
//! Each migration function handles a single version upgrade.

use crate::error::Result;
use rusqlite::{Connection, params};
use tracing::debug;
use uuid::Uuid;

/// Built-in administrator account
pub const ADMIN_USER_ID: Uuid = Uuid::from_u128(0x4d2b_9a1e_5c3f_4e8a_9b0d_1f2e_3a4b_5c6d);
/// Built-in anonymous account
pub const GUEST_USER_ID: Uuid = Uuid::from_u128(0x7e1f_2a3b_4c5d_4e6f_8a9b_0c1d_2e3f_4a5b);
/// Group whose members may import principals
pub const ADMIN_GROUP_ID: Uuid = Uuid::from_u128(0x1a2b_3c4d_5e6f_4a7b_8c9d_0e1f_2a3b_4c5d);
pub const USERS_GROUP_ID: Uuid = Uuid::from_u128(0x2b3c_4d5e_6f7a_4b8c_9d0e_1f2a_3b4c_5d6e);
/// Root folder identities
pub const ROOT_STRUCTURE_ID: Uuid = Uuid::from_u128(0x3c4d_5e6f_7a8b_4c9d_8e1f_2a3b_4c5d_6e7f);
pub const ROOT_RESOURCE_ID: Uuid = Uuid::from_u128(0x5e6f_7a8b_9c0d_4e1f_8a3b_4c5d_6e7f_8a9b);

pub const ADMIN_USER_NAME: &str = "Admin";
pub const GUEST_USER_NAME: &str = "Guest";
pub const ADMIN_GROUP_NAME: &str = "Administrators";
pub const USERS_GROUP_NAME: &str = "Users";

/// Initial schema - Version 1
///
/// Creates the repository tables:
/// - resources: one row per path (structure), siblings share a resource id
/// - contents: file content keyed by resource id
/// - property_definitions / properties: typed key registry and values
/// - access_control_entries: per-resource permissions
/// - groups / users / group_members: principals
/// - repository_meta: cache generation and other counters
pub fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE resources (
            structure_id TEXT PRIMARY KEY,
            resource_id TEXT NOT NULL,
            content_id TEXT NOT NULL,
            path TEXT NOT NULL UNIQUE,
            parent_path TEXT NOT NULL,
            type_name TEXT NOT NULL,
            flags INTEGER NOT NULL DEFAULT 0,
            state TEXT NOT NULL CHECK(state IN ('unchanged', 'changed', 'new', 'deleted')),
            date_created INTEGER NOT NULL,
            user_created TEXT NOT NULL,
            date_last_modified INTEGER NOT NULL,
            user_last_modified TEXT NOT NULL,
            date_released INTEGER NOT NULL,
            date_expired INTEGER NOT NULL,
            size INTEGER NOT NULL DEFAULT 0,
            locked_by TEXT
        );

        CREATE INDEX idx_resources_parent ON resources(parent_path);
        CREATE INDEX idx_resources_resource_id ON resources(resource_id);

        CREATE TABLE contents (
            resource_id TEXT PRIMARY KEY,
            content_id TEXT NOT NULL,
            data BLOB NOT NULL
        );

        CREATE TABLE property_definitions (
            name TEXT PRIMARY KEY,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        -- Structure values belong to one path, resource values to all siblings
        CREATE TABLE properties (
            name TEXT NOT NULL,
            scope TEXT NOT NULL CHECK(scope IN ('structure', 'resource')),
            owner_id TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (name, scope, owner_id),
            FOREIGN KEY (name) REFERENCES property_definitions(name)
        );

        CREATE INDEX idx_properties_owner ON properties(owner_id);

        CREATE TABLE access_control_entries (
            resource_id TEXT NOT NULL,
            principal_id TEXT NOT NULL,
            allowed INTEGER NOT NULL DEFAULT 0,
            denied INTEGER NOT NULL DEFAULT 0,
            flags INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY (resource_id, principal_id)
        );

        CREATE TABLE groups (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL DEFAULT '',
            flags INTEGER NOT NULL DEFAULT 0,
            parent_id TEXT,
            FOREIGN KEY (parent_id) REFERENCES groups(id)
        );

        CREATE TABLE users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            password TEXT NOT NULL DEFAULT '',
            recovery_password TEXT NOT NULL DEFAULT '',
            description TEXT NOT NULL DEFAULT '',
            flags INTEGER NOT NULL DEFAULT 0,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            section TEXT NOT NULL DEFAULT '',
            default_group TEXT,
            user_type INTEGER NOT NULL DEFAULT 0,
            info TEXT NOT NULL DEFAULT '{}'
        );

        CREATE TABLE group_members (
            user_id TEXT NOT NULL,
            group_id TEXT NOT NULL,
            PRIMARY KEY (user_id, group_id),
            FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE,
            FOREIGN KEY (group_id) REFERENCES groups(id) ON DELETE CASCADE
        );

        CREATE TABLE repository_meta (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );

        INSERT INTO repository_meta (key, value) VALUES ('cache_generation', '0');
        ",
    )?;

    seed_v1(conn)?;

    debug!("Schema version 1 created successfully");
    Ok(())
}

/// Built-in principals and the root folder
fn seed_v1(conn: &Connection) -> Result<()> {
    conn.execute(
        "INSERT INTO groups (id, name, description, flags, parent_id) VALUES (?1, ?2, ?3, 0, NULL)",
        params![ADMIN_GROUP_ID.to_string(), ADMIN_GROUP_NAME, "Repository administrators"],
    )?;
    conn.execute(
        "INSERT INTO groups (id, name, description, flags, parent_id) VALUES (?1, ?2, ?3, 0, NULL)",
        params![USERS_GROUP_ID.to_string(), USERS_GROUP_NAME, "All registered users"],
    )?;

    for (id, name) in [(ADMIN_USER_ID, ADMIN_USER_NAME), (GUEST_USER_ID, GUEST_USER_NAME)] {
        conn.execute(
            "INSERT INTO users (id, name, default_group) VALUES (?1, ?2, ?3)",
            params![id.to_string(), name, USERS_GROUP_NAME],
        )?;
        conn.execute(
            "INSERT INTO group_members (user_id, group_id) VALUES (?1, ?2)",
            params![id.to_string(), USERS_GROUP_ID.to_string()],
        )?;
    }
    conn.execute(
        "INSERT INTO group_members (user_id, group_id) VALUES (?1, ?2)",
        params![ADMIN_USER_ID.to_string(), ADMIN_GROUP_ID.to_string()],
    )?;

    conn.execute(
        "INSERT INTO resources (structure_id, resource_id, content_id, path, parent_path,
                                type_name, flags, state, date_created, user_created,
                                date_last_modified, user_last_modified, date_released,
                                date_expired, size)
         VALUES (?1, ?2, ?2, '/', '', 'folder', 0, 'unchanged', 0, ?3, 0, ?3, 0, ?4, 0)",
        params![
            ROOT_STRUCTURE_ID.to_string(),
            ROOT_RESOURCE_ID.to_string(),
            ADMIN_USER_ID.to_string(),
            i64::MAX,
        ],
    )?;

    Ok(())
}
