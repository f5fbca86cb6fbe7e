// src/db/models/principal.rs

//! Group and user rows

use super::{optional_uuid_column, uuid_column};
use crate::error::Result;
use crate::target::{Group, NewUser, User, UserInfo};
use rusqlite::{Connection, OptionalExtension, Row, params};
use uuid::Uuid;

const GROUP_COLUMNS: &str = "id, name, description, flags, parent_id";
const USER_COLUMNS: &str = "id, name, description, flags, first_name, last_name, email,
     address, section, default_group, user_type, info";

fn group_from_row(row: &Row) -> rusqlite::Result<Group> {
    Ok(Group {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        flags: row.get(3)?,
        parent_id: optional_uuid_column(row, 4)?,
    })
}

fn user_from_row(row: &Row) -> rusqlite::Result<User> {
    let info: String = row.get(11)?;
    // unreadable info degrades to empty rather than hiding the user
    let info: UserInfo = serde_json::from_str(&info).unwrap_or_default();
    Ok(User {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        flags: row.get(3)?,
        first_name: row.get(4)?,
        last_name: row.get(5)?,
        email: row.get(6)?,
        address: row.get(7)?,
        section: row.get(8)?,
        default_group: row.get(9)?,
        user_type: row.get(10)?,
        info,
    })
}

pub fn find_group_by_name(conn: &Connection, name: &str) -> Result<Option<Group>> {
    let sql = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE name = ?1");
    Ok(conn.query_row(&sql, [name], group_from_row).optional()?)
}

pub fn find_group_by_id(conn: &Connection, id: Uuid) -> Result<Option<Group>> {
    let sql = format!("SELECT {GROUP_COLUMNS} FROM groups WHERE id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], group_from_row)
        .optional()?)
}

pub fn insert_group(conn: &Connection, group: &Group) -> Result<()> {
    conn.execute(
        "INSERT INTO groups (id, name, description, flags, parent_id) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            group.id.to_string(),
            &group.name,
            &group.description,
            group.flags,
            group.parent_id.map(|id| id.to_string()),
        ],
    )?;
    Ok(())
}

pub fn find_user_by_name(conn: &Connection, name: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1");
    Ok(conn.query_row(&sql, [name], user_from_row).optional()?)
}

pub fn find_user_by_id(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    Ok(conn
        .query_row(&sql, [id.to_string()], user_from_row)
        .optional()?)
}

pub fn insert_user(conn: &Connection, id: Uuid, user: &NewUser) -> Result<()> {
    let info = serde_json::to_string(&user.info)?;
    conn.execute(
        "INSERT INTO users (id, name, password, recovery_password, description, flags,
                            first_name, last_name, email, address, section, default_group,
                            user_type, info)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            id.to_string(),
            &user.name,
            &user.password,
            &user.recovery_password,
            &user.description,
            user.flags,
            &user.first_name,
            &user.last_name,
            &user.email,
            &user.address,
            &user.section,
            &user.default_group,
            user.user_type,
            info,
        ],
    )?;
    Ok(())
}

/// Stored password material for `name`
pub fn find_password(conn: &Connection, name: &str) -> Result<Option<String>> {
    Ok(conn
        .query_row(
            "SELECT password FROM users WHERE name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?)
}

pub fn add_member(conn: &Connection, user_id: Uuid, group_id: Uuid) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO group_members (user_id, group_id) VALUES (?1, ?2)",
        params![user_id.to_string(), group_id.to_string()],
    )?;
    Ok(())
}

pub fn groups_of_user(conn: &Connection, user_id: Uuid) -> Result<Vec<Group>> {
    let mut stmt = conn.prepare(
        "SELECT g.id, g.name, g.description, g.flags, g.parent_id
         FROM groups g JOIN group_members m ON m.group_id = g.id
         WHERE m.user_id = ?1 ORDER BY g.name",
    )?;
    let rows = stmt
        .query_map([user_id.to_string()], group_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// Whether a group or user with this id exists
pub fn principal_exists(conn: &Connection, id: Uuid) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM groups WHERE id = ?1 UNION SELECT 1 FROM users WHERE id = ?1",
            [id.to_string()],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}
