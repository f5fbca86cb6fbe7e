// src/db/mod.rs

//! SQLite-backed content repository
//!
//! The database is the bundled [`TargetRepository`](crate::target::TargetRepository)
//! implementation used by the CLI and the integration tests.

pub mod migrations;
pub mod models;
mod repository;
pub mod schema;

pub use repository::DbRepository;

use crate::error::Result;
use rusqlite::{Connection, Transaction};
use std::path::Path;
use tracing::info;

/// Create (or upgrade) the database at `db_path`
pub fn init(db_path: &str) -> Result<()> {
    if let Some(parent) = Path::new(db_path).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open(db_path)?;
    schema::migrate(&conn)?;
    info!("Database initialized at {}", db_path);
    Ok(())
}

/// Open a connection with the pragmas the repository relies on
pub fn open(db_path: &str) -> Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(std::time::Duration::from_secs(5))?;
    Ok(())
}

/// Run `f` inside a transaction, committing on success
pub fn transaction<T, F>(conn: &mut Connection, f: F) -> Result<T>
where
    F: FnOnce(&Transaction) -> Result<T>,
{
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/repo.db");
        let path = path.to_str().unwrap();

        init(path).unwrap();
        let conn = open(path).unwrap();
        assert_eq!(
            schema::get_schema_version(&conn).unwrap(),
            schema::SCHEMA_VERSION
        );
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let mut conn = open_in_memory().unwrap();
        schema::migrate(&conn).unwrap();

        let result: Result<()> = transaction(&mut conn, |tx| {
            models::property::insert_definition(tx, "Title")?;
            Err(crate::error::Error::Internal("abort".to_string()))
        });
        assert!(result.is_err());
        assert!(!models::property::definition_exists(&conn, "Title").unwrap());
    }
}
