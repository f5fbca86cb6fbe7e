// src/db/models/mod.rs

//! Row mapping for the repository tables

pub mod principal;
pub mod property;
pub mod resource;

use rusqlite::Row;
use uuid::Uuid;

/// Conversion failure for column `idx`
pub(crate) fn conversion_error(idx: usize, message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            message.into(),
        )),
    )
}

/// Read a UUID stored as text
pub(crate) fn uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text).map_err(|e| conversion_error(idx, e.to_string()))
}

pub(crate) fn optional_uuid_column(row: &Row, idx: usize) -> rusqlite::Result<Option<Uuid>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| Uuid::parse_str(&t).map_err(|e| conversion_error(idx, e.to_string())))
        .transpose()
}
