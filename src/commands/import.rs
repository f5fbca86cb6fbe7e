// src/commands/import.rs
//! Archive import commands

use super::progress::ImportProgress;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use vfsimport::{DbRepository, ImportConfig, ImportOptions, Importer};

fn load_config(config: Option<&str>) -> Result<ImportConfig> {
    match config {
        Some(path) => ImportConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load configuration {path}")),
        None => Ok(ImportConfig::default()),
    }
}

/// Split a `key=value` stamp property
fn parse_property(value: &str) -> Result<(String, String)> {
    let (key, value) = value
        .split_once('=')
        .ok_or_else(|| anyhow::anyhow!("Property must be key=value, got: {value}"))?;
    let key = key.trim();
    if key.is_empty() {
        anyhow::bail!("Property key must not be empty");
    }
    Ok((key.to_string(), value.trim().to_string()))
}

pub fn cmd_init(db_path: &str) -> Result<()> {
    info!("Initializing repository database at: {}", db_path);
    vfsimport::db::init(db_path)?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn cmd_import(
    archive: &str,
    db_path: &str,
    dest: &str,
    user: Option<&str>,
    config: Option<&str>,
    exclude: Vec<String>,
    property: Option<&str>,
    verbose: bool,
) -> Result<()> {
    let importer = Importer::new(load_config(config)?)?;
    let mut repo = DbRepository::open(db_path)
        .with_context(|| format!("Failed to open database {db_path}"))?;
    if let Some(user) = user {
        repo.login(user)?;
    }

    let options = ImportOptions {
        exclude,
        property: property.map(parse_property).transpose()?,
    };

    let progress = ImportProgress::new(archive, verbose);
    let outcome = match importer.import_archive(&repo, Path::new(archive), dest, &progress, &options)
    {
        Ok(outcome) => outcome,
        Err(e) => {
            progress.finish_with_error("Import failed");
            return Err(e).with_context(|| format!("Failed to import {archive}"));
        }
    };
    progress.finish("Import finished");

    let summary = outcome.summary;
    println!(
        "Imported version {} archive into {}: {} written, {} pages converted",
        outcome.version,
        dest,
        outcome.written.len(),
        outcome.imported_pages.len()
    );
    println!(
        "  {} ok, {} skipped, {} warnings, {} errors",
        summary.ok, summary.skipped, summary.warnings, summary.errors
    );
    if summary.has_problems() {
        println!("Import completed with problems; see the messages above.");
    }
    Ok(())
}

pub fn cmd_conflicts(archive: &str, db_path: &str, dest: &str, config: Option<&str>) -> Result<()> {
    let importer = Importer::new(load_config(config)?)?;
    let repo = DbRepository::open(db_path)?;
    let conflicts = importer.conflicting_files(&repo, Path::new(archive), dest)?;

    if conflicts.is_empty() {
        println!("No conflicting files.");
        return Ok(());
    }
    println!("{} file(s) already exist:", conflicts.len());
    for path in conflicts {
        println!("  {path}");
    }
    Ok(())
}

pub fn cmd_resources(archive: &str, db_path: &str, dest: &str, config: Option<&str>) -> Result<()> {
    let importer = Importer::new(load_config(config)?)?;
    let repo = DbRepository::open(db_path)?;
    for folder in importer.project_resources(&repo, Path::new(archive), dest)? {
        println!("{folder}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_property() {
        assert_eq!(
            parse_property("origin = legacy").unwrap(),
            ("origin".to_string(), "legacy".to_string())
        );
        assert_eq!(
            parse_property("note=a=b").unwrap(),
            ("note".to_string(), "a=b".to_string())
        );
        assert!(parse_property("novalue").is_err());
        assert!(parse_property("=x").is_err());
    }
}
