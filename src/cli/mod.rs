// src/cli/mod.rs
//! CLI definitions for vfsimport
//!
//! Argument parsing only; the command implementations live in the
//! `commands` module.

use clap::{Parser, Subcommand};

/// Default repository database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/vfsimport/vfs.db";

#[derive(Parser)]
#[command(name = "vfsimport")]
#[command(version)]
#[command(about = "Import content export archives into a virtual file system", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the repository database
    Init {
        /// Path to the database file
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,
    },

    /// Import an export archive
    Import {
        /// Archive directory, zip file or tarball
        archive: String,

        /// Path to the database file
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,

        /// Folder the archive is imported into
        #[arg(long, default_value = "/")]
        dest: String,

        /// User the import runs as
        #[arg(short, long)]
        user: Option<String>,

        /// Import configuration (TOML)
        #[arg(short, long)]
        config: Option<String>,

        /// Target path to leave untouched (repeatable)
        #[arg(long)]
        exclude: Vec<String>,

        /// Property stamped on every imported resource, as key=value
        #[arg(long)]
        property: Option<String>,

        /// Show report lines instead of a progress bar
        #[arg(short, long)]
        verbose: bool,
    },

    /// List archive files that already exist in the repository
    Conflicts {
        /// Archive directory, zip file or tarball
        archive: String,

        /// Path to the database file
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,

        /// Folder the archive would be imported into
        #[arg(long, default_value = "/")]
        dest: String,

        /// Import configuration (TOML)
        #[arg(short, long)]
        config: Option<String>,
    },

    /// List the top-level folders an import would touch
    Resources {
        /// Archive directory, zip file or tarball
        archive: String,

        /// Path to the database file
        #[arg(short, long, default_value = DEFAULT_DB_PATH)]
        db_path: String,

        /// Folder the archive would be imported into
        #[arg(long, default_value = "/")]
        dest: String,

        /// Import configuration (TOML)
        #[arg(short, long)]
        config: Option<String>,
    },
}
