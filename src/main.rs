// src/main.rs

use anyhow::Result;
use clap::Parser;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Init { db_path }) => commands::cmd_init(&db_path),
        Some(Commands::Import {
            archive,
            db_path,
            dest,
            user,
            config,
            exclude,
            property,
            verbose,
        }) => commands::cmd_import(
            &archive,
            &db_path,
            &dest,
            user.as_deref(),
            config.as_deref(),
            exclude,
            property.as_deref(),
            verbose,
        ),
        Some(Commands::Conflicts {
            archive,
            db_path,
            dest,
            config,
        }) => commands::cmd_conflicts(&archive, &db_path, &dest, config.as_deref()),
        Some(Commands::Resources {
            archive,
            db_path,
            dest,
            config,
        }) => commands::cmd_resources(&archive, &db_path, &dest, config.as_deref()),
        None => {
            println!("vfsimport - content archive importer");
            println!("Run 'vfsimport --help' for usage information");
            Ok(())
        }
    }
}
