// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: database path
fn db_path_arg() -> Arg {
    Arg::new("db_path")
        .short('d')
        .long("db-path")
        .value_name("PATH")
        .default_value("/var/lib/vfsimport/vfs.db")
        .help("Path to the database file")
}

/// Common argument: archive locator
fn archive_arg() -> Arg {
    Arg::new("archive")
        .required(true)
        .help("Archive directory, zip file or tarball")
}

fn dest_arg() -> Arg {
    Arg::new("dest")
        .long("dest")
        .default_value("/")
        .help("Folder the archive is imported into")
}

fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .help("Import configuration (TOML)")
}

fn build_cli() -> Command {
    Command::new("vfsimport")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Import content export archives into a virtual file system")
        .subcommand_required(false)
        .subcommand(
            Command::new("init")
                .about("Initialize the repository database")
                .arg(db_path_arg()),
        )
        .subcommand(
            Command::new("import")
                .about("Import an export archive")
                .arg(archive_arg())
                .arg(db_path_arg())
                .arg(dest_arg())
                .arg(
                    Arg::new("user")
                        .short('u')
                        .long("user")
                        .help("User the import runs as"),
                )
                .arg(config_arg())
                .arg(
                    Arg::new("exclude")
                        .long("exclude")
                        .action(ArgAction::Append)
                        .help("Target path to leave untouched (repeatable)"),
                )
                .arg(
                    Arg::new("property")
                        .long("property")
                        .help("Property stamped on every imported resource, as key=value"),
                )
                .arg(
                    Arg::new("verbose")
                        .short('v')
                        .long("verbose")
                        .action(ArgAction::SetTrue)
                        .help("Show report lines instead of a progress bar"),
                ),
        )
        .subcommand(
            Command::new("conflicts")
                .about("List archive files that already exist in the repository")
                .arg(archive_arg())
                .arg(db_path_arg())
                .arg(dest_arg())
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("resources")
                .about("List the top-level folders an import would touch")
                .arg(archive_arg())
                .arg(db_path_arg())
                .arg(dest_arg())
                .arg(config_arg()),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();
    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("vfsimport.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
