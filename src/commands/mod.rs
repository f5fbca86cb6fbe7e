// src/commands/mod.rs
//! Command handlers for the vfsimport CLI

mod import;
pub mod progress;

pub use import::{cmd_conflicts, cmd_import, cmd_init, cmd_resources};
