//! CLI command handlers
//!
//! Bridges clap argument parsing with the backup managers and settings.

pub mod backup;
pub mod config;

pub use backup::{handle_backup_command, BackupCommands, DomainArgs};
pub use config::{handle_config_command, ConfigArgs};
