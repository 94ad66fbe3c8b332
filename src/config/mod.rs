//! Configuration module for domain backups
//!
//! This module provides:
//! - Well-known domain directory layout
//! - Settings file resolution and persistence

pub mod paths;
pub mod settings;

pub use paths::DomainLayout;
pub use settings::Settings;
