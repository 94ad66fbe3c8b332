//! Display formatting for terminal output
//!
//! Formats backup listings and operation reports as plain text.

pub mod backup;
pub mod report;

pub use backup::format_backup_list;
pub use report::format_warnings;
