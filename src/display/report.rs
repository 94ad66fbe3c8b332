//! Report display formatting

use crate::outcome::Report;

/// One line per warning, prefixed for stderr output
pub fn format_warnings(report: &Report) -> Vec<String> {
    report
        .warnings
        .iter()
        .map(|w| format!("warning: {}", w))
        .collect()
}
