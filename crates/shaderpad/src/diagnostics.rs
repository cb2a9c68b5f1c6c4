//! Terminal reporting of compile diagnostics.
//!
//! The core hands back 0-indexed lines into the user-visible concatenation
//! (header then body); this module splits that back into per-region local
//! lines for display.

use canvas::DiagnosticSet;

/// Human-facing location for a user-visible diagnostic line.
pub fn format_location(line: usize, header_lines: usize) -> String {
    if line >= header_lines {
        format!("body:{}", line - header_lines)
    } else {
        format!("header:{line}")
    }
}

/// Logs every diagnostic from the most recent compile.
pub fn report(diagnostics: &DiagnosticSet, header_lines: usize) {
    if diagnostics.is_empty() {
        tracing::info!("shader compiled cleanly");
        return;
    }
    for (line, messages) in diagnostics.iter() {
        let location = format_location(line, header_lines);
        for message in messages {
            tracing::error!(%location, "{message}");
        }
    }
    tracing::warn!(
        count = diagnostics.len(),
        "shader recompile failed; still rendering the previous program"
    );
}
