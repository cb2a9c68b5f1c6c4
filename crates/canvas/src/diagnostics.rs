//! Parsing and remapping of backend compile logs.
//!
//! Backends report diagnostics as `ERROR: <unit>:<line>: <message>` lines with
//! `<line>` 0-indexed against the exact source they were handed. The remapper
//! walks the segment table that produced that source and attributes each
//! diagnostic to the segment whose line range contains it. Log lines that do
//! not match the pattern (link failures, driver chatter) are preserved as
//! link-level records rather than dropped.

use std::collections::BTreeMap;

use crate::segment::{SegmentKind, SourceSegment};

/// Line used for diagnostics that carry no usable line number.
pub const LINK_LINE: usize = 0;

/// One line of a backend info log, split into location and message.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDiagnostic {
    /// 0-indexed line into the submitted source, when the line matched the
    /// located-error pattern.
    pub line: Option<usize>,
    pub message: String,
}

/// A raw diagnostic attributed to its owning segment.
#[derive(Debug, Clone, PartialEq)]
pub enum RemappedDiagnostic {
    Line {
        /// Index into the segment table passed to [`remap`].
        segment_index: usize,
        kind: SegmentKind,
        global_line: usize,
        local_line: usize,
        message: String,
    },
    /// No line attribution was possible: link failures, free-text log lines,
    /// and lines pointing outside the submitted source.
    Link { message: String },
}

/// Splits a backend log into per-line diagnostics, preserving report order.
pub fn parse_log(log: &str) -> Vec<RawDiagnostic> {
    log.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| match parse_located(line) {
            Some((line_no, message)) => RawDiagnostic {
                line: Some(line_no),
                message,
            },
            None => RawDiagnostic {
                line: None,
                message: line.to_string(),
            },
        })
        .collect()
}

fn parse_located(line: &str) -> Option<(usize, String)> {
    let rest = line.strip_prefix("ERROR:")?.trim_start();
    let mut parts = rest.splitn(3, ':');
    parts.next()?.trim().parse::<usize>().ok()?;
    let line_no = parts.next()?.trim().parse::<usize>().ok()?;
    let message = parts.next()?.trim().to_string();
    Some((line_no, message))
}

/// Attributes each raw diagnostic to the segment whose cumulative line range
/// `[offset, offset + line_count)` contains it.
pub fn remap(raw: Vec<RawDiagnostic>, segments: &[SourceSegment]) -> Vec<RemappedDiagnostic> {
    raw.into_iter()
        .map(|diagnostic| match diagnostic.line {
            Some(line) => place(line, diagnostic.message, segments),
            None => RemappedDiagnostic::Link {
                message: diagnostic.message,
            },
        })
        .collect()
}

fn place(line: usize, message: String, segments: &[SourceSegment]) -> RemappedDiagnostic {
    let mut offset = 0;
    for (segment_index, segment) in segments.iter().enumerate() {
        let count = segment.line_count();
        if line < offset + count {
            return RemappedDiagnostic::Line {
                segment_index,
                kind: segment.kind,
                global_line: line,
                local_line: line - offset,
                message,
            };
        }
        offset += count;
    }
    // The backend pointed past the end of what we submitted; keep the message
    // rather than inventing a location.
    RemappedDiagnostic::Link { message }
}

/// Diagnostics from the most recent compile, keyed by 0-indexed line in the
/// user-visible source. Multiple messages on one line keep report order.
/// Link-level entries land on [`LINK_LINE`].
#[derive(Debug, Clone, Default)]
pub struct DiagnosticSet {
    lines: BTreeMap<usize, Vec<String>>,
}

impl DiagnosticSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    pub fn push(&mut self, line: usize, message: impl Into<String>) {
        self.lines.entry(line).or_default().push(message.into());
    }

    pub fn push_link(&mut self, message: impl Into<String>) {
        self.push(LINK_LINE, message);
    }

    pub fn messages_for(&self, line: usize) -> &[String] {
        self.lines.get(&line).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Iterates lines in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &[String])> {
        self.lines
            .iter()
            .map(|(line, messages)| (*line, messages.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of messages across all lines.
    pub fn len(&self) -> usize {
        self.lines.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(name: &str, lines: usize) -> SourceSegment {
        SourceSegment::user(name, "x\n".repeat(lines.saturating_sub(1)) + "x")
    }

    #[test]
    fn parses_located_errors() {
        let raw = parse_log("ERROR: 0:12: 'x' : syntax error\nERROR: 0:12: second\n");
        assert_eq!(
            raw,
            vec![
                RawDiagnostic {
                    line: Some(12),
                    message: "'x' : syntax error".into()
                },
                RawDiagnostic {
                    line: Some(12),
                    message: "second".into()
                },
            ]
        );
    }

    #[test]
    fn free_text_lines_become_unlocated() {
        let raw = parse_log("internal error: link failed\n\nERROR: not:a:number here");
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].line, None);
        assert_eq!(raw[1].line, None);
    }

    #[test]
    fn remap_places_lines_by_cumulative_offset() {
        let segments = [segment("a", 3), segment("b", 5), segment("c", 4)];
        // Line 6 sits in segment b (offset 3, count 5), local line 3.
        let out = remap(
            vec![RawDiagnostic {
                line: Some(6),
                message: "boom".into(),
            }],
            &segments,
        );
        assert_eq!(
            out,
            vec![RemappedDiagnostic::Line {
                segment_index: 1,
                kind: SegmentKind::User,
                global_line: 6,
                local_line: 3,
                message: "boom".into(),
            }]
        );
    }

    #[test]
    fn remap_covers_segment_boundaries() {
        let segments = [segment("a", 2), segment("b", 2)];
        for (line, expected_segment, expected_local) in [(0, 0, 0), (1, 0, 1), (2, 1, 0), (3, 1, 1)]
        {
            let out = remap(
                vec![RawDiagnostic {
                    line: Some(line),
                    message: String::new(),
                }],
                &segments,
            );
            match &out[0] {
                RemappedDiagnostic::Line {
                    segment_index,
                    local_line,
                    global_line,
                    ..
                } => {
                    assert_eq!(*segment_index, expected_segment, "line {line}");
                    assert_eq!(*local_line, expected_local, "line {line}");
                    assert_eq!(*global_line, line);
                }
                other => panic!("expected line diagnostic, got {other:?}"),
            }
        }
    }

    #[test]
    fn out_of_range_lines_fall_back_to_link() {
        let segments = [segment("a", 2)];
        let out = remap(
            vec![RawDiagnostic {
                line: Some(99),
                message: "lost".into(),
            }],
            &segments,
        );
        assert_eq!(
            out,
            vec![RemappedDiagnostic::Link {
                message: "lost".into()
            }]
        );
    }

    #[test]
    fn diagnostic_set_accumulates_in_report_order() {
        let mut set = DiagnosticSet::new();
        set.push(4, "first");
        set.push(4, "second");
        set.push_link("link failed");
        assert_eq!(set.messages_for(4), ["first", "second"]);
        assert_eq!(set.messages_for(LINK_LINE), ["link failed"]);
        assert_eq!(set.len(), 3);
        set.clear();
        assert!(set.is_empty());
    }
}
