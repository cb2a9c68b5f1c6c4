/// Whether a segment's lines belong to the user or to machine-injected code.
///
/// Diagnostics landing in [`SegmentKind::Injected`] segments are never shown
/// against user-visible line numbers; the controller routes them to the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    User,
    Injected,
}

/// A named chunk of shader source. An ordered sequence of segments is
/// concatenated with single newlines to form the source submitted to the
/// backend.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceSegment {
    pub name: String,
    pub kind: SegmentKind,
    pub text: String,
}

impl SourceSegment {
    pub fn user(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SegmentKind::User,
            text: text.into(),
        }
    }

    pub fn injected(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: SegmentKind::Injected,
            text: text.into(),
        }
    }

    /// Number of lines this segment contributes to the concatenation.
    pub fn line_count(&self) -> usize {
        1 + self.text.matches('\n').count()
    }
}

/// Joins segment texts with single newline separators, the exact form the
/// line bookkeeping in [`crate::diagnostics`] assumes.
pub fn assemble(segments: &[SourceSegment]) -> String {
    let mut out = String::new();
    for (index, segment) in segments.iter().enumerate() {
        if index > 0 {
            out.push('\n');
        }
        out.push_str(&segment.text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segment_counts_one_line() {
        assert_eq!(SourceSegment::user("a", "").line_count(), 1);
    }

    #[test]
    fn line_count_matches_newlines() {
        assert_eq!(SourceSegment::user("a", "x\ny\nz").line_count(), 3);
        assert_eq!(SourceSegment::user("a", "x\n").line_count(), 2);
    }

    #[test]
    fn assemble_joins_with_single_newlines() {
        let segments = [
            SourceSegment::user("header", "uniform float t;"),
            SourceSegment::injected("builtins", "float sqr(float v) { return v * v; }"),
            SourceSegment::user("body", "void main() {}"),
        ];
        let joined = assemble(&segments);
        assert_eq!(joined.lines().count(), 3);
        let total: usize = segments.iter().map(SourceSegment::line_count).sum();
        assert_eq!(total, 3);
    }
}
