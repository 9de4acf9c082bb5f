use std::fmt;
use std::ops::Range;

/// Line context for the token the parser stopped on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
    pub line_text: String,
}

impl SourceLocation {
    /// Locate the start of `span` inside `source`. Returns `None` for empty sources.
    pub fn from_span(source: &str, span: Range<usize>) -> Option<Self> {
        if source.is_empty() {
            return None;
        }

        let offset = span.start.min(source.len());
        let before = &source[..offset];
        let line_start = before.rfind('\n').map(|pos| pos + 1).unwrap_or(0);
        let line_end = source[line_start..]
            .find('\n')
            .map(|pos| line_start + pos)
            .unwrap_or(source.len());

        Some(SourceLocation {
            line: before.matches('\n').count() + 1,
            column: source[line_start..offset].chars().count() + 1,
            line_text: source[line_start..line_end].trim_end_matches('\r').to_owned(),
        })
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pad: String = self
            .line_text
            .chars()
            .take(self.column - 1)
            .map(|ch| if ch == '\t' { '\t' } else { ' ' })
            .collect();
        write!(
            f,
            "line {} column {}\n{}\n{pad}^",
            self.line, self.column, self.line_text
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locates_second_line() {
        let source = "#usda 1.0\ndef Xform \"A\" {\n";
        let location = SourceLocation::from_span(source, 14..19).unwrap();
        assert_eq!(location.line, 2);
        assert_eq!(location.column, 5);
        assert_eq!(location.line_text, "def Xform \"A\" {");
        assert!(location.to_string().ends_with("    ^"));
    }

    #[test]
    fn empty_source_has_no_location() {
        assert!(SourceLocation::from_span("", 0..0).is_none());
    }
}
