//! Stack trace parsing.
//!
//! Shared between the error fingerprinter (which folds normalized frames
//! into the dedup digest) and the wire payload builder (which reports the
//! top frame's file and line).

use once_cell::sync::Lazy;
use regex::Regex;

/// Source-file extensions that mark a frame as application code.
const SOURCE_EXTENSIONS: &[&str] = &[
    ".rs", ".js", ".mjs", ".ts", ".tsx", ".jsx", ".py", ".go", ".java", ".kt", ".swift",
];

/// Substrings that mark a frame as generated or vendored code.
const VENDOR_MARKERS: &[&str] = &["node_modules", "/vendor/", "webpack", ".min.js", "<anonymous>"];

static LOCATION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([^\s():]+?):(\d+)(?::(\d+))?").expect("location regex is valid"));

/// A single parsed stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    /// Raw frame text.
    pub raw: String,
    /// Source file path, when the frame carries a location.
    pub file: Option<String>,
    /// Line number, when present.
    pub line: Option<u32>,
    /// Column number, when present.
    pub column: Option<u32>,
}

impl StackFrame {
    /// True when the frame points into application source rather than
    /// generated or vendored code.
    pub fn is_meaningful(&self) -> bool {
        if VENDOR_MARKERS.iter().any(|m| self.raw.contains(m)) {
            return false;
        }
        SOURCE_EXTENSIONS.iter().any(|ext| self.raw.contains(ext))
    }

    /// The frame text with line/column numbers replaced by a placeholder,
    /// so identical call sites across builds compare equal.
    pub fn normalized(&self) -> String {
        LOCATION_RE.replace_all(&self.raw, "$1:_").into_owned()
    }
}

/// Parses raw stack trace text into frames, one per non-empty line.
pub fn parse_frames(stack: &str) -> Vec<StackFrame> {
    stack
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let captures = LOCATION_RE.captures(line);
            let (file, line_no, column) = match &captures {
                Some(caps) => (
                    caps.get(1).map(|m| m.as_str().to_string()),
                    caps.get(2).and_then(|m| m.as_str().parse().ok()),
                    caps.get(3).and_then(|m| m.as_str().parse().ok()),
                ),
                None => (None, None, None),
            };
            StackFrame {
                raw: line.to_string(),
                file,
                line: line_no,
                column,
            }
        })
        .collect()
}

/// Returns the first meaningful frame of a stack trace, if any.
pub fn top_meaningful_frame(stack: &str) -> Option<StackFrame> {
    parse_frames(stack).into_iter().find(StackFrame::is_meaningful)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STACK: &str = "\
        at render (src/app/view.js:42:17)\n\
        at apply (node_modules/react-dom/index.js:1021:5)\n\
        at dispatch (src/app/store.ts:9:3)";

    #[test]
    fn test_parse_frames_extracts_locations() {
        let frames = parse_frames(STACK);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].file.as_deref(), Some("src/app/view.js"));
        assert_eq!(frames[0].line, Some(42));
        assert_eq!(frames[0].column, Some(17));
    }

    #[test]
    fn test_vendor_frames_are_not_meaningful() {
        let frames = parse_frames(STACK);
        assert!(frames[0].is_meaningful());
        assert!(!frames[1].is_meaningful());
        assert!(frames[2].is_meaningful());
    }

    #[test]
    fn test_normalized_strips_line_and_column() {
        let frames = parse_frames("at render (src/app/view.js:42:17)");
        assert_eq!(frames[0].normalized(), "at render (src/app/view.js:_)");

        // The same call site at a different line normalizes identically
        let moved = parse_frames("at render (src/app/view.js:99:2)");
        assert_eq!(frames[0].normalized(), moved[0].normalized());
    }

    #[test]
    fn test_top_meaningful_frame_skips_vendor_code() {
        let stack = "\
            at wrap (node_modules/lib/index.js:5:1)\n\
            at handler (src/routes/orders.rs:88)";
        let frame = top_meaningful_frame(stack).unwrap();
        assert_eq!(frame.file.as_deref(), Some("src/routes/orders.rs"));
        assert_eq!(frame.line, Some(88));
        assert_eq!(frame.column, None);
    }

    #[test]
    fn test_parse_frames_handles_frames_without_location() {
        let frames = parse_frames("at <anonymous>");
        assert_eq!(frames.len(), 1);
        assert!(frames[0].file.is_none());
        assert!(!frames[0].is_meaningful());
    }
}
