//! On-disk layout of generated module files.
//!
//! ```text
//! # Generated by modforge from app.py (category: config).
//! # Marker lines map declarations back to their original position.
//! # @modforge:decl 0000-import
//! import os
//! # @modforge:decl 0001-constant-DEBUG
//! DEBUG = False
//! ```
//!
//! A declaration line that itself starts with `# @modforge:` is written with
//! an extra `# @modforge:esc ` prefix, which the reader strips again.

use std::borrow::Cow;

/// First line prefix of every generated file
pub const HEADER_TAG: &str = "# Generated by modforge";
const HEADER_NOTE: &str = "# Marker lines map declarations back to their original position.";
/// Prefix of a declaration marker line
pub const MARKER_PREFIX: &str = "# @modforge:decl ";
pub const INIT_FILE: &str = "__init__.py";
const RESERVED_PREFIX: &str = "# @modforge:";
const ESCAPE_PREFIX: &str = "# @modforge:esc ";

/// Two-line header of a module file
pub fn header(source_name: &str, category: &str) -> String {
    format!("{HEADER_TAG} from {source_name} (category: {category}).\n{HEADER_NOTE}\n")
}

pub fn marker(id: &str) -> String {
    format!("{MARKER_PREFIX}{id}\n")
}

/// Declaration id carried by a marker line
pub fn parse_marker(line: &str) -> Option<&str> {
    let id = line.strip_prefix(MARKER_PREFIX)?.trim_end();
    (!id.is_empty() && !id.contains(char::is_whitespace)).then_some(id)
}

/// Escape every line of a declaration that could be taken for a marker
pub fn escape_reserved(text: &str) -> Cow<'_, str> {
    if !text
        .split_inclusive('\n')
        .any(|line| line.starts_with(RESERVED_PREFIX))
    {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + ESCAPE_PREFIX.len());
    for line in text.split_inclusive('\n') {
        if line.starts_with(RESERVED_PREFIX) {
            out.push_str(ESCAPE_PREFIX);
        }
        out.push_str(line);
    }
    Cow::Owned(out)
}

/// Inverse of [`escape_reserved`] for one line
pub fn unescape_line(line: &str) -> &str {
    line.strip_prefix(ESCAPE_PREFIX).unwrap_or(line)
}

/// True for files this tool wrote
pub fn is_generated(contents: &str) -> bool {
    contents.starts_with(HEADER_TAG)
}

/// Length of the generated header at the start of `contents`, if any
pub fn header_len(contents: &str) -> usize {
    if !is_generated(contents) {
        return 0;
    }
    let mut len = 0;
    for (index, line) in contents.split_inclusive('\n').enumerate() {
        let is_header_line =
            index == 0 || (index == 1 && line.trim_end() == HEADER_NOTE);
        if !is_header_line {
            break;
        }
        len += line.len();
    }
    len
}

/// Deterministic package index listing the generated modules
pub fn init_contents(source_name: &str, module_names: &[String]) -> String {
    let mut out = header(source_name, "package index");
    out.push_str(&format!("\"\"\"Modules split from {source_name}.\"\"\"\n\n"));
    out.push_str("__all__ = [\n");
    for name in module_names {
        out.push_str(&format!("    \"{name}\",\n"));
    }
    out.push_str("]\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_round_trip() {
        let line = marker("0003-class-Widget");
        assert_eq!(parse_marker(&line), Some("0003-class-Widget"));
        assert_eq!(parse_marker("# @modforge:decl \n"), None);
        assert_eq!(parse_marker("    # @modforge:decl 0001-import\n"), None);
        assert_eq!(parse_marker("# plain comment\n"), None);
    }

    #[test]
    fn test_reserved_lines_are_escaped() {
        let text = "S = \"\"\"\n# @modforge:decl 0000-import\n# @modforge:esc kept\n# plain\n\"\"\"\n";
        let escaped = escape_reserved(text);
        assert_eq!(
            escaped,
            "S = \"\"\"\n\
             # @modforge:esc # @modforge:decl 0000-import\n\
             # @modforge:esc # @modforge:esc kept\n\
             # plain\n\"\"\"\n"
        );
        assert!(escaped.split_inclusive('\n').all(|l| parse_marker(l).is_none()));

        let restored: String = escaped.split_inclusive('\n').map(unescape_line).collect();
        assert_eq!(restored, text);
        assert!(matches!(escape_reserved("x = 1\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn test_header_detection() {
        let text = format!("{}{}x = 1\n", header("app.py", "config"), marker("0000-constant-x"));
        assert!(is_generated(&text));
        assert_eq!(&text[header_len(&text)..], "# @modforge:decl 0000-constant-x\nx = 1\n");
        assert_eq!(header_len("import os\n"), 0);
    }

    #[test]
    fn test_init_is_deterministic() {
        let names = vec!["config".to_string(), "core".to_string()];
        let init = init_contents("app.py", &names);
        assert_eq!(init, init_contents("app.py", &names));
        assert!(init.contains("    \"core\",\n"));
        assert!(is_generated(&init));
    }
}
