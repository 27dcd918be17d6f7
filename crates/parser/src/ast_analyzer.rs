use crate::error::{ParserError, Result};
use crate::types::DeclarationKind;
use std::ops::RangeInclusive;
use tree_sitter::{Node, Parser};

/// One top-level syntactic unit before comment attachment.
///
/// Statements sharing a physical line are folded into a single unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Unit {
    /// Start byte of the first node
    pub start: usize,
    /// End byte of the last line touched by the unit (newline included)
    pub end: usize,
    /// 0-based row of `start`
    pub start_row: usize,
    /// 0-based row of the last non-whitespace byte
    pub end_row: usize,
    pub role: UnitRole,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitRole {
    Comment,
    Statement {
        kind: DeclarationKind,
        name: Option<String>,
    },
}

/// Byte offset to row lookup
pub(crate) struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            source
                .bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self { starts }
    }

    /// 0-based row containing `byte`
    pub fn row_of(&self, byte: usize) -> usize {
        self.starts.partition_point(|start| *start <= byte).saturating_sub(1)
    }
}

/// Tree-sitter front end for Python sources
pub(crate) struct AstAnalyzer {
    parser: Parser,
}

impl AstAnalyzer {
    pub fn new() -> Result<Self> {
        let language: tree_sitter::Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser
            .set_language(&language)
            .map_err(|e| ParserError::tree_sitter(format!("Failed to set language: {e}")))?;
        Ok(Self { parser })
    }

    fn parse_tree(&mut self, source: &str) -> Result<tree_sitter::Tree> {
        let tree = self
            .parser
            .parse(source, None)
            .ok_or_else(|| ParserError::tree_sitter("Failed to parse source code"))?;

        let root = tree.root_node();
        if root.has_error() {
            let (line, column, message) = match first_error(root) {
                Some(node) => {
                    let pos = node.start_position();
                    let message = if node.is_missing() {
                        format!("missing `{}`", node.kind())
                    } else {
                        format!("unexpected `{}`", snippet(source, node))
                    };
                    (pos.row + 1, pos.column + 1, message)
                }
                None => (1, 1, "malformed source".to_string()),
            };
            return Err(ParserError::parse(line, column, message));
        }

        Ok(tree)
    }

    /// Split source into top-level units
    pub fn units(&mut self, source: &str) -> Result<Vec<Unit>> {
        let tree = self.parse_tree(source)?;
        let root = tree.root_node();
        let lines = LineIndex::new(source);

        let mut cursor = root.walk();
        let nodes: Vec<Node> = root.named_children(&mut cursor).collect();

        let mut units: Vec<Unit> = Vec::with_capacity(nodes.len());
        for node in nodes {
            let start = node.start_byte();
            let content_end = trimmed_end(source, start, node.end_byte());
            let end = line_end_after(source, content_end);
            let end_row = lines.row_of(content_end.saturating_sub(1).max(start));

            if let Some(last) = units.last_mut() {
                if start < last.end {
                    last.end = last.end.max(end);
                    last.end_row = last.end_row.max(end_row);
                    continue;
                }
            }

            let role = if node.kind() == "comment" {
                UnitRole::Comment
            } else {
                let (kind, name) = statement_kind(source, node);
                UnitRole::Statement { kind, name }
            };

            units.push(Unit {
                start,
                end,
                start_row: lines.row_of(start),
                end_row,
                role,
            });
        }

        Ok(units)
    }

    /// Rows (0-based, inclusive) that lie inside multi-line string literals,
    /// excluding the row that opens the string
    pub fn multiline_string_rows(&mut self, source: &str) -> Result<Vec<RangeInclusive<usize>>> {
        let tree = self.parse_tree(source)?;
        let mut cursor = tree.root_node().walk();
        let mut rows = Vec::new();

        'walk: loop {
            let node = cursor.node();
            let is_string = matches!(node.kind(), "string" | "concatenated_string");
            if is_string {
                let start_row = node.start_position().row;
                let end_row = node.end_position().row;
                if end_row > start_row {
                    rows.push(start_row + 1..=end_row);
                }
            } else if cursor.goto_first_child() {
                continue;
            }

            loop {
                if cursor.goto_next_sibling() {
                    continue 'walk;
                }
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }

        Ok(rows)
    }
}

fn first_error(node: Node) -> Option<Node> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

fn snippet(source: &str, node: Node) -> String {
    let text = &source[node.byte_range()];
    let first_line = text.lines().next().unwrap_or_default().trim();
    first_line.chars().take(40).collect()
}

/// Kind and name of a top-level statement node
fn statement_kind(source: &str, node: Node) -> (DeclarationKind, Option<String>) {
    match node.kind() {
        "import_statement" | "import_from_statement" | "future_import_statement" => {
            (DeclarationKind::Import, None)
        }
        "class_definition" => (DeclarationKind::Class, field_text(source, node, "name")),
        "function_definition" => (DeclarationKind::Function, field_text(source, node, "name")),
        "decorated_definition" => match node.child_by_field_name("definition") {
            Some(definition) => statement_kind(source, definition),
            None => (DeclarationKind::Other, None),
        },
        "expression_statement" => expression_kind(source, node),
        _ => (DeclarationKind::Other, None),
    }
}

fn expression_kind(source: &str, node: Node) -> (DeclarationKind, Option<String>) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.named_children(&mut cursor).collect();

    match children.as_slice() {
        [only] if matches!(only.kind(), "string" | "concatenated_string") => {
            (DeclarationKind::CommentBlock { docstring: true }, None)
        }
        [only] if only.kind() == "assignment" => match only.child_by_field_name("left") {
            Some(left) if left.kind() == "identifier" => (
                DeclarationKind::Constant,
                Some(source[left.byte_range()].to_string()),
            ),
            _ => (DeclarationKind::Other, None),
        },
        _ => (DeclarationKind::Other, None),
    }
}

fn field_text(source: &str, node: Node, field: &str) -> Option<String> {
    node.child_by_field_name(field)
        .map(|child| source[child.byte_range()].to_string())
}

/// End of the last non-whitespace byte in `start..end`
fn trimmed_end(source: &str, start: usize, end: usize) -> usize {
    let trimmed = source[start..end].trim_end();
    if trimmed.is_empty() {
        end
    } else {
        start + trimmed.len()
    }
}

/// First byte after the line containing `pos - 1`
pub(crate) fn line_end_after(source: &str, pos: usize) -> usize {
    if pos > 0 && source.as_bytes()[pos - 1] == b'\n' {
        return pos;
    }
    match source[pos..].find('\n') {
        Some(offset) => pos + offset + 1,
        None => source.len(),
    }
}

/// Start of the line holding `pos` when only whitespace precedes it there
pub(crate) fn line_start_before(source: &str, pos: usize) -> usize {
    let line_start = source[..pos].rfind('\n').map_or(0, |i| i + 1);
    if source[line_start..pos].trim().is_empty() {
        line_start
    } else {
        pos
    }
}
