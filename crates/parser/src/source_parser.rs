use crate::ast_analyzer::{line_start_before, AstAnalyzer, LineIndex, Unit, UnitRole};
use crate::error::Result;
use crate::types::{Declaration, DeclarationKind, Span};
use std::ops::{Range, RangeInclusive};

/// Splits Python source into an ordered, gap-free sequence of declarations
pub struct SourceParser {
    analyzer: AstAnalyzer,
}

/// A declaration before spans are made contiguous
struct Group {
    code_start: usize,
    end: usize,
    comment: Option<Range<usize>>,
    kind: DeclarationKind,
    name: Option<String>,
}

impl SourceParser {
    /// Create a new parser
    pub fn new() -> Result<Self> {
        Ok(Self {
            analyzer: AstAnalyzer::new()?,
        })
    }

    /// Parse source text into declarations.
    ///
    /// Concatenating the `text` of the result in order reproduces `source`.
    pub fn parse(&mut self, source: &str) -> Result<Vec<Declaration>> {
        let units = self.analyzer.units(source)?;
        let groups = attach_comments(source, units);
        let declarations = build_declarations(source, groups);

        log::debug!("Parsed {} top-level declarations", declarations.len());
        Ok(declarations)
    }

    /// Rows (0-based, inclusive) inside multi-line string literals
    pub fn string_rows(&mut self, source: &str) -> Result<Vec<RangeInclusive<usize>>> {
        self.analyzer.multiline_string_rows(source)
    }
}

/// Attach comment runs that sit directly above a statement to that statement
fn attach_comments(source: &str, units: Vec<Unit>) -> Vec<Group> {
    let mut groups = Vec::with_capacity(units.len());
    let mut pending: Vec<Unit> = Vec::new();

    for unit in units {
        match unit.role {
            UnitRole::Comment => {
                let separated = pending
                    .last()
                    .is_some_and(|last| unit.start_row > last.end_row + 1);
                if separated {
                    groups.push(comment_group(source, std::mem::take(&mut pending)));
                }
                pending.push(unit);
            }
            UnitRole::Statement { kind, name } => {
                let attached = pending
                    .last()
                    .is_some_and(|last| unit.start_row == last.end_row + 1);

                let comment = if attached {
                    let first = pending.first().map_or(unit.start, |c| c.start);
                    let last = pending.last().map_or(unit.start, |c| c.end);
                    pending.clear();
                    Some(line_start_before(source, first)..last)
                } else {
                    if !pending.is_empty() {
                        groups.push(comment_group(source, std::mem::take(&mut pending)));
                    }
                    None
                };

                groups.push(Group {
                    code_start: unit.start,
                    end: unit.end,
                    comment,
                    kind,
                    name,
                });
            }
        }
    }

    if !pending.is_empty() {
        groups.push(comment_group(source, pending));
    }

    groups
}

fn comment_group(source: &str, comments: Vec<Unit>) -> Group {
    let start = comments.first().map_or(0, |c| c.start);
    let end = comments.last().map_or(start, |c| c.end);
    Group {
        code_start: line_start_before(source, start),
        end,
        comment: None,
        kind: DeclarationKind::CommentBlock { docstring: false },
        name: None,
    }
}

/// Turn groups into declarations whose spans tile the whole source
fn build_declarations(source: &str, groups: Vec<Group>) -> Vec<Declaration> {
    let lines = LineIndex::new(source);

    if groups.is_empty() {
        if source.is_empty() {
            return Vec::new();
        }
        let kind = DeclarationKind::Other;
        return vec![Declaration {
            id: Declaration::make_id(0, kind, None),
            kind,
            name: None,
            span: span(&lines, 0, source.len()),
            text: source.to_string(),
            code_offset: 0,
            leading_comment: None,
            order: 0,
        }];
    }

    let count = groups.len();
    let mut declarations = Vec::with_capacity(count);
    let mut cursor = 0;

    for (order, group) in groups.into_iter().enumerate() {
        let start = cursor;
        let end = if order + 1 == count {
            source.len()
        } else {
            group.end.max(start)
        };

        let leading_comment = group
            .comment
            .map(|range| (range.start - start)..(range.end - start));

        declarations.push(Declaration {
            id: Declaration::make_id(order, group.kind, group.name.as_deref()),
            kind: group.kind,
            name: group.name,
            span: span(&lines, start, end),
            text: source[start..end].to_string(),
            code_offset: group.code_start.saturating_sub(start),
            leading_comment,
            order,
        });

        cursor = end;
    }

    declarations
}

fn span(lines: &LineIndex, start: usize, end: usize) -> Span {
    Span {
        start,
        end,
        start_line: lines.row_of(start) + 1,
        end_line: lines.row_of(end.saturating_sub(1).max(start)) + 1,
    }
}
