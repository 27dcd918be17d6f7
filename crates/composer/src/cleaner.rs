use crate::config::CleanupConfig;
use crate::warning::ComposeWarning;
use modforge_parser::{
    analyze_import, normalize_import, Declaration, DeclarationKind, ImportGroup, ImportInfo,
    SourceParser,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::ops::RangeInclusive;

static IDENTIFIER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_\p{L}]\w*").expect("valid identifier token regex"));

/// Outcome of a cleanup pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanOutput {
    pub body: String,
    /// Normalized text of each removed import
    pub removed_imports: Vec<String>,
    pub reordered_runs: usize,
    pub collapsed_lines: usize,
    pub warnings: Vec<ComposeWarning>,
}

/// Behavior-preserving normalization of a merged body
pub struct Cleaner<'a> {
    config: &'a CleanupConfig,
}

impl<'a> Cleaner<'a> {
    pub const fn new(config: &'a CleanupConfig) -> Self {
        Self { config }
    }

    /// Apply the enabled steps in order: unused imports, import order, line
    /// normalization. A body that does not parse is returned unchanged.
    #[must_use]
    pub fn clean(&self, body: &str) -> CleanOutput {
        let mut output = CleanOutput {
            body: body.to_string(),
            ..CleanOutput::default()
        };

        let mut parser = match SourceParser::new() {
            Ok(parser) => parser,
            Err(err) => return skipped(output, err.to_string()),
        };

        if self.config.remove_unused_imports {
            let declarations = match parser.parse(&output.body) {
                Ok(declarations) => declarations,
                Err(err) => return skipped(output, err.to_string()),
            };
            let (body, removed) = remove_unused_imports(&output.body, &declarations);
            output.body = body;
            output.removed_imports = removed;
        }

        if self.config.reorder_imports {
            let declarations = match parser.parse(&output.body) {
                Ok(declarations) => declarations,
                Err(err) => return skipped(output, err.to_string()),
            };
            let (body, runs) = reorder_import_runs(&declarations, &self.config.local_modules);
            output.body = body;
            output.reordered_runs = runs;
        }

        if self.config.collapse_blank_lines || self.config.strip_trailing_whitespace {
            let strings = match parser.string_rows(&output.body) {
                Ok(rows) => rows,
                Err(err) => return skipped(output, err.to_string()),
            };
            let max_blank = self
                .config
                .collapse_blank_lines
                .then_some(self.config.max_blank_lines);
            let (body, collapsed) = normalize_lines(
                &output.body,
                &strings,
                max_blank,
                self.config.strip_trailing_whitespace,
            );
            output.body = body;
            output.collapsed_lines = collapsed;
        }

        log::debug!(
            "Cleanup removed {} imports, reordered {} runs, collapsed {} blank lines",
            output.removed_imports.len(),
            output.reordered_runs,
            output.collapsed_lines
        );
        output
    }
}

fn skipped(mut output: CleanOutput, reason: String) -> CleanOutput {
    output.warnings.push(ComposeWarning::CleanupSkipped { reason });
    output
}

fn token_counts(text: &str) -> HashMap<&str, usize> {
    let mut counts = HashMap::new();
    for token in IDENTIFIER_TOKEN.find_iter(text) {
        *counts.entry(token.as_str()).or_insert(0) += 1;
    }
    counts
}

/// Import facts when the statement is safe to reason about
fn removable_info(declaration: &Declaration) -> Option<ImportInfo> {
    if declaration.kind != DeclarationKind::Import {
        return None;
    }
    let info = analyze_import(declaration.code())?;
    (!info.star && !info.future && !info.bound_names.is_empty()).then_some(info)
}

/// Drop import statements none of whose bound names occur anywhere else
fn remove_unused_imports(body: &str, declarations: &[Declaration]) -> (String, Vec<String>) {
    let everywhere = token_counts(body);
    let mut out = String::with_capacity(body.len());
    let mut removed = Vec::new();

    for declaration in declarations {
        if let Some(info) = removable_info(declaration) {
            let own = token_counts(declaration.code());
            let referenced = info.bound_names.iter().any(|name| {
                let total = everywhere.get(name.as_str()).copied().unwrap_or(0);
                let local = own.get(name.as_str()).copied().unwrap_or(0);
                total > local
            });
            if !referenced {
                let normalized = normalize_import(declaration.code());
                log::debug!("Removing unused import `{normalized}`");
                removed.push(normalized);
                out.push_str(&declaration.text[..declaration.code_offset]);
                continue;
            }
        }
        out.push_str(&declaration.text);
    }

    (out, removed)
}

/// Byte length of the whitespace-only lines at the start of `text`
fn blank_prefix_len(text: &str) -> usize {
    text.split_inclusive('\n')
        .take_while(|line| line.trim().is_empty() && line.ends_with('\n'))
        .map(str::len)
        .sum()
}

/// Sort each contiguous run of top-level imports into canonical groups
fn reorder_import_runs(declarations: &[Declaration], local_modules: &[String]) -> (String, usize) {
    let mut out = String::new();
    let mut runs = 0;
    let mut index = 0;

    while index < declarations.len() {
        let run_end = declarations[index..]
            .iter()
            .position(|d| d.kind != DeclarationKind::Import)
            .map_or(declarations.len(), |offset| index + offset);

        if run_end - index < 2 {
            out.push_str(&declarations[index].text);
            index += 1;
            continue;
        }

        let run = &declarations[index..run_end];
        let original: String = run.iter().map(|d| d.text.as_str()).collect();
        match reorder_run(run, local_modules) {
            Some(sorted) if sorted != original => {
                runs += 1;
                out.push_str(&sorted);
            }
            _ => out.push_str(&original),
        }
        index = run_end;
    }

    (out, runs)
}

fn reorder_run(run: &[Declaration], local_modules: &[String]) -> Option<String> {
    let mut items: Vec<(ImportGroup, String, &str)> = Vec::with_capacity(run.len());
    for declaration in run {
        let info = analyze_import(declaration.code())?;
        if info.star {
            return None;
        }
        let core = declaration.text[blank_prefix_len(&declaration.text)..].trim_end();
        items.push((
            info.group(local_modules),
            normalize_import(declaration.code()),
            core,
        ));
    }
    items.sort_by(|a, b| (a.0, &a.1).cmp(&(b.0, &b.1)));

    let first = run.first()?;
    let last = run.last()?;
    let mut out = first.text[..blank_prefix_len(&first.text)].to_string();
    let mut previous_group = None;
    for (group, _, core) in &items {
        if let Some(previous) = previous_group {
            out.push('\n');
            if previous != *group {
                out.push('\n');
            }
        }
        out.push_str(core);
        previous_group = Some(*group);
    }
    out.push_str(&last.text[last.text.trim_end().len()..]);
    Some(out)
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(content) = line.strip_suffix("\r\n") {
        (content, "\r\n")
    } else if let Some(content) = line.strip_suffix('\n') {
        (content, "\n")
    } else {
        (line, "")
    }
}

/// Collapse long blank runs and strip trailing whitespace outside string literals.
///
/// `strings` holds the rows inside multi-line strings, excluding each opening row.
fn normalize_lines(
    body: &str,
    strings: &[RangeInclusive<usize>],
    max_blank: Option<usize>,
    strip_trailing: bool,
) -> (String, usize) {
    let inside_string = |row: usize| strings.iter().any(|r| r.contains(&row));
    let touches_string = |row: usize| strings.iter().any(|r| row + 1 >= *r.start() && row <= *r.end());

    let mut out = String::with_capacity(body.len());
    let mut blank_run = 0;
    let mut collapsed = 0;

    for (row, line) in body.split_inclusive('\n').enumerate() {
        let (content, ending) = split_line_ending(line);

        match max_blank {
            Some(max) if !inside_string(row) && content.trim().is_empty() => {
                blank_run += 1;
                if blank_run > max {
                    collapsed += 1;
                    continue;
                }
            }
            _ => blank_run = 0,
        }

        if strip_trailing && !touches_string(row) {
            out.push_str(content.trim_end());
        } else {
            out.push_str(content);
        }
        out.push_str(ending);
    }

    (out, collapsed)
}
