use crate::cancel::CancellationToken;
use crate::checksum::sha256_hex;
use crate::classifier::module_file_name;
use crate::config::DEFAULT_CATEGORIES;
use crate::error::{ComposerError, Result};
use crate::format;
use crate::metadata::ProjectMetadata;
use crate::project::Project;
use crate::warning::ComposeWarning;
use modforge_parser::DeclarationKind;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// A declaration as recovered from a module file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadDeclaration {
    /// Marker id, if the unit had one
    pub id: Option<String>,
    /// Kind recorded in metadata; `None` when unknown
    pub kind: Option<DeclarationKind>,
    /// Original order index, when metadata knows the id
    pub order: Option<usize>,
    pub text: String,
    /// Module file the text came from
    pub module: PathBuf,
}

/// Result of reading a modules directory
#[derive(Debug, Default)]
pub struct Reconstruction {
    pub declarations: Vec<ReadDeclaration>,
    pub warnings: Vec<ComposeWarning>,
    /// True when the order came from metadata without any fallback
    pub exact: bool,
}

/// One marker-delimited chunk of a module file
struct RawUnit {
    id: Option<String>,
    text: String,
}

/// Loads module files back into an ordered declaration sequence
pub struct ModuleReader<'a> {
    project: &'a Project,
    cancel: CancellationToken,
}

impl<'a> ModuleReader<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self {
            project,
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Reconstruct the declaration sequence.
    ///
    /// With metadata, units are put back at their recorded order index and
    /// disagreements degrade to a best-effort order plus warnings. Without
    /// metadata the order is heuristic.
    pub fn read(&self, metadata: Option<&ProjectMetadata>) -> Result<Reconstruction> {
        let preferred: Vec<String> = match metadata {
            Some(metadata) => metadata.categories.clone(),
            None => heuristic_category_order(),
        };
        let files = self.module_files(&preferred)?;

        let mut loaded = Vec::with_capacity(files.len());
        for path in files {
            let contents = std::fs::read_to_string(&path).map_err(|source| {
                ComposerError::ModuleUnreadable {
                    path: path.clone(),
                    source,
                }
            })?;
            log::debug!("Read module {}", path.display());
            loaded.push((path, split_units(&contents)));
            self.cancel.check("after module read")?;
        }

        Ok(match metadata {
            Some(metadata) => assemble_with_metadata(metadata, loaded),
            None => assemble_heuristic(loaded),
        })
    }

    /// `*.py` files except `__init__.py`: preferred categories first, the rest by name
    fn module_files(&self, preferred: &[String]) -> Result<Vec<PathBuf>> {
        let dir = self.project.modules_dir();
        let entries = std::fs::read_dir(dir).map_err(|err| ComposerError::io(dir, err))?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| ComposerError::io(dir, err))?;
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.ends_with(".py") && name != format::INIT_FILE {
                names.push(name.to_string());
            }
        }
        names.sort();

        let mut ordered = Vec::with_capacity(names.len());
        for category in preferred {
            let file_name = module_file_name(category);
            if let Some(pos) = names.iter().position(|n| *n == file_name) {
                ordered.push(names.remove(pos));
            }
        }
        ordered.extend(names);

        Ok(ordered.into_iter().map(|name| dir.join(name)).collect())
    }
}

fn heuristic_category_order() -> Vec<String> {
    DEFAULT_CATEGORIES.iter().map(|c| (*c).to_string()).collect()
}

/// Split a module file at marker lines and unescape reserved lines. Text
/// before the first marker that is not the generated header becomes an
/// unnamed unit.
fn split_units(contents: &str) -> Vec<RawUnit> {
    let body = &contents[format::header_len(contents)..];
    let mut units = Vec::new();
    let mut current = RawUnit {
        id: None,
        text: String::new(),
    };

    for line in body.split_inclusive('\n') {
        if let Some(id) = format::parse_marker(line) {
            if current.id.is_some() || !current.text.trim().is_empty() {
                units.push(current);
            }
            current = RawUnit {
                id: Some(id.to_string()),
                text: String::new(),
            };
        } else {
            current.text.push_str(format::unescape_line(line));
        }
    }
    if current.id.is_some() || !current.text.trim().is_empty() {
        units.push(current);
    }
    units
}

/// Sort key for best-effort ordering: (anchor order, rank, sequence)
type OrderKey = (usize, u8, usize);

fn assemble_with_metadata(
    metadata: &ProjectMetadata,
    files: Vec<(PathBuf, Vec<RawUnit>)>,
) -> Reconstruction {
    let mut warnings = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    let mut keyed: Vec<(OrderKey, ReadDeclaration)> = Vec::new();
    let mut sequence = 0usize;
    let mut fallback = false;

    for (path, units) in files {
        let mut resolved: Vec<ReadDeclaration> = Vec::with_capacity(units.len());
        for unit in units {
            resolved.push(resolve_unit(metadata, &path, unit, &mut seen, &mut warnings));
        }

        let first_known = resolved.iter().find_map(|d| d.order);
        let mut previous_known: Option<usize> = None;
        for declaration in resolved {
            sequence += 1;
            let key = match declaration.order {
                Some(order) => {
                    previous_known = Some(order);
                    (order, 1, sequence)
                }
                None => {
                    fallback = true;
                    match (previous_known, first_known) {
                        (Some(previous), _) => (previous, 2, sequence),
                        (None, Some(first)) => (first, 0, sequence),
                        (None, None) => (usize::MAX, 1, sequence),
                    }
                }
            };
            keyed.push((key, declaration));
        }
    }

    for id in metadata.ids_in_order() {
        if !seen.contains(id) {
            fallback = true;
            warnings.push(ComposeWarning::Reconstruction {
                detail: format!("declaration {id} is missing from every module file"),
            });
        }
    }

    keyed.sort_by_key(|(key, _)| *key);
    Reconstruction {
        declarations: keyed.into_iter().map(|(_, d)| d).collect(),
        warnings,
        exact: !fallback,
    }
}

fn resolve_unit(
    metadata: &ProjectMetadata,
    path: &Path,
    unit: RawUnit,
    seen: &mut HashSet<String>,
    warnings: &mut Vec<ComposeWarning>,
) -> ReadDeclaration {
    let module = path.to_path_buf();
    let Some(id) = unit.id else {
        warnings.push(ComposeWarning::Reconstruction {
            detail: format!("unmarked code in {}", path.display()),
        });
        return ReadDeclaration {
            id: None,
            kind: None,
            order: None,
            text: unit.text,
            module,
        };
    };

    let entry = metadata.entries.get(&id);
    let fresh = seen.insert(id.clone());
    let Some(entry) = entry.filter(|_| fresh) else {
        let detail = if fresh {
            format!("{} contains unknown declaration {id}", path.display())
        } else {
            format!("declaration {id} appears more than once ({})", path.display())
        };
        warnings.push(ComposeWarning::Reconstruction { detail });
        return ReadDeclaration {
            id: Some(id),
            kind: None,
            order: None,
            text: unit.text,
            module,
        };
    };

    let mut text = unit.text;
    if !entry.ends_with_newline && text.ends_with('\n') {
        text.pop();
    }
    if sha256_hex(&text) != entry.checksum {
        warnings.push(ComposeWarning::ChecksumMismatch {
            id: id.clone(),
            module: module.clone(),
        });
    }

    ReadDeclaration {
        kind: entry.kind(),
        order: Some(entry.order),
        id: Some(id),
        text,
        module,
    }
}

fn assemble_heuristic(files: Vec<(PathBuf, Vec<RawUnit>)>) -> Reconstruction {
    let declarations = files
        .into_iter()
        .flat_map(|(path, units)| {
            units.into_iter().map(move |unit| ReadDeclaration {
                id: unit.id,
                kind: None,
                order: None,
                text: unit.text,
                module: path.clone(),
            })
        })
        .collect();

    Reconstruction {
        declarations,
        warnings: Vec::new(),
        exact: false,
    }
}
