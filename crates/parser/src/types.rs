use crate::config::CommentPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// A contiguous top-level unit of a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Declaration {
    /// Stable identifier, e.g. `0002-class-Widget`
    pub id: String,

    /// Syntactic kind
    pub kind: DeclarationKind,

    /// Declared name (class, function or constant target)
    pub name: Option<String>,

    /// Position of this declaration in the source file
    pub span: Span,

    /// Exact source bytes covered by `span`
    pub text: String,

    /// Offset inside `text` where the statement itself starts
    /// (after leading blank lines and attached comments)
    pub code_offset: usize,

    /// Range inside `text` of the attached leading comment, if any
    pub leading_comment: Option<Range<usize>>,

    /// Zero-based position in file order
    pub order: usize,
}

impl Declaration {
    /// Build the identifier for a declaration at `order`
    #[must_use]
    pub fn make_id(order: usize, kind: DeclarationKind, name: Option<&str>) -> String {
        match name {
            Some(name) => format!("{order:04}-{}-{name}", kind.as_str()),
            None => format!("{order:04}-{}", kind.as_str()),
        }
    }

    /// Attached leading comment text
    #[must_use]
    pub fn leading_comment(&self) -> Option<&str> {
        self.leading_comment
            .as_ref()
            .map(|range| &self.text[range.clone()])
    }

    /// The statement text without leading blank lines and attached comments
    #[must_use]
    pub fn code(&self) -> &str {
        &self.text[self.code_offset..]
    }

    /// Render the declaration under a comment policy
    #[must_use]
    pub fn render(&self, policy: CommentPolicy) -> String {
        match self.kind {
            DeclarationKind::CommentBlock { docstring: false } if !policy.preserve_comments => {
                String::new()
            }
            DeclarationKind::CommentBlock { docstring: true } if !policy.preserve_docstrings => {
                String::new()
            }
            _ => match &self.leading_comment {
                Some(range) if !policy.preserve_comments => {
                    let mut out = String::with_capacity(self.text.len());
                    out.push_str(&self.text[..range.start]);
                    out.push_str(&self.text[range.end..]);
                    out
                }
                _ => self.text.clone(),
            },
        }
    }
}

/// Byte and line extent of a declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    /// Start byte (inclusive)
    pub start: usize,

    /// End byte (exclusive)
    pub end: usize,

    /// First line (1-indexed)
    pub start_line: usize,

    /// Last line (1-indexed, inclusive)
    pub end_line: usize,
}

impl Span {
    #[must_use]
    pub const fn len(&self) -> usize {
        self.end - self.start
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// Kind of a top-level declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclarationKind {
    /// `import x` / `from x import y`
    Import,
    /// Assignment to a single top-level name
    Constant,
    /// Class definition (decorated or not)
    Class,
    /// Function definition (decorated or not, sync or async)
    Function,
    /// Standalone `#` comment run or bare string statement
    CommentBlock { docstring: bool },
    /// Any other top-level statement
    Other,
}

impl DeclarationKind {
    /// Label used in identifiers, metadata and `kind` rules
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Constant => "constant",
            Self::Class => "class",
            Self::Function => "function",
            Self::CommentBlock { docstring: false } => "comment",
            Self::CommentBlock { docstring: true } => "docstring",
            Self::Other => "other",
        }
    }

    /// Parse a label produced by [`DeclarationKind::as_str`]
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "import" => Some(Self::Import),
            "constant" => Some(Self::Constant),
            "class" => Some(Self::Class),
            "function" => Some(Self::Function),
            "comment" => Some(Self::CommentBlock { docstring: false }),
            "docstring" => Some(Self::CommentBlock { docstring: true }),
            "other" => Some(Self::Other),
            _ => None,
        }
    }

    /// Check whether a `kind` rule label selects this kind.
    ///
    /// `comment` selects docstring blocks as well.
    #[must_use]
    pub fn matches_label(self, label: &str) -> bool {
        let label = label.trim().to_ascii_lowercase();
        if label == "comment" {
            return matches!(self, Self::CommentBlock { .. });
        }
        label == self.as_str()
    }
}

impl fmt::Display for DeclarationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
