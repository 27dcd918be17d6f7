use thiserror::Error;

/// Result type for parser operations
pub type Result<T> = std::result::Result<T, ParserError>;

/// Errors that can occur while splitting source into declarations
#[derive(Error, Debug)]
pub enum ParserError {
    /// Source is not syntactically well-formed
    #[error("Parse error at line {line}, column {column}: {message}")]
    ParseError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Tree-sitter could not be set up or gave up on the input
    #[error("Tree-sitter error: {0}")]
    TreeSitterError(String),
}

impl ParserError {
    /// Create a parse error at a 1-based position
    pub fn parse(line: usize, column: usize, msg: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            column,
            message: msg.into(),
        }
    }

    /// Create a tree-sitter error
    pub fn tree_sitter(msg: impl Into<String>) -> Self {
        Self::TreeSitterError(msg.into())
    }
}
