//! # modforge parser
//!
//! Splits a Python source file into an ordered sequence of top-level
//! declarations whose spans tile the file exactly.
//!
//! ## Architecture
//!
//! ```text
//! Source Code
//!     │
//!     ├──> Tree-sitter Parsing → AST (ERROR/MISSING nodes rejected)
//!     │
//!     ├──> Top-level units
//!     │    ├─> Fold statements sharing a line
//!     │    └─> Classify kind and name
//!     │
//!     └──> Declarations
//!          ├─> Attach adjacent comment runs
//!          ├─> Extend spans so they are contiguous
//!          └─> Emit Declaration[] with stable ids
//! ```
//!
//! ## Example
//!
//! ```rust
//! use modforge_parser::{DeclarationKind, SourceParser};
//!
//! let code = "import os\n\n\ndef main():\n    print(os.getcwd())\n";
//!
//! let mut parser = SourceParser::new().unwrap();
//! let declarations = parser.parse(code).unwrap();
//!
//! assert_eq!(declarations[1].kind, DeclarationKind::Function);
//! let rebuilt: String = declarations.iter().map(|d| d.text.as_str()).collect();
//! assert_eq!(rebuilt, code);
//! ```

mod ast_analyzer;
mod config;
mod error;
mod imports;
mod source_parser;
mod types;

pub use config::CommentPolicy;
pub use error::{ParserError, Result};
pub use imports::{analyze_import, normalize_import, ImportGroup, ImportInfo};
pub use source_parser::SourceParser;
pub use types::{Declaration, DeclarationKind, Span};
