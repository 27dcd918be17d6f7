use serde::{Deserialize, Serialize};

/// Controls whether comments and top-level docstrings survive rendering.
///
/// Parsing always captures every byte; the policy only decides what a
/// declaration renders to when it is written out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentPolicy {
    /// Keep `#` comments (standalone blocks and attached leading comments)
    pub preserve_comments: bool,

    /// Keep top-level docstring blocks
    pub preserve_docstrings: bool,
}

impl Default for CommentPolicy {
    fn default() -> Self {
        Self {
            preserve_comments: true,
            preserve_docstrings: true,
        }
    }
}

impl CommentPolicy {
    /// Policy that keeps everything verbatim
    #[must_use]
    pub const fn verbatim() -> Self {
        Self {
            preserve_comments: true,
            preserve_docstrings: true,
        }
    }

    /// Policy that drops comments and top-level docstrings
    #[must_use]
    pub const fn code_only() -> Self {
        Self {
            preserve_comments: false,
            preserve_docstrings: false,
        }
    }

    /// True when rendering reproduces the source exactly
    #[must_use]
    pub const fn is_verbatim(self) -> bool {
        self.preserve_comments && self.preserve_docstrings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_is_verbatim() {
        assert!(CommentPolicy::default().is_verbatim());
        assert!(!CommentPolicy::code_only().is_verbatim());
    }

    #[test]
    fn test_partial_policy_deserializes_with_defaults() {
        let policy: CommentPolicy =
            serde_json::from_str(r#"{"preserve_comments": false}"#).unwrap();
        assert!(!policy.preserve_comments);
        assert!(policy.preserve_docstrings);
    }
}
