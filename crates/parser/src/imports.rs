//! Static analysis of Python import statements

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

static FROM_IMPORT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^from\s+(\.*)\s*([\w.]*)\s+import\s+(.+)$").expect("valid from-import regex")
});

static PLAIN_IMPORT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^import\s+(.+)$").expect("valid import regex"));

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[_\p{L}]\w*$").expect("valid identifier regex"));

/// Top-level modules shipped with CPython
const STDLIB_MODULES: &[&str] = &[
    "abc", "argparse", "array", "ast", "asyncio", "atexit", "base64", "bisect", "builtins",
    "bz2", "calendar", "cmath", "codecs", "collections", "concurrent", "configparser",
    "contextlib", "contextvars", "copy", "csv", "ctypes", "dataclasses", "datetime",
    "decimal", "difflib", "dis", "email", "enum", "errno", "faulthandler", "fnmatch",
    "fractions", "ftplib", "functools", "gc", "getpass", "gettext", "glob", "gzip",
    "hashlib", "heapq", "hmac", "html", "http", "imaplib", "importlib", "inspect", "io",
    "ipaddress", "itertools", "json", "keyword", "linecache", "locale", "logging", "lzma",
    "math", "mimetypes", "mmap", "multiprocessing", "numbers", "operator", "os", "pathlib",
    "pickle", "pkgutil", "platform", "plistlib", "pprint", "profile", "pstats", "queue",
    "random", "re", "reprlib", "resource", "sched", "secrets", "select", "selectors",
    "shelve", "shlex", "shutil", "signal", "site", "smtplib", "socket", "socketserver",
    "sqlite3", "ssl", "stat", "statistics", "string", "struct", "subprocess", "sys",
    "sysconfig", "tarfile", "tempfile", "textwrap", "threading", "time", "timeit",
    "tkinter", "token", "tokenize", "traceback", "types", "typing", "unicodedata",
    "unittest", "urllib", "uuid", "venv", "warnings", "weakref", "webbrowser", "winreg",
    "wsgiref", "xml", "zipfile", "zipimport", "zlib", "zoneinfo",
];

/// Canonical import grouping, in output order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ImportGroup {
    Future,
    Standard,
    ThirdParty,
    Local,
}

/// What an import statement (or a `;`-joined run of them) brings into scope
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportInfo {
    /// First component of the imported module path (empty for `from . import x`)
    pub module: String,
    /// `from .x import y`
    pub relative: bool,
    /// `from __future__ import ...`
    pub future: bool,
    /// `from x import *`
    pub star: bool,
    /// Names bound in the importing namespace
    pub bound_names: BTreeSet<String>,
}

impl ImportInfo {
    /// Group used when imports are reordered
    #[must_use]
    pub fn group(&self, local_modules: &[String]) -> ImportGroup {
        if self.future {
            ImportGroup::Future
        } else if self.relative || local_modules.iter().any(|m| *m == self.module) {
            ImportGroup::Local
        } else if STDLIB_MODULES.binary_search(&self.module.as_str()).is_ok() {
            ImportGroup::Standard
        } else {
            ImportGroup::ThirdParty
        }
    }
}

/// Canonical text of an import statement.
///
/// Comments, blank lines, parentheses and backslash continuations are dropped
/// and whitespace is collapsed, so that `from a import (b,\n    c,)` and
/// `from a import b, c` normalize to the same string.
#[must_use]
pub fn normalize_import(text: &str) -> String {
    let mut flat = String::with_capacity(text.len());
    for line in text.lines() {
        let code = line.split('#').next().unwrap_or_default();
        flat.push_str(code);
        flat.push(' ');
    }
    let flat = flat.replace(['\\', '(', ')'], " ");

    flat.split(';')
        .map(|statement| {
            statement
                .split(',')
                .map(|part| part.split_whitespace().collect::<Vec<_>>().join(" "))
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|statement| !statement.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Analyze an import statement.
///
/// Returns `None` when the text is not something this analysis understands;
/// callers must then treat the statement as opaque.
#[must_use]
pub fn analyze_import(text: &str) -> Option<ImportInfo> {
    let normalized = normalize_import(text);
    let mut statements = normalized.split("; ");

    let mut info = analyze_statement(statements.next()?)?;
    for statement in statements {
        let next = analyze_statement(statement)?;
        info.relative |= next.relative;
        info.future |= next.future;
        info.star |= next.star;
        info.bound_names.extend(next.bound_names);
    }
    Some(info)
}

fn analyze_statement(statement: &str) -> Option<ImportInfo> {
    if let Some(caps) = FROM_IMPORT.captures(statement) {
        let dots = caps.get(1).map_or("", |m| m.as_str());
        let path = caps.get(2).map_or("", |m| m.as_str());
        let names = caps.get(3).map_or("", |m| m.as_str());

        if dots.is_empty() && path.is_empty() {
            return None;
        }

        let mut info = ImportInfo {
            module: path.split('.').next().unwrap_or_default().to_string(),
            relative: !dots.is_empty(),
            future: dots.is_empty() && path == "__future__",
            ..ImportInfo::default()
        };

        for item in names.split(", ") {
            if item == "*" {
                info.star = true;
                continue;
            }
            let bound = match item.split_once(" as ") {
                Some((_, alias)) => alias.trim(),
                None => item.trim(),
            };
            if !IDENTIFIER.is_match(bound) {
                return None;
            }
            info.bound_names.insert(bound.to_string());
        }
        return Some(info);
    }

    let caps = PLAIN_IMPORT.captures(statement)?;
    let names = caps.get(1).map_or("", |m| m.as_str());
    let mut info = ImportInfo::default();

    for item in names.split(", ") {
        let (path, alias) = match item.split_once(" as ") {
            Some((path, alias)) => (path.trim(), Some(alias.trim())),
            None => (item.trim(), None),
        };
        let root = path.split('.').next().unwrap_or_default();
        let bound = alias.unwrap_or(root);
        if !IDENTIFIER.is_match(bound) || !IDENTIFIER.is_match(root) {
            return None;
        }
        if info.module.is_empty() {
            info.module = root.to_string();
        }
        info.bound_names.insert(bound.to_string());
    }
    Some(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(info: &ImportInfo) -> Vec<&str> {
        info.bound_names.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_stdlib_list_is_sorted() {
        let mut sorted = STDLIB_MODULES.to_vec();
        sorted.sort_unstable();
        assert_eq!(sorted, STDLIB_MODULES);
    }

    #[test]
    fn test_normalize_import() {
        assert_eq!(normalize_import("import   os\n"), "import os");
        assert_eq!(
            normalize_import("from a import (\n    b,  # first\n    c,\n)\n"),
            "from a import b, c"
        );
        assert_eq!(
            normalize_import("from a import b, \\\n    c"),
            "from a import b, c"
        );
        assert_eq!(normalize_import("import os;import sys"), "import os; import sys");
    }

    #[test]
    fn test_plain_imports() {
        let info = analyze_import("import os.path, numpy as np\n").unwrap();
        assert_eq!(info.module, "os");
        assert_eq!(names(&info), vec!["np", "os"]);
        assert!(!info.relative && !info.future && !info.star);
    }

    #[test]
    fn test_from_imports() {
        let info = analyze_import("from collections import OrderedDict as OD, deque").unwrap();
        assert_eq!(info.module, "collections");
        assert_eq!(names(&info), vec!["OD", "deque"]);

        let relative = analyze_import("from ..pkg.mod import helper").unwrap();
        assert!(relative.relative);
        assert_eq!(relative.module, "pkg");

        let bare_relative = analyze_import("from . import sibling").unwrap();
        assert!(bare_relative.relative);
        assert_eq!(names(&bare_relative), vec!["sibling"]);

        assert!(analyze_import("from __future__ import annotations").unwrap().future);
        assert!(analyze_import("from os.path import *").unwrap().star);
    }

    #[test]
    fn test_semicolon_joined_imports_union() {
        let info = analyze_import("import os; from sys import argv").unwrap();
        assert_eq!(info.module, "os");
        assert_eq!(names(&info), vec!["argv", "os"]);
    }

    #[test]
    fn test_unrecognized_text_is_opaque() {
        assert!(analyze_import("x = 1").is_none());
        assert!(analyze_import("import").is_none());
    }

    #[test]
    fn test_groups() {
        let local = vec!["myapp".to_string()];
        let group = |text: &str| analyze_import(text).unwrap().group(&local);

        assert_eq!(group("from __future__ import annotations"), ImportGroup::Future);
        assert_eq!(group("import os"), ImportGroup::Standard);
        assert_eq!(group("import requests"), ImportGroup::ThirdParty);
        assert_eq!(group("from myapp.core import run"), ImportGroup::Local);
        assert_eq!(group("from .util import helper"), ImportGroup::Local);
        assert!(ImportGroup::Standard < ImportGroup::ThirdParty);
    }
}
