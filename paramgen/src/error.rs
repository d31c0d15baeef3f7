// Error types for generator construction and validation.
//
// Two channels:
// - `PmtrError` is returned by the factory and by every specialized parser
//   (literal, transition, sieve, automaton, selection strings). A failed
//   construction never leaves a partially built generator behind.
// - `ValidationFailure` is only ever returned by `check_args()`, the explicit
//   semantic validation pass a caller may run over a built graph.
//
// Runtime `produce()` never errors; degenerate inputs fall back to defined
// values instead (see the individual generators).

use std::fmt;

use thiserror::Error;

/// Which grammar a syntax error came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyntaxKind {
    Literal,
    Transition,
    Sieve,
    Automaton,
    Selection,
    Format,
}

impl fmt::Display for SyntaxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyntaxKind::Literal => "literal",
            SyntaxKind::Transition => "transition",
            SyntaxKind::Sieve => "sieve",
            SyntaxKind::Automaton => "automaton",
            SyntaxKind::Selection => "selection",
            SyntaxKind::Format => "format",
        };
        f.write_str(name)
    }
}

/// Construction-time failure.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum PmtrError {
    #[error("no generator type named '{tag}'")]
    UnknownType { tag: String },

    #[error("{tag}: too many arguments; enter {expected} arguments (got {found})")]
    ArgCount {
        tag: String,
        expected: usize,
        found: usize,
    },

    #[error(
        "{tag}: wrong type of data used as an argument. replace {found} with a {expected} argument type (argument {position})"
    )]
    ArgType {
        tag: String,
        position: usize,
        found: String,
        expected: String,
    },

    #[error("{kind} syntax error in '{fragment}': {message}")]
    Syntax {
        kind: SyntaxKind,
        fragment: String,
        message: String,
    },

    #[error("{tag}: {message}")]
    Value { tag: String, message: String },

    #[error("generator nesting exceeds depth {depth}")]
    TooDeep { depth: usize },
}

impl PmtrError {
    pub fn syntax(kind: SyntaxKind, fragment: impl Into<String>, message: impl Into<String>) -> Self {
        PmtrError::Syntax {
            kind,
            fragment: fragment.into(),
            message: message.into(),
        }
    }

    pub fn value(tag: impl Into<String>, message: impl Into<String>) -> Self {
        PmtrError::Value {
            tag: tag.into(),
            message: message.into(),
        }
    }
}

/// A semantic problem reported by `check_args()`.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{tag}: {message}")]
pub struct ValidationFailure {
    pub tag: String,
    pub message: String,
}

impl ValidationFailure {
    pub fn new(tag: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            message: message.into(),
        }
    }
}
