//! Error types for tree building, selector compilation and evaluation.

use crate::tree::NodeId;

/// Selector compilation failure.
///
/// Compile errors are always recoverable: re-issue corrected input. Errors
/// for which [`CompileError::is_incomplete`] returns true mean the statement
/// ended too early; an interactive front end should keep the line editable
/// instead of discarding it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("unknown cast type `{token}`")]
    UnknownCast { token: String },

    #[error("unknown type predicate `{token}`")]
    UnknownPredicate { token: String },

    #[error("unterminated quoted literal starting at `{token}`")]
    UnterminatedString { token: String },

    #[error("unexpected end of statement after `{token}`")]
    UnexpectedEnd { token: String },

    #[error("syntax error at `{token}`")]
    Syntax { token: String },
}

impl CompileError {
    /// The offending token, as written.
    pub fn token(&self) -> &str {
        match self {
            CompileError::UnknownCast { token }
            | CompileError::UnknownPredicate { token }
            | CompileError::UnterminatedString { token }
            | CompileError::UnexpectedEnd { token }
            | CompileError::Syntax { token } => token,
        }
    }

    /// True when the input ended mid-statement ("incomplete, not invalid").
    pub fn is_incomplete(&self) -> bool {
        matches!(
            self,
            CompileError::UnexpectedEnd { .. } | CompileError::UnterminatedString { .. }
        )
    }
}

/// Malformed tokenizer input. Fatal to the parse that produced it; surfaced
/// exactly once through document-ready rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("malformed markup at byte {position}: {message}")]
    Malformed { message: String, position: usize },

    #[error("parse aborted before end of input")]
    Aborted,
}

impl ParseError {
    pub(crate) fn malformed(message: impl Into<String>, position: usize) -> Self {
        ParseError::Malformed {
            message: message.into(),
            position,
        }
    }
}

/// Loader failure for one import. Neutralized at the import-table boundary:
/// the entry resolves to absent and the query proceeds.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("import `{name}` failed: {message}")]
pub struct ImportError {
    pub name: String,
    pub message: String,
}

impl ImportError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        ImportError {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Structural tree-invariant violation. Returned synchronously, never
/// retried, never swallowed; the tree is unchanged when one is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("node {0:?} does not exist in this tree")]
    NoSuchNode(NodeId),

    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild { parent: NodeId, child: NodeId },

    #[error("cannot attach node {0:?} to itself")]
    SelfAttach(NodeId),

    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCycle { parent: NodeId, child: NodeId },
}

/// Runtime evaluation failure inside the path-expression engine.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("unknown binding `{0}`")]
    UnknownBinding(String),

    #[error("{name}() expects {expected} argument(s), got {got}")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },

    #[error("type error: {0}")]
    Type(String),

    #[error("{0}")]
    Message(String),
}

/// Any failure the query surface can report.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Import(#[from] ImportError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error(transparent)]
    Eval(#[from] EvalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incomplete_classification() {
        let err = CompileError::UnexpectedEnd {
            token: "as".into(),
        };
        assert!(err.is_incomplete());
        assert_eq!(err.token(), "as");

        let err = CompileError::UnknownCast {
            token: "widget".into(),
        };
        assert!(!err.is_incomplete());
    }

    #[test]
    fn error_conversion() {
        let err: Error = ParseError::Aborted.into();
        assert!(matches!(err, Error::Parse(ParseError::Aborted)));
    }
}
