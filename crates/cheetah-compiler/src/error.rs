//! The compiler's error taxonomy.

use crate::span::Span;

/// Errors that can occur while compiling a template.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// The lexer could not make sense of the character stream at `span`
    /// (unterminated string, unknown escape, end of input mid-token).
    #[error("lexical error at {span:?}: {detail}")]
    Lexical { span: Span, detail: String },

    /// `#someDirective` does not name a known directive and no macro
    /// directive is registered under that name.
    #[error("unknown directive '{name}' at {span:?}")]
    UnknownDirective { span: Span, name: String },

    /// `#end X` does not match the directive on top of the open stack.
    #[error("mismatched '#end {found}' at {span:?}, expected '#end {expected}'")]
    MismatchedEnd {
        span: Span,
        expected: String,
        found: String,
    },

    /// A directive's argument text could not be parsed as an expression,
    /// dotted name, or argument list.
    #[error("invalid syntax at {span:?}: {detail}")]
    InvalidSyntax { span: Span, detail: String },

    /// An internal invariant was violated; indicates a compiler bug
    /// rather than malformed input.
    #[error("internal invariant violated: {detail}")]
    Invariant { detail: String },
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Lexical { span, .. }
            | CompileError::UnknownDirective { span, .. }
            | CompileError::MismatchedEnd { span, .. }
            | CompileError::InvalidSyntax { span, .. } => Some(*span),
            CompileError::Invariant { .. } => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
