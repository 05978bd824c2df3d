use crate::diagnostics::{Diagnostic, Span};

/// Every reason an inline or fold request can decline. None of these are bugs: each one means
/// "no safe transformation exists", and callers report them instead of editing the source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InlineError {
    #[error("unsupported: {0}")]
    Unsupported(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not constant: {0}")]
    NonConstant(String),
    #[error("no branch matches: {0}")]
    NoMatchingBranch(String),
    #[error("`{0}` is async; the call must be awaited inside an async function")]
    NotAwaited(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("io error: {0}")]
    Io(String),
}

impl InlineError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn non_constant(message: impl Into<String>) -> Self {
        Self::NonConstant(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Unsupported(_) => "I1001",
            Self::NotFound(_) => "I1002",
            Self::NonConstant(_) => "I1003",
            Self::NoMatchingBranch(_) => "I1004",
            Self::NotAwaited(_) => "I1005",
            Self::Parse(_) => "I1006",
            Self::Io(_) => "I1007",
        }
    }

    pub fn to_diagnostic(&self, span: Span) -> Diagnostic {
        Diagnostic {
            code: self.code().to_string(),
            message: self.to_string(),
            span,
        }
    }
}

impl From<std::io::Error> for InlineError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
