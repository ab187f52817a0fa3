use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A solution or project file could not be read.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("XML Error: {0}")]
    Xml(#[from] roxmltree::Error),

    /// A `.sln` line that does not have the shape its context requires.
    #[error("line {line_number}: {reason}: `{line}`")]
    MalformedLine {
        line_number: usize,
        line: String,
        reason: String,
    },

    #[error("Failed to parse condition '{condition}': {message}")]
    Condition { condition: String, message: String },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }

    pub(crate) fn malformed(line_number: usize, line: &str, reason: impl Into<String>) -> Self {
        Self::MalformedLine {
            line_number,
            line: line.to_string(),
            reason: reason.into(),
        }
    }
}

/// Failure of [`crate::variables::evaluate`].
///
/// Every variant keeps the string as it stood when evaluation stopped, so
/// callers can inspect how far substitution got.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("unterminated `$(` at byte {position}")]
    Unterminated { partial: String, position: usize },

    #[error("unresolved variable `$({name})`")]
    Unresolved { name: String, partial: String },

    /// The environment has the variable but its value is not valid Unicode.
    #[error("environment variable `{name}` is not valid unicode")]
    NotUnicode { name: String, partial: String },

    #[error("variable expansion exceeded {limit} substitutions")]
    TooManySubstitutions { partial: String, limit: usize },
}

impl EvalError {
    /// The partially substituted string.
    pub fn partial(&self) -> &str {
        match self {
            Self::Unterminated { partial, .. }
            | Self::Unresolved { partial, .. }
            | Self::NotUnicode { partial, .. }
            | Self::TooManySubstitutions { partial, .. } => partial,
        }
    }
}
