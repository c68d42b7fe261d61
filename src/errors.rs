use std::fmt;

use thiserror::Error;

use crate::lexer;

/// Error aborting a whole load. Element-level problems never end up here,
/// they are recorded as [`Diagnostic`]s instead.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("loading was cancelled")]
    Cancelled,
}

/// Error in a configuration document or crossref mapping line
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("malformed crossref mapping '{0}', expected 'type:field>field1&field2'")]
    MalformedMapping(String),
    #[cfg(feature = "json")]
    #[error("invalid configuration document: {0}")]
    Json(#[from] serde_json::Error),
}

// Represents an error that aborts the element currently being read
#[derive(Debug, Error)]
pub(crate) enum SyntaxError {
    #[error("unexpected {found} while {action}")]
    UnexpectedToken {
        found: lexer::Token,
        action: &'static str,
        info: lexer::TokenInfo,
    },
    #[error("unexpected end of file while {action}")]
    UnexpectedEof {
        action: &'static str,
        info: lexer::TokenInfo,
    },
}

impl SyntaxError {
    pub(crate) fn info(&self) -> &lexer::TokenInfo {
        match self {
            Self::UnexpectedToken { info, .. } | Self::UnexpectedEof { info, .. } => info,
        }
    }

    /// The token that triggered the error, if any was consumed
    pub(crate) fn found(&self) -> Option<&lexer::Token> {
        match self {
            Self::UnexpectedToken { found, .. } => Some(found),
            Self::UnexpectedEof { .. } => None,
        }
    }
}

/// Class of a recorded problem
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// unexpected token, the element was dropped
    Syntax,
    /// unsupported codec name, default encoding was used
    Encoding,
    /// duplicate id or field renamed, or element dropped at end of input
    Structural,
    /// a name or keyword heuristic fell back to a conservative representation
    AmbiguousHeuristic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// One entry of the diagnostic log produced while loading
#[derive(Clone, Debug)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    /// 1-based line number
    pub lineno: usize,
    /// 0-based column
    pub colno: usize,
    /// source line the problem occurred on
    pub current_line: String,
    /// id of the entry being read when the problem occurred
    pub current_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub(crate) fn new(kind: DiagnosticKind, info: &lexer::TokenInfo, message: String) -> Diagnostic {
        let severity = match kind {
            DiagnosticKind::Syntax => Severity::Error,
            _ => Severity::Warning,
        };
        Diagnostic {
            kind,
            severity,
            lineno: info.lineno,
            colno: info.colno,
            current_line: info.current_line.clone(),
            current_id: info.current_id.clone(),
            message,
        }
    }
}

impl From<SyntaxError> for Diagnostic {
    fn from(err: SyntaxError) -> Self {
        let kind = match err {
            SyntaxError::UnexpectedToken { .. } => DiagnosticKind::Syntax,
            SyntaxError::UnexpectedEof { .. } => DiagnosticKind::Structural,
        };
        Diagnostic::new(kind, err.info(), err.to_string())
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(id) = &self.current_id {
            write!(f, "{} at line {} col {} in entry {}",
                self.message, self.lineno, self.colno + 1, id)?;
        } else {
            write!(f, "{} at line {} col {}", self.message, self.lineno, self.colno + 1)?;
        }
        if !self.current_line.trim().is_empty() {
            write!(f, "\n>> {}", self.current_line)?;
            write!(f, "\n   {:skip$}↑ here", "", skip = self.colno)?;
        }
        Ok(())
    }
}
