use crate::lexer::Token;
use thiserror::Error;

pub mod context;

pub type Result<T> = std::result::Result<T, Error>;

pub use context::{ErrorChain, ErrorContext, OptionExt};

/// Main error type for the template engine
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed template source, raised while lexing or parsing
    #[error("Syntax error in '{template}' at line {line}, column {column}: {message}")]
    Syntax {
        template: String,
        line: usize,
        column: usize,
        message: String,
    },

    /// A value had the wrong runtime type for the requested operation
    #[error("Type error: {0}")]
    Type(String),

    /// Block, include or extends target could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Unknown or duplicate tag/filter name
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    // Error with context chain
    #[error("{message}")]
    WithContext {
        message: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Syntax error positioned at `token`
    pub fn syntax(template: &str, token: &Token, msg: impl Into<String>) -> Self {
        Self::Syntax {
            template: template.to_string(),
            line: token.line,
            column: token.column,
            message: msg.into(),
        }
    }

    /// Syntax error at an explicit position (used by the lexer)
    pub fn syntax_at(template: &str, line: usize, column: usize, msg: impl Into<String>) -> Self {
        Self::Syntax {
            template: template.to_string(),
            line,
            column,
            message: msg.into(),
        }
    }

    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn resolution(msg: impl Into<String>) -> Self {
        Self::Resolution(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    // Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            message: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, skipping any context wrappers
    pub fn root_cause(&self) -> &Error {
        let mut current = self;
        while let Error::WithContext { source, .. } = current {
            current = source;
        }
        current
    }

    /// Whether the root cause is malformed template source
    ///
    /// `compile` can also fail with `Registry` or `Resolution` errors, which
    /// are not syntax errors.
    pub fn is_syntax_error(&self) -> bool {
        matches!(self.root_cause(), Error::Syntax { .. })
    }

    /// Stable error code for diagnostics
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Syntax { .. } => "E_SYNTAX",
            Error::Type(_) => "E_TYPE",
            Error::Resolution(_) => "E_RESOLUTION",
            Error::Registry(_) => "E_REGISTRY",
            Error::Io(_) => "E_IO",
            Error::Json(_) => "E_JSON",
            Error::Config(_) => "E_CONFIG",
            Error::WithContext { source, .. } => source.error_code(),
        }
    }
}
