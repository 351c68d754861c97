//! Sandbox Errors
//!
//! Every failure raised while running a verification fragment. The `Display`
//! form (`"<Kind>: <message>"`) is what the generator sees in its diagnostic
//! turn, so messages read like interpreter tracebacks.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SandboxError {
    #[error("SyntaxError: {message} (line {line})")]
    Syntax { line: usize, message: String },

    #[error("NameError: name '{0}' is not defined")]
    Name(String),

    #[error("AttributeError: {0}")]
    Attribute(String),

    #[error("ImportError: {0}")]
    Import(String),

    #[error("TypeError: {0}")]
    Type(String),

    #[error("ValueError: {0}")]
    Value(String),

    #[error("IndexError: {0}")]
    Index(String),

    #[error("KeyError: {0}")]
    Key(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(String),

    #[error("NotImplementedError: {0}")]
    NotImplemented(String),
}

pub type SandboxResult<T> = Result<T, SandboxError>;

impl SandboxError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }

    pub fn value(message: impl Into<String>) -> Self {
        Self::Value(message.into())
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::NotImplemented(message.into())
    }
}
