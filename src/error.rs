use thiserror::Error;

use crate::lexer::Position;

pub type Result<T> = std::result::Result<T, Error>;

/// Every way a compilation can fail. None of them is recoverable: the first
/// one raised aborts the whole unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("lexical error at {pos}: {message}")]
    Lexical { message: String, pos: Position },

    #[error("syntax error at {pos}: {message}")]
    Syntax { message: String, pos: Position },

    #[error("undefined symbol '{name}'")]
    UndefinedSymbol { name: String },

    #[error("procedure '{callee}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
    },

    #[error("type mismatch: {message}")]
    TypeMismatch { message: String },

    #[error("unsupported type '{name}'")]
    UnsupportedType { name: String },

    #[error("missing overload '{name}' for {operands}")]
    MissingOverload { name: String, operands: String },

    #[error("redefinition of '{name}'")]
    Redefinition { name: String },

    #[error("error occurred while verifying procedure '{function}': {reason}")]
    Verification { function: String, reason: String },
}

impl Error {
    pub fn lexical(message: impl Into<String>, pos: Position) -> Error {
        Error::Lexical {
            message: message.into(),
            pos,
        }
    }

    pub fn syntax(message: impl Into<String>, pos: Position) -> Error {
        Error::Syntax {
            message: message.into(),
            pos,
        }
    }

    pub fn type_mismatch(message: impl Into<String>) -> Error {
        Error::TypeMismatch {
            message: message.into(),
        }
    }

    pub fn undefined(name: impl Into<String>) -> Error {
        Error::UndefinedSymbol { name: name.into() }
    }
}
