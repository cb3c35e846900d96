//! Error kinds and error types shared by declaration and parsing.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Closed set of error categories.
///
/// Every error raised or recorded by the crate carries exactly one kind. The
/// kind's [`tag`](ErrorKind::tag) is the key used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidArity,
    InvalidValidation,
    InvalidConversionArgument,
    InvalidOption,
    MissingArgument,
    ParameterConflict,
    UnsupportedConversion,
    /// A converted value was rejected by the parameter's validator.
    Validation,
    /// A converted value is not in the parameter's permit set.
    UnpermittedArgument,
    /// A positional token had no argument left to bind to.
    UnexpectedArgument,
}

impl ErrorKind {
    /// Snake-case tag used as the key in error reports.
    pub fn tag(self) -> &'static str {
        match self {
            ErrorKind::InvalidArity => "invalid_arity",
            ErrorKind::InvalidValidation => "invalid_validation",
            ErrorKind::InvalidConversionArgument => "invalid_conversion_argument",
            ErrorKind::InvalidOption => "invalid_option",
            ErrorKind::MissingArgument => "missing_argument",
            ErrorKind::ParameterConflict => "parameter_conflict",
            ErrorKind::UnsupportedConversion => "unsupported_conversion",
            ErrorKind::Validation => "validation",
            ErrorKind::UnpermittedArgument => "unpermitted_argument",
            ErrorKind::UnexpectedArgument => "unexpected_argument",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Errors in a parameter declaration.
///
/// These indicate a mistake by whoever declared the parameters and are
/// always raised immediately, regardless of the parse error policy.
#[derive(Debug, Error)]
pub enum DeclarationError {
    #[error("invalid arity: {0}")]
    InvalidArity(String),

    #[error("invalid validation: {0}")]
    InvalidValidation(String),

    #[error("parameter conflict: {0}")]
    ParameterConflict(String),

    #[error("invalid declaration: {0}")]
    InvalidDeclaration(String),

    #[error("failed to parse JSON declaration: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeclarationError {
    /// The error kind, or `None` for a malformed declaration document or a
    /// field used on the wrong kind of parameter.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DeclarationError::InvalidArity(_) => Some(ErrorKind::InvalidArity),
            DeclarationError::InvalidValidation(_) => Some(ErrorKind::InvalidValidation),
            DeclarationError::ParameterConflict(_) => Some(ErrorKind::ParameterConflict),
            DeclarationError::InvalidDeclaration(_) | DeclarationError::Json(_) => None,
        }
    }
}

/// Errors caused by the input being parsed.
///
/// These are routed through the [`ErrorAggregator`](crate::ErrorAggregator)
/// and either abort the parse or are collected, depending on its policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{0}")]
    InvalidOption(String),

    #[error("{0}")]
    MissingArgument(String),

    #[error("{0}")]
    InvalidArity(String),

    #[error("{0}")]
    UnsupportedConversion(String),

    #[error("{0}")]
    InvalidConversionArgument(String),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    UnpermittedArgument(String),

    #[error("{0}")]
    UnexpectedArgument(String),
}

impl ParseError {
    /// Construct an error of the given kind with `message`.
    ///
    /// Declaration-only kinds have no parse-time counterpart and map to
    /// [`ParseError::Validation`].
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::InvalidOption => ParseError::InvalidOption(message),
            ErrorKind::MissingArgument => ParseError::MissingArgument(message),
            ErrorKind::InvalidArity => ParseError::InvalidArity(message),
            ErrorKind::UnsupportedConversion => ParseError::UnsupportedConversion(message),
            ErrorKind::InvalidConversionArgument => {
                ParseError::InvalidConversionArgument(message)
            }
            ErrorKind::UnpermittedArgument => ParseError::UnpermittedArgument(message),
            ErrorKind::UnexpectedArgument => ParseError::UnexpectedArgument(message),
            ErrorKind::Validation | ErrorKind::InvalidValidation | ErrorKind::ParameterConflict => {
                ParseError::Validation(message)
            }
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ParseError::InvalidOption(_) => ErrorKind::InvalidOption,
            ParseError::MissingArgument(_) => ErrorKind::MissingArgument,
            ParseError::InvalidArity(_) => ErrorKind::InvalidArity,
            ParseError::UnsupportedConversion(_) => ErrorKind::UnsupportedConversion,
            ParseError::InvalidConversionArgument(_) => ErrorKind::InvalidConversionArgument,
            ParseError::Validation(_) => ErrorKind::Validation,
            ParseError::UnpermittedArgument(_) => ErrorKind::UnpermittedArgument,
            ParseError::UnexpectedArgument(_) => ErrorKind::UnexpectedArgument,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::InvalidOption(m)
            | ParseError::MissingArgument(m)
            | ParseError::InvalidArity(m)
            | ParseError::UnsupportedConversion(m)
            | ParseError::InvalidConversionArgument(m)
            | ParseError::Validation(m)
            | ParseError::UnpermittedArgument(m)
            | ParseError::UnexpectedArgument(m) => m,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_are_snake_case() {
        assert_eq!(ErrorKind::InvalidArity.tag(), "invalid_arity");
        assert_eq!(
            ErrorKind::InvalidConversionArgument.tag(),
            "invalid_conversion_argument"
        );
        assert_eq!(ErrorKind::MissingArgument.to_string(), "missing_argument");
    }

    #[test]
    fn test_parse_error_roundtrips_kind() {
        let err = ParseError::new(ErrorKind::InvalidOption, "invalid option --bogus");
        assert_eq!(err.kind(), ErrorKind::InvalidOption);
        assert_eq!(err.message(), "invalid option --bogus");
        assert_eq!(err.to_string(), "invalid option --bogus");
    }

    #[test]
    fn test_serialized_kind_matches_tag() {
        let json = serde_json::to_string(&ErrorKind::UnsupportedConversion).unwrap();
        assert_eq!(json, "\"unsupported_conversion\"");
    }

    #[test]
    fn test_declaration_error_kind() {
        let err = DeclarationError::ParameterConflict("duplicate".into());
        assert_eq!(err.kind(), Some(ErrorKind::ParameterConflict));
    }
}
