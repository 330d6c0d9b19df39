//! Directive resolution errors.

use thiserror::Error;

/// Errors a resolver may report for a single directive.
///
/// These never escape the formatter: they are logged and the directive
/// expands to an empty string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("the replacement directive '{name}' is not supported")]
    UnknownDirective { name: String },

    #[error("invalid parameter '{parameter}' for directive '{directive}'")]
    InvalidParameter { directive: String, parameter: String },
}

impl DirectiveError {
    pub fn unknown(name: &str) -> Self {
        DirectiveError::UnknownDirective {
            name: name.to_string(),
        }
    }

    pub fn invalid(directive: &str, parameter: &str) -> Self {
        DirectiveError::InvalidParameter {
            directive: directive.to_string(),
            parameter: parameter.to_string(),
        }
    }
}
