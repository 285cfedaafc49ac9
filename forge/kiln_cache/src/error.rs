//! Error types for generation.
//!
//! A generation failure always carries the recipe's original cause; the
//! cache never masks it behind a generic error. `GenError` is `Clone`
//! because one producer failure broadcasts to every waiter.

use kiln_emit::EmitError;
use std::fmt;

/// Result of a generation request.
pub type GenResult<T> = Result<T, GenError>;

/// Error raised while generating a unit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GenError {
    /// The recipe (or the emitter it drove) failed while producing.
    Production(EmitError),
    /// Name reservation failed before the recipe ran.
    Naming { message: String },
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenError::Production(err) => write!(f, "unit production failed: {err}"),
            GenError::Naming { message } => write!(f, "name reservation failed: {message}"),
        }
    }
}

impl std::error::Error for GenError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenError::Production(err) => Some(err),
            GenError::Naming { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_error_exposes_original_cause() {
        let cause = EmitError::recipe("schema mismatch");
        let err = GenError::Production(cause.clone());
        assert!(err.to_string().contains("schema mismatch"));
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source, Some(cause.to_string()));
    }
}
