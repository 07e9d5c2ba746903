//! Domain error types.
//!
//! These errors represent validation failures of individual values. Schedule
//! and configuration consistency errors live with the code that checks them.

/// Domain-level errors for value validation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    /// An identifier was empty or blank
    #[error("{0} identifier must not be empty")]
    EmptyIdentifier(&'static str),

    /// A mode name was empty or blank
    #[error("mode name must not be empty")]
    EmptyMode,

    /// A coordinate component was NaN or infinite
    #[error("coordinate ({0}, {1}) is not finite")]
    NonFiniteCoordinate(f64, f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = DomainError::EmptyIdentifier("stop");
        assert_eq!(err.to_string(), "stop identifier must not be empty");

        let err = DomainError::EmptyMode;
        assert_eq!(err.to_string(), "mode name must not be empty");

        let err = DomainError::NonFiniteCoordinate(1.0, f64::NAN);
        assert_eq!(err.to_string(), "coordinate (1, NaN) is not finite");
    }
}
