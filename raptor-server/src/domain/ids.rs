//! Identifier types for schedule entities.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::DomainError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Parse an identifier, rejecting empty or blank strings.
            pub fn parse(s: &str) -> Result<Self, DomainError> {
                Self::try_from(s.to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                if s.trim().is_empty() {
                    return Err(DomainError::EmptyIdentifier($kind));
                }
                Ok(Self(s))
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> String {
                id.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a stop facility.
    ///
    /// # Examples
    ///
    /// ```
    /// use raptor_server::domain::StopId;
    ///
    /// let id = StopId::parse("8503000").unwrap();
    /// assert_eq!(id.as_str(), "8503000");
    /// assert!(StopId::parse("  ").is_err());
    /// ```
    StopId,
    "stop"
);

string_id!(
    /// Identifier of a transit line.
    LineId,
    "line"
);

string_id!(
    /// Identifier of a trip pattern within its line.
    RouteId,
    "route"
);
