/*!
 * Core data types for Astroflow.
 *
 * This module defines the identifier type shared by the Astroflow crates.
 */
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unique identifier for Astroflow resources
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id(String);

impl Id {
    /// Create a new ID with a random UUID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an ID from a string
    pub fn from_string<S: AsRef<str>>(s: S) -> Self {
        Self(s.as_ref().to_string())
    }

    /// Get the string representation of the ID
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for Id {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl From<String> for Id {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

/// UTC timestamp used on protocol messages and events
pub type Timestamp = chrono::DateTime<chrono::Utc>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        let id = Id::new();
        assert!(!id.as_str().is_empty());
        assert!(Uuid::parse_str(id.as_str()).is_ok());

        let id = Id::from_string("test-id");
        assert_eq!(id.as_str(), "test-id");

        let id: Id = "another-id".into();
        assert_eq!(id.as_str(), "another-id");

        let id: Id = String::from("string-id").into();
        assert_eq!(id.as_str(), "string-id");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(Id::new(), Id::new());
    }

    #[test]
    fn test_id_display() {
        let id = Id::from_string("test-id");
        assert_eq!(format!("{}", id), "test-id");
    }
}
