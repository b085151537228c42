/*!
 * Error types for the Astroflow core crate.
 */
use thiserror::Error;

/// Error type for Astroflow core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Logging setup error
    #[error("Logging error: {0}")]
    Logging(String),

    /// Event dispatch error
    #[error("Event error: {0}")]
    Event(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Other error
    #[error("Other error: {0}")]
    Other(String),
}

/// Result type for Astroflow core operations
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a new configuration error
    pub fn config<S: AsRef<str>>(msg: S) -> Self {
        Error::Config(msg.as_ref().to_string())
    }

    /// Create a new logging error
    pub fn logging<S: AsRef<str>>(msg: S) -> Self {
        Error::Logging(msg.as_ref().to_string())
    }

    /// Create a new event error
    pub fn event<S: AsRef<str>>(msg: S) -> Self {
        Error::Event(msg.as_ref().to_string())
    }

    /// Create a new serialization error
    pub fn serialization<S: AsRef<str>>(msg: S) -> Self {
        Error::Serialization(msg.as_ref().to_string())
    }

    /// Create a new error of any other kind
    pub fn other<S: AsRef<str>>(msg: S) -> Self {
        Error::Other(msg.as_ref().to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::config("bad"), Error::Config(m) if m == "bad"));
        assert!(matches!(Error::event("x"), Error::Event(_)));
        assert_eq!(Error::other("boom").to_string(), "Other error: boom");
    }

    #[test]
    fn test_from_json_error() {
        let err = serde_json::from_str::<u32>("not a number").unwrap_err();
        let err: Error = err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
