//! Error types for the serialization engine.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for usd-io operations.
///
/// Expected absence (an attribute with no authored value, a null primvar, a
/// member flagged non-serialized) is never reported through this type; those
/// paths return `Ok(..)` with a boolean outcome instead.
#[derive(Error, Debug)]
pub enum Error {
    /// Registration-time misconfiguration (missing native op, bad element size)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The stored or supplied data does not match the declared schema
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// Engine invariant violated; indicates a bug, not bad input
    #[error("Internal consistency violation: {0}")]
    InternalConsistency(String),

    /// Operation not supported for this value shape
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Prim not found by path
    #[error("Prim not found: {0}")]
    PrimNotFound(String),

    /// Attribute or relationship not found on a prim
    #[error("Property not found: {0}")]
    PropertyNotFound(String),

    /// Wire value does not hold the requested type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Invalid scene setting (frame rate, meters per unit, ...)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stage (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a schema mismatch error.
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::SchemaMismatch(msg.into())
    }

    /// Create a type mismatch error.
    pub fn type_mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch { expected: expected.into(), actual: actual.into() }
    }
}

/// Result type alias for usd-io operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::schema("GetOnlyTarget: expected one target, found 2");
        assert!(e.to_string().contains("Schema mismatch"));
        assert!(e.to_string().contains("2"));

        let e = Error::type_mismatch("float", "token");
        assert!(e.to_string().contains("float"));
        assert!(e.to_string().contains("token"));
    }

    #[test]
    fn test_error_constructors() {
        assert!(matches!(Error::config("no native op"), Error::Configuration(_)));
        assert!(matches!(Error::schema("two targets"), Error::SchemaMismatch(_)));
        assert!(matches!(
            Error::type_mismatch("float", "token"),
            Error::TypeMismatch { ref expected, .. } if expected == "float"
        ));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
