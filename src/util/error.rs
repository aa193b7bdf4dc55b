//! Error types for geometry set and attribute operations.

use thiserror::Error;

use crate::geom::GeometryComponentType;

/// Main error type for geometry operations.
///
/// Lookups that simply find nothing return `Option`/`bool` instead; this type
/// covers broken preconditions and failed I/O around the configuration files.
#[derive(Error, Debug)]
pub enum Error {
    /// A component of this type is already installed in the set
    #[error("Geometry set already holds a {0} component")]
    SlotOccupied(GeometryComponentType),

    /// Attribute not found by name
    #[error("Attribute not found: {0}")]
    AttributeNotFound(String),

    /// Attribute already exists
    #[error("Attribute already exists: {0}")]
    AttributeExists(String),

    /// Builtin attribute cannot be created by the caller
    #[error("Attribute cannot be created: {0}")]
    NotCreatable(String),

    /// Builtin attribute cannot be removed
    #[error("Attribute cannot be removed: {0}")]
    NotDeletable(String),

    /// Domain is not supported by the component
    #[error("Domain {domain} is not supported on {component}")]
    DomainUnsupported { domain: String, component: String },

    /// Value type does not match the stored attribute type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Buffer length does not match the domain size
    #[error("Size mismatch: expected {expected} elements, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Per-spline custom layers disagree with each other
    #[error("Custom attribute layers differ between splines: {0}")]
    LayerMismatch(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Settings file could not be parsed or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create a type mismatch error.
    pub fn mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        Self::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }
}

/// Result type alias for geometry operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::SlotOccupied(GeometryComponentType::Mesh);
        assert!(e.to_string().contains("Mesh"));

        let e = Error::SizeMismatch { expected: 5, actual: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));

        let e = Error::mismatch("Float", "Int32");
        assert!(e.to_string().contains("Float"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
