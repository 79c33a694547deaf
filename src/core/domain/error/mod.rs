use std::path::PathBuf;
use thiserror::Error;

/// The main error type for convergence operations.
///
/// Every variant aborts the convergence invocation that produced it. Partial
/// progress (some actions applied before a failure) is not an error; it is
/// reported through [`crate::Outcome::Incomplete`].
#[derive(Error, Debug)]
pub enum ProxmoxError {
    /// The management endpoint could not be reached or rejected the call.
    ///
    /// Covers a missing `pvesh` binary, non-zero exit status, timeouts,
    /// HTTP error statuses and connection failures. An id collision on create
    /// (two callers handed the same next id) also lands here.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The endpoint answered with a body that is not valid JSON where
    /// structured data was required.
    #[error("Unstructured response from '{path}': {body}")]
    UnstructuredResponse { path: String, body: String },

    /// A resource that must exist for the operation was not found.
    ///
    /// # Fields
    /// * `kind` - What was being looked up (e.g. `clone source`)
    /// * `id` - The identifier that was looked up
    #[error("{kind} '{id}' not found")]
    NotFound { kind: String, id: String },

    /// A downloaded image did not match its declared SHA-256 digest.
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    /// An OS type alias or hypervisor code that no catalog family knows.
    #[error("Unknown OS type: {0}")]
    UnknownOsType(String),

    /// Represents authentication failures against the HTTP API
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// Represents validation failures with detailed context
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Local filesystem failure while staging template images.
    #[error("I/O error while {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A resource manifest could not be read or parsed.
    #[error("Manifest error: {0}")]
    Manifest(String),
}

impl ProxmoxError {
    pub(crate) fn not_found(kind: impl Into<String>, id: impl ToString) -> Self {
        ProxmoxError::NotFound {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        ProxmoxError::Io {
            context: context.into(),
            source,
        }
    }
}

/// Specialized error type for validation failures.
///
/// This enum provides detailed context about why a validation
/// failed, including field-specific errors and format violations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Represents a validation failure for a specific field
    ///
    /// # Fields
    /// * `field` - The name of the field that failed validation
    /// * `message` - A detailed message about why validation failed
    #[error("Field '{field}' validation failed: {message}")]
    Field { field: String, message: String },

    /// Represents format/syntax validation failures
    #[error("Format error: {0}")]
    Format(String),

    /// Represents violations of domain constraints
    #[error("Domain constraint violation: {0}")]
    ConstraintViolation(String),
}

impl ValidationError {
    pub(crate) fn field(field: &str, message: impl Into<String>) -> Self {
        ValidationError::Field {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Type alias for Results that may fail with a ProxmoxError
pub type ProxmoxResult<T> = Result<T, ProxmoxError>;
