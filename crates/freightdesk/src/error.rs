//! Error types for freightdesk.
//!
//! Every layer below the controller returns these errors unmodified; only the
//! controller turns them into user-facing notices.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::kind::MasterKind;

/// The main error type for freightdesk operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Validation Errors ===
    /// One or more form fields failed local validation.
    #[error("validation failed: {}", join_field_errors(.errors))]
    Validation {
        /// Every field that failed, in form order.
        errors: Vec<FieldError>,
    },

    // === Backend Errors ===
    /// The record targeted by an update or delete does not exist.
    #[error("no {} with id '{id}' in {}", .kind.singular(), .kind.collection())]
    NotFound {
        /// Kind of the targeted collection.
        kind: MasterKind,
        /// Identifier that was not found.
        id: String,
    },

    /// The HTTP request to the remote backend failed.
    #[error("request to backend failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote backend answered with an error status.
    #[error("backend returned {status}: {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Message reported by the backend.
        message: String,
    },

    /// A row returned by the backend did not have the expected shape.
    #[error("malformed {} record: {message}", .kind.singular())]
    MalformedRecord {
        /// Kind of the collection the row came from.
        kind: MasterKind,
        /// What was wrong with the row.
        message: String,
    },

    // === Local Storage Errors ===
    /// Failed to open or create the local database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A local database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// The local database schema could not be brought up to date.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Controller Errors ===
    /// A mutation is already in flight; the view is locked until it settles.
    #[error("another request is still in flight")]
    Busy,

    /// The requested action is not allowed in the current view.
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        /// The action that was attempted.
        action: &'static str,
        /// The view the controller was in.
        state: &'static str,
    },

    /// A record or payload of one kind was handed to an operation on another.
    #[error("expected a {} record, got a {} record", .expected.singular(), .found.singular())]
    KindMismatch {
        /// Kind the operation was addressed to.
        expected: MasterKind,
        /// Kind of the record that was supplied.
        found: MasterKind,
    },

    /// A string did not name any master kind.
    #[error("unknown master kind: {0}")]
    UnknownKind(String),

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for freightdesk operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

/// Why a single form field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    /// A required field was left empty.
    Required,
    /// A number field did not parse as a number.
    NotANumber,
    /// An email field did not look like an address.
    InvalidEmail,
    /// A select field held a value that is not among its options.
    UnknownOption,
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Required => write!(f, "is required"),
            Self::NotANumber => write!(f, "must be a number"),
            Self::InvalidEmail => write!(f, "must be an email address"),
            Self::UnknownOption => write!(f, "is not one of the available options"),
        }
    }
}

/// A validation failure attached to one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field name (the record key).
    pub field: String,
    /// Field label as shown on the form.
    pub label: String,
    /// What was wrong.
    pub problem: FieldProblem,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.label, self.problem)
    }
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create a not-found error for `id` in the collection of `kind`.
    #[must_use]
    pub fn not_found(kind: MasterKind, id: impl Into<String>) -> Self {
        Self::NotFound {
            kind,
            id: id.into(),
        }
    }

    /// Create a backend error from a status code and message.
    #[must_use]
    pub fn backend(status: u16, message: impl Into<String>) -> Self {
        Self::Backend {
            status,
            message: message.into(),
        }
    }

    /// Create a malformed-record error.
    #[must_use]
    pub fn malformed(kind: MasterKind, message: impl Into<String>) -> Self {
        Self::MalformedRecord {
            kind,
            message: message.into(),
        }
    }

    /// Check if this error means the targeted record no longer exists.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error was raised by local form validation.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error came from talking to a backend.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Http(_)
                | Self::Backend { .. }
                | Self::MalformedRecord { .. }
                | Self::DatabaseOpen { .. }
                | Self::DatabaseQuery(_)
                | Self::Json(_)
        )
    }

    /// The field errors carried by a validation error, empty otherwise.
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::Validation { errors } => errors,
            _ => &[],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_error(field: &str, label: &str, problem: FieldProblem) -> FieldError {
        FieldError {
            field: field.to_string(),
            label: label.to_string(),
            problem,
        }
    }

    #[test]
    fn test_not_found_display() {
        let err = Error::not_found(MasterKind::States, "abc");
        assert_eq!(
            err.to_string(),
            "no state with id 'abc' in master_states"
        );
        assert!(err.is_not_found());
        assert!(!err.is_transport());
    }

    #[test]
    fn test_validation_display_lists_every_field() {
        let err = Error::Validation {
            errors: vec![
                field_error("state_id", "State", FieldProblem::Required),
                field_error("name", "City Name", FieldProblem::Required),
            ],
        };
        assert_eq!(
            err.to_string(),
            "validation failed: State is required; City Name is required"
        );
        assert!(err.is_validation());
        assert_eq!(err.field_errors().len(), 2);
    }

    #[test]
    fn test_field_errors_empty_for_other_variants() {
        assert!(Error::Busy.field_errors().is_empty());
    }

    #[test]
    fn test_backend_error_is_transport() {
        let err = Error::backend(409, "duplicate key value");
        assert_eq!(err.to_string(), "backend returned 409: duplicate key value");
        assert!(err.is_transport());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_kind_mismatch_display() {
        let err = Error::KindMismatch {
            expected: MasterKind::Cities,
            found: MasterKind::Countries,
        };
        assert_eq!(
            err.to_string(),
            "expected a city record, got a country record"
        );
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = Error::InvalidTransition {
            action: "save",
            state: "listing",
        };
        assert_eq!(err.to_string(), "cannot save while listing");
    }

    #[test]
    fn test_field_problem_display() {
        assert_eq!(FieldProblem::Required.to_string(), "is required");
        assert_eq!(FieldProblem::NotANumber.to_string(), "must be a number");
        assert_eq!(
            FieldProblem::InvalidEmail.to_string(),
            "must be an email address"
        );
        assert!(FieldProblem::UnknownOption.to_string().contains("options"));
    }

    #[test]
    fn test_malformed_record_display() {
        let err = Error::malformed(MasterKind::Transporters, "missing id");
        assert_eq!(err.to_string(), "malformed transporter record: missing id");
        assert!(err.is_transport());
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
            assert!(err.is_transport());
        }
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_internal_error() {
        let err = Error::internal("lock poisoned");
        assert_eq!(err.to_string(), "internal error: lock poisoned");
    }

    #[test]
    fn test_directory_create_error_display() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = Error::DirectoryCreate {
            path: PathBuf::from("/root/forbidden"),
            source: io_err,
        };
        assert!(err.to_string().contains("/root/forbidden"));
    }
}
