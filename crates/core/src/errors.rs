use std::path::PathBuf;

/// Result type alias for CAS operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for CAS operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ticket is unknown, expired, or otherwise unusable
    #[error("ticket '{ticket_id}' is invalid: {message}")]
    InvalidTicket { ticket_id: String, message: String },

    /// Ticket exists but is of a different kind than requested
    #[error("ticket '{ticket_id}' is of type {actual} when {expected} was expected")]
    TicketType {
        ticket_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// Ticket state does not permit the requested transition
    #[error("ticket '{ticket_id}' cannot be used: {message}")]
    TicketState { ticket_id: String, message: String },

    /// Ticket was presented for a service it was not issued to
    #[error("ticket '{ticket_id}' does not match service '{service}'")]
    ServiceMismatch { ticket_id: String, service: String },

    /// Service is not registered or access is disabled
    #[error("service '{service}' is not authorized: {message}")]
    UnauthorizedService { service: String, message: String },

    /// Service does not participate in single sign-on
    #[error("service '{service}' does not allow single sign-on sessions")]
    UnauthorizedSso { service: String },

    /// Principal does not satisfy the service access requirements
    #[error("principal '{principal}' is denied access: {message}")]
    PrincipalAccess { principal: String, message: String },

    /// Authentication policy was not satisfied
    #[error("{}", format_authentication_error(.message, .failures))]
    Authentication {
        message: String,
        failures: Vec<(String, String)>,
    },

    /// Surrogate (impersonation) request was refused
    #[error("principal '{principal}' is not authorized to authenticate as '{surrogate}'")]
    SurrogateDenied { surrogate: String, principal: String },

    /// Login attempts exceeded the configured failure rate
    #[error("authentication throttled for '{key}': {message}")]
    Throttled { key: String, message: String },

    /// Ticket storage backend errors
    #[error("ticket storage '{backend}' failed: {message}")]
    Storage { backend: String, message: String },

    /// Configuration errors
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// File system operations
    #[error("file system {operation} operation failed for '{path}': {source}")]
    FileSystem {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: serde_json::Error,
    },

    /// Cryptographic validation errors
    #[error("security validation error: {message}")]
    Security { message: String },
}

fn format_authentication_error(message: &str, failures: &[(String, String)]) -> String {
    if failures.is_empty() {
        return format!("authentication failed: {message}");
    }
    let details = failures
        .iter()
        .map(|(handler, reason)| format!("{handler}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ");
    format!("authentication failed: {message} [{details}]")
}

// Conversion implementations
impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        Error::FileSystem {
            path: PathBuf::new(),
            operation: "unknown".to_string(),
            source: error,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::Json {
            message: error.to_string(),
            source: error,
        }
    }
}

// Helper methods for creating errors with context
impl Error {
    /// Create an invalid ticket error
    #[must_use]
    pub fn invalid_ticket(ticket_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidTicket {
            ticket_id: ticket_id.into(),
            message: message.into(),
        }
    }

    /// Create a ticket state error
    #[must_use]
    pub fn ticket_state(ticket_id: impl Into<String>, message: impl Into<String>) -> Self {
        Error::TicketState {
            ticket_id: ticket_id.into(),
            message: message.into(),
        }
    }

    /// Create an unauthorized service error
    #[must_use]
    pub fn unauthorized_service(service: impl Into<String>, message: impl Into<String>) -> Self {
        Error::UnauthorizedService {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create a principal access error
    #[must_use]
    pub fn principal_access(principal: impl Into<String>, message: impl Into<String>) -> Self {
        Error::PrincipalAccess {
            principal: principal.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error without handler failures
    #[must_use]
    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
            failures: Vec::new(),
        }
    }

    /// Create an authentication error carrying handler failures
    #[must_use]
    pub fn authentication_with_failures(
        message: impl Into<String>,
        failures: Vec<(String, String)>,
    ) -> Self {
        Error::Authentication {
            message: message.into(),
            failures,
        }
    }

    /// Create a throttling error
    #[must_use]
    pub fn throttled(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Throttled {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create a storage error
    #[must_use]
    pub fn storage(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Storage {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    /// Create a file system error with context
    #[must_use]
    pub fn file_system(
        path: impl Into<PathBuf>,
        operation: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        Error::FileSystem {
            path: path.into(),
            operation: operation.into(),
            source,
        }
    }

    /// Create a security validation error
    #[must_use]
    pub fn security(message: impl Into<String>) -> Self {
        Error::Security {
            message: message.into(),
        }
    }
}

// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to a Result
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a lazy message
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T> for std::result::Result<T, E>
where
    E: Into<Error>,
{
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", message.into(), base_error),
            }
        })
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| {
            let base_error = e.into();
            Error::Configuration {
                message: format!("{}: {}", f(), base_error),
            }
        })
    }
}
