//! Error taxonomy of the driver.

use thiserror::Error;

pub const SQLSTATE_GENERIC: &str = "HY000";
/// Invalid datetime format / unsupported time unit.
pub const SQLSTATE_DATETIME: &str = "22007";
pub const SQLSTATE_UNDEFINED_COLUMN: &str = "42703";

pub type Result<T> = std::result::Result<T, DriverError>;

/// Structured server diagnostic, decoded from the error payload of a failed
/// call.
#[derive(Debug, Clone)]
pub struct ServerDiagnostic {
    pub sqlstate: String,
    pub primary_message: String,
    pub customer_detail: String,
    pub customer_hint: String,
    pub system_detail: String,
    pub query_id: Option<String>,
    /// Short rendering, honoring the customer-detail session option.
    pub reason: String,
    /// Rendering with DETAIL/HINT/QUERY sections, always.
    pub customer_message: String,
    /// Customer rendering plus SYSTEM-DETAIL.
    pub system_message: String,
}

#[derive(Debug, Error)]
pub enum DriverError {
    /// Failure before a query id was known; always surfaced.
    #[error("Failed to execute query: {message}\nQUERY: {sql}")]
    Submission { message: String, sql: String },

    /// Grpc CANCELLED termination. Expected only at the sites that store a
    /// query status first; expected cancellations are absorbed locally and
    /// never reach callers.
    #[error("stream cancelled by the server (expected: {expected})")]
    StreamCancelled { expected: bool },

    /// Stream ended normally without reaching a terminal state.
    #[error("stream ended before reaching a terminal state")]
    TransientStreamEnd,

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("{message}")]
    Timeout {
        message: String,
        #[source]
        source: Option<Box<DriverError>>,
    },

    #[error("{}", .0.reason)]
    Server(Box<ServerDiagnostic>),

    #[error("unsupported: {message}")]
    Unsupported {
        message: String,
        sqlstate: &'static str,
    },

    #[error("{0}")]
    Range(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error(transparent)]
    Transport(#[from] tonic::Status),
}

impl DriverError {
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
            sqlstate: SQLSTATE_GENERIC,
        }
    }

    /// Unsupported with the datetime sqlstate, for unit-related mismatches.
    pub fn unsupported_datetime(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
            sqlstate: SQLSTATE_DATETIME,
        }
    }

    pub fn column_not_found(name: impl Into<String>) -> Self {
        Self::NotFound {
            what: format!("column {}", name.into()),
        }
    }

    pub fn sqlstate(&self) -> &str {
        match self {
            DriverError::Server(diag) => &diag.sqlstate,
            DriverError::Unsupported { sqlstate, .. } => sqlstate,
            DriverError::NotFound { .. } => SQLSTATE_UNDEFINED_COLUMN,
            _ => SQLSTATE_GENERIC,
        }
    }

    /// True for cancellations the call site may absorb.
    pub fn is_expected_cancel(&self) -> bool {
        matches!(self, DriverError::StreamCancelled { expected: true })
    }
}

/// True when the transport status is a grpc CANCELLED.
pub fn is_cancelled(status: &tonic::Status) -> bool {
    status.code() == tonic::Code::Cancelled
}
