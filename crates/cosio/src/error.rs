//! Error types for cosio.

use std::fmt;
use std::io;

use thiserror::Error;

/// A failure reported by the object service, parsed from the response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceError {
    pub status:     u16,
    pub code:       String,
    pub message:    String,
    pub request_id: Option<String>,
    pub trace_id:   Option<String>,
    pub resource:   Option<String>,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if !self.code.is_empty() {
            write!(f, " {}", self.code)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(id) = &self.request_id {
            write!(f, " (request id {id})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum CosError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// 4xx, or a success status whose body is an error document with a request id.
    #[error("request rejected: {0}")]
    Client(ServiceError),

    #[error("service failure: {0}")]
    Transient(ServiceError),

    #[error("transport failure: {message}")]
    Transport { message: String },

    #[error("checksum mismatch on {context}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        context:  String,
        expected: String,
        actual:   String,
    },

    #[error("length mismatch on {context}: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        context:  String,
        expected: u64,
        actual:   u64,
    },

    #[error("transfer canceled")]
    Canceled,

    #[error("malformed response: {0}")]
    Decode(String),

    #[error("part task panicked: {0}")]
    TaskPanicked(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, CosError>;

impl CosError {
    /// Whether another attempt of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CosError::Transient(_)
                | CosError::Transport { .. }
                | CosError::ChecksumMismatch { .. }
                | CosError::LengthMismatch { .. }
                | CosError::Decode(_)
        )
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, CosError::ChecksumMismatch { .. } | CosError::LengthMismatch { .. })
    }

    pub fn is_canceled(&self) -> bool { matches!(self, CosError::Canceled) }

    pub fn service_error(&self) -> Option<&ServiceError> {
        match self {
            CosError::Client(e) | CosError::Transient(e) => Some(e),
            _ => None,
        }
    }

    /// HTTP status of the failed exchange, `-1` when none was received.
    pub fn http_status(&self) -> i32 {
        self.service_error().map_or(-1, |e| i32::from(e.status))
    }

    pub fn request_id(&self) -> Option<&str> {
        self.service_error().and_then(|e| e.request_id.as_deref())
    }

    /// The service error code, or a stable local code for client-side failures.
    pub fn error_code(&self) -> &str {
        match self {
            CosError::Client(e) | CosError::Transient(e) => &e.code,
            CosError::Configuration(_) => "ConfigurationError",
            CosError::InvalidArgument(_) => "InvalidArgument",
            CosError::Transport { .. } => "TransportError",
            CosError::ChecksumMismatch { .. } | CosError::LengthMismatch { .. } => "IntegrityError",
            CosError::Canceled => "Canceled",
            CosError::Decode(_) => "MalformedResponse",
            CosError::TaskPanicked(_) => "TaskPanicked",
            CosError::Io(_) => "IoError",
        }
    }
}

impl From<figment::Error> for CosError {
    fn from(e: figment::Error) -> Self { CosError::Configuration(e.to_string()) }
}

impl From<quick_xml::DeError> for CosError {
    fn from(e: quick_xml::DeError) -> Self { CosError::Decode(e.to_string()) }
}

impl From<cosio_verify::VerificationError> for CosError {
    fn from(e: cosio_verify::VerificationError) -> Self {
        match e {
            cosio_verify::VerificationError::Mismatch { expected, actual } => CosError::ChecksumMismatch {
                context: "payload".to_string(),
                expected,
                actual,
            },
            cosio_verify::VerificationError::Io(e) => CosError::Io(e),
            other => CosError::Decode(other.to_string()),
        }
    }
}
