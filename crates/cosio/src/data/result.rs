use crate::error::CosError;

/// Outcome of an operation as reported to callers and stored on a transfer handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CosResult {
    pub succeeded:     bool,
    /// HTTP status of the deciding exchange, `-1` when none was received.
    pub http_status:   i32,
    pub error_code:    String,
    pub error_message: String,
    pub request_id:    Option<String>,
}

impl CosResult {
    pub fn success(http_status: u16, request_id: Option<String>) -> Self {
        Self {
            succeeded: true,
            http_status: i32::from(http_status),
            request_id,
            ..Self::default()
        }
    }

    pub fn failure(error: &CosError) -> Self {
        Self {
            succeeded:     false,
            http_status:   error.http_status(),
            error_code:    error.error_code().to_string(),
            error_message: error.to_string(),
            request_id:    error.request_id().map(str::to_string),
        }
    }
}

impl From<&CosError> for CosResult {
    fn from(error: &CosError) -> Self { Self::failure(error) }
}
