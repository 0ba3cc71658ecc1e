use std::io;

#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Mismatch {
        expected: String,
        actual:   String,
    },

    #[error("malformed fingerprint {value:?}: {reason}")]
    Malformed {
        value:  String,
        reason: &'static str,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, VerificationError>;
