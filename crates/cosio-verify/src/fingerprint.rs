use std::fmt;

use crate::{Crc64Hasher, Md5Hasher, Result, VerificationError};

/// Which digest a transfer fingerprints its payload with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintKind {
    /// CRC-64/ECMA, reported in `x-cos-hash-crc64ecma` as a decimal integer.
    #[default]
    Crc64,
    /// MD5, reported as the quoted hex `ETag`.
    Md5,
}

/// A computed payload fingerprint, comparable against what the service reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fingerprint {
    Crc64(u64),
    Md5([u8; 16]),
}

impl Fingerprint {
    pub fn compute(kind: FingerprintKind, data: &[u8]) -> Self {
        match kind {
            FingerprintKind::Crc64 => Self::Crc64(Crc64Hasher::checksum(data)),
            FingerprintKind::Md5 => Self::Md5(Md5Hasher::digest(data)),
        }
    }

    pub fn kind(&self) -> FingerprintKind {
        match self {
            Self::Crc64(_) => FingerprintKind::Crc64,
            Self::Md5(_) => FingerprintKind::Md5,
        }
    }

    /// Compare against the wire form reported by the service.
    ///
    /// CRC64 values are decimal; MD5 values may be quoted and in either case.
    pub fn verify(&self, reported: &str) -> Result<()> {
        let reported = reported.trim().trim_matches('"');
        let matches = match self {
            Self::Crc64(expected) => {
                let actual = reported.parse::<u64>().map_err(|_| VerificationError::Malformed {
                    value:  reported.to_string(),
                    reason: "not a decimal crc64",
                })?;
                actual == *expected
            }
            Self::Md5(expected) => reported.eq_ignore_ascii_case(&hex::encode(expected)),
        };
        if matches {
            Ok(())
        } else {
            Err(VerificationError::Mismatch {
                expected: self.to_string(),
                actual:   reported.to_string(),
            })
        }
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Crc64(value) => write!(f, "{value}"),
            Self::Md5(digest) => write!(f, "{}", hex::encode(digest)),
        }
    }
}
