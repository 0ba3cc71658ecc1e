//! Integrity primitives for object transfers.
//!
//! Provides incremental hashing for the two fingerprints the object service
//! reports back: CRC-64/ECMA (the `x-cos-hash-crc64ecma` header) and MD5 (the
//! `ETag` of a part or of a non-multipart object).
//!
//! # Key Features
//!
//! - **Incremental**: digests are computed as bytes stream through
//! - **Header-aware**: [`Fingerprint`] knows how each digest is rendered on the wire
//! - **Extensible**: minimal [`Hasher`] trait allows custom implementations
//!
//! # Example
//!
//! ```
//! use cosio_verify::{Crc64Hasher, VerifiedReader};
//!
//! let data = b"123456789";
//! let mut reader = VerifiedReader::new(&data[..], Crc64Hasher::new());
//! std::io::copy(&mut reader, &mut std::io::sink()).unwrap();
//!
//! reader.finish(&0x995d_c9bb_df19_39fa_u64.to_be_bytes()).unwrap();
//! ```

pub use self::error::{Result, VerificationError};
pub use self::fingerprint::{Fingerprint, FingerprintKind};
pub use self::hasher::{Crc64Hasher, DigestHasher, Hasher, Md5Hasher};
pub use self::reader::VerifiedReader;

mod error;
mod fingerprint;
mod hasher;
mod reader;
