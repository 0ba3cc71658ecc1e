use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use cosio_verify::{Crc64Hasher, Fingerprint, FingerprintKind, Hasher, Md5Hasher, VerifiedReader};

use crate::error::{CosError, Result};

/// Fingerprint `length` bytes of a local file starting at `offset`.
///
/// Hashing runs on the blocking pool; a file shorter than the range is a
/// length mismatch.
pub async fn file_fingerprint(path: &Path, offset: u64, length: u64, kind: FingerprintKind) -> Result<Fingerprint> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || fingerprint_range(&path, offset, length, kind))
        .await
        .map_err(|e| CosError::TaskPanicked(e.to_string()))?
}

fn fingerprint_range(path: &Path, offset: u64, length: u64, kind: FingerprintKind) -> Result<Fingerprint> {
    let mut file = File::open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    let range = file.take(length);

    let (fingerprint, consumed) = match kind {
        FingerprintKind::Crc64 => {
            let (digest, consumed) = drain(range, Crc64Hasher::new())?;
            let mut value = [0u8; 8];
            value.copy_from_slice(&digest);
            (Fingerprint::Crc64(u64::from_be_bytes(value)), consumed)
        }
        FingerprintKind::Md5 => {
            let (digest, consumed) = drain(range, Md5Hasher::new())?;
            let mut value = [0u8; 16];
            value.copy_from_slice(&digest);
            (Fingerprint::Md5(value), consumed)
        }
    };

    if consumed != length {
        return Err(CosError::LengthMismatch {
            context:  format!("{} at offset {offset}", path.display()),
            expected: length,
            actual:   consumed,
        });
    }
    Ok(fingerprint)
}

fn drain<R: Read, H: Hasher>(reader: R, hasher: H) -> Result<(Vec<u8>, u64)> {
    let mut reader = VerifiedReader::new(reader, hasher);
    std::io::copy(&mut reader, &mut std::io::sink())?;
    let consumed = reader.consumed();
    Ok((reader.digest()?, consumed))
}
