use std::io::{self, Read};

use crate::{Hasher, Result, VerificationError};

/// Streaming reader that hashes data as it passes through.
/// Wraps any `Read` source so a file can be verified in one pass.
pub struct VerifiedReader<R, H> {
    reader: R,
    hasher: H,
    consumed: u64,
}

impl<R, H> VerifiedReader<R, H> {
    pub fn new(reader: R, hasher: H) -> Self {
        Self { reader, hasher, consumed: 0 }
    }

    /// Bytes hashed so far.
    pub fn consumed(&self) -> u64 { self.consumed }
}

impl<R: Read, H: Hasher> Read for VerifiedReader<R, H> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.reader.read(buf)?;
        if n > 0 {
            self.hasher.update(&buf[..n]);
            self.consumed += n as u64;
        }
        Ok(n)
    }
}

impl<R: Read, H: Hasher> VerifiedReader<R, H> {
    /// Drain the remaining input and return the digest.
    pub fn digest(mut self) -> Result<Vec<u8>> {
        io::copy(&mut self, &mut io::sink())?;
        Ok(self.hasher.finalize())
    }

    /// Finalize verification against an expected digest.
    pub fn finish(self, expected: &[u8]) -> Result<()> {
        let actual = self.digest()?;
        if actual == expected {
            Ok(())
        } else {
            Err(VerificationError::Mismatch {
                expected: hex::encode(expected),
                actual:   hex::encode(actual),
            })
        }
    }
}
