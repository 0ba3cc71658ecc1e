use crc::{CRC_64_XZ, Crc, Digest as CrcDigest};
use digest::Digest;

/// CRC-64/ECMA-182, reflected, as computed by the object service.
static CRC64_ECMA: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

pub trait Hasher: Send {
    fn update(&mut self, data: &[u8]);
    fn finalize(self) -> Vec<u8>;
}

/// Streaming CRC-64/ECMA hasher. `finalize` yields the big-endian bytes of the checksum.
pub struct Crc64Hasher(CrcDigest<'static, u64>);

impl Hasher for Crc64Hasher {
    fn update(&mut self, data: &[u8]) { self.0.update(data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_be_bytes().to_vec() }
}

impl Default for Crc64Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Crc64Hasher {
    pub fn new() -> Self { Self(CRC64_ECMA.digest()) }

    pub fn checksum(data: &[u8]) -> u64 { CRC64_ECMA.checksum(data) }

    /// Finish and return the checksum as an integer, the form the service reports it in.
    pub fn finish_u64(self) -> u64 { self.0.finalize() }
}

pub struct Md5Hasher(md5::Md5);

impl Hasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) { Digest::update(&mut self.0, data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Md5Hasher {
    pub fn new() -> Self { Self(md5::Md5::new()) }

    pub fn digest(data: &[u8]) -> [u8; 16] {
        let mut out = [0u8; 16];
        out.copy_from_slice(&md5::Md5::digest(data));
        out
    }
}

/// Adapter for any RustCrypto [`Digest`].
pub struct DigestHasher<D: Digest + Send>(D);

impl<D: Digest + Send> DigestHasher<D> {
    pub fn new() -> Self { Self(D::new()) }
}

impl<D: Digest + Send> Default for DigestHasher<D> {
    fn default() -> Self {
        Self::new()
    }
}

impl<D: Digest + Send> Hasher for DigestHasher<D> {
    fn update(&mut self, data: &[u8]) { Digest::update(&mut self.0, data); }
    fn finalize(self) -> Vec<u8> { self.0.finalize().to_vec() }
}
