use std::collections::BTreeMap;

/// A live multipart session on the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub bucket:     String,
    pub key:        String,
    pub upload_id:  String,
    pub part_size:  u64,
    pub total_size: u64,
}

/// A part the service has accepted and the client has verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartRecord {
    pub part_number: u32,
    pub etag:        String,
    pub size:        u64,
    /// Offset of the part's first byte in the source.
    pub offset:      u64,
}

/// Sum of part sizes; equals the object size exactly when the part list is complete.
pub fn total_size(records: &[PartRecord]) -> u64 { records.iter().map(|r| r.size).sum() }

/// Parts of a resumed session that were verified against local data,
/// keyed by part number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeTable {
    etags: BTreeMap<u32, String>,
}

impl ResumeTable {
    pub fn new() -> Self { Self::default() }

    pub fn insert(&mut self, part_number: u32, etag: impl Into<String>) { self.etags.insert(part_number, etag.into()); }

    pub fn get(&self, part_number: u32) -> Option<&str> { self.etags.get(&part_number).map(String::as_str) }

    pub fn contains(&self, part_number: u32) -> bool { self.etags.contains_key(&part_number) }

    pub fn len(&self) -> usize { self.etags.len() }

    pub fn is_empty(&self) -> bool { self.etags.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> { self.etags.iter().map(|(n, e)| (*n, e.as_str())) }
}
