use crate::data::MAX_PART_NUMBER;
use crate::error::{CosError, Result};

/// A contiguous byte range of an object handled by one part task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Segment index (0-based)
    pub index: u32,
    /// Starting byte offset
    pub start: u64,
    /// Ending byte offset (exclusive)
    pub end: u64,
}

impl Segment {
    pub fn len(&self) -> u64 { self.end - self.start }

    pub fn is_empty(&self) -> bool { self.end == self.start }

    /// 1-based multipart part number.
    pub fn part_number(&self) -> u32 { self.index + 1 }

    /// Inclusive `bytes=first-last` form used by `Range` and copy-source-range headers.
    pub fn range_header(&self) -> String { format!("bytes={}-{}", self.start, self.end.saturating_sub(1)) }
}

/// Split `[0, total)` into consecutive segments of `segment_size` bytes; the
/// last one holds the remainder. An empty object has no segments.
pub fn fixed_segments(total: u64, segment_size: u64) -> Result<Vec<Segment>> {
    if segment_size == 0 {
        return Err(CosError::InvalidArgument("segment size must be greater than 0".into()));
    }
    let count = total.div_ceil(segment_size);
    let count = u32::try_from(count)
        .map_err(|_| CosError::InvalidArgument(format!("{count} segments do not fit a part number")))?;

    Ok((0..count)
        .map(|index| {
            let start = u64::from(index) * segment_size;
            Segment { index, start, end: (start + segment_size).min(total) }
        })
        .collect())
}

/// Multipart plan for an object: at most [`MAX_PART_NUMBER`] parts.
pub fn plan_parts(total: u64, part_size: u64) -> Result<Vec<Segment>> {
    let parts = fixed_segments(total, part_size)?;
    if parts.len() > MAX_PART_NUMBER as usize {
        return Err(CosError::InvalidArgument(format!(
            "{total} bytes at part size {part_size} need {} parts, the limit is {MAX_PART_NUMBER}",
            parts.len()
        )));
    }
    Ok(parts)
}
