use std::fmt;

use crate::CoreError;

/// A contiguous byte range of a file, addressed by start offset and length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ByteRange {
    pub index: usize,
    pub start: u64,
    pub len: u64,
}

impl ByteRange {
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// One past the last byte.
    pub fn end_exclusive(&self) -> u64 {
        self.start + self.len
    }

    /// Inclusive last byte, `None` for an empty range.
    pub fn last_byte(&self) -> Option<u64> {
        self.len.checked_sub(1).map(|n| self.start + n)
    }

    /// Value for a `Range` request header, `None` for an empty range.
    pub fn header_value(&self) -> Option<String> {
        self.last_byte()
            .map(|last| format!("bytes={}-{}", self.start, last))
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.last_byte() {
            Some(last) => write!(f, "#{} [{}..={}]", self.index, self.start, last),
            None => write!(f, "#{} [empty @ {}]", self.index, self.start),
        }
    }
}

/// Split `[0, total_size)` into exactly `part_count` ranges.
///
/// Every range but the last is `ceil(total_size / part_count)` bytes; the last
/// absorbs whatever remains. When there are more parts than the division
/// fills, trailing ranges are empty and sit at `total_size`.
pub fn plan_parts(total_size: u64, part_count: usize) -> Result<Vec<ByteRange>, CoreError> {
    if part_count == 0 {
        return Err(CoreError::ZeroParts);
    }
    let parts = part_count as u64;
    let part_size = total_size.div_ceil(parts);

    let ranges = (0..parts)
        .map(|i| {
            let start = (i * part_size).min(total_size);
            let end = if i + 1 == parts {
                total_size
            } else {
                ((i + 1) * part_size).min(total_size)
            };
            ByteRange {
                index: i as usize,
                start,
                len: end - start,
            }
        })
        .collect();
    Ok(ranges)
}

/// Split `[0, total_size)` into ranges of at most `chunk_size` bytes.
///
/// An empty file yields a single empty range.
pub fn plan_by_size(total_size: u64, chunk_size: u64) -> Result<Vec<ByteRange>, CoreError> {
    if chunk_size == 0 {
        return Err(CoreError::ZeroChunkSize);
    }
    let parts = total_size.div_ceil(chunk_size).max(1);
    let parts = usize::try_from(parts).map_err(|_| CoreError::ZeroChunkSize)?;
    plan_parts(total_size, parts)
}
