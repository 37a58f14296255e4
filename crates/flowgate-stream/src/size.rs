use flowgate_types::{ByteRange, NetError, ReadWindow};

use crate::reader::BlobReader;

/// Blob size together with the window of it that will be streamed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedSize {
    pub total_size: u64,
    pub window: ReadWindow,
}

/// Apply `range` to a blob of `total_size` bytes.
pub fn resolve_read_window(range: &ByteRange, total_size: u64) -> Result<ReadWindow, NetError> {
    range.compute_bounds(total_size).ok_or(NetError::RangeNotSatisfiable)
}

/// Compute the blob size, resolve the range against it and restrict the
/// reader to the resulting window.
pub async fn resolve_size<R: BlobReader>(
    reader: &mut R,
    range: &ByteRange,
) -> Result<ResolvedSize, NetError> {
    let total_size = reader.calculate_size().await?;
    let window = resolve_read_window(range, total_size)?;
    reader.set_read_range(window.offset, window.length)?;
    Ok(ResolvedSize { total_size, window })
}
