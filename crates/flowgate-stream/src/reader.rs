use std::future::Future;
use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use flowgate_types::NetError;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// A source of blob content for a read pump.
///
/// Call order is fixed: `calculate_size`, then `set_read_range`, then any
/// number of `read` calls. `read` returning `Ok(0)` means the range is exhausted.
pub trait BlobReader: Send {
    /// Error the reader is already known to be in, before any I/O.
    fn net_error(&self) -> Option<NetError> {
        None
    }

    /// Total size of the blob in bytes.
    fn calculate_size(&mut self) -> impl Future<Output = Result<u64, NetError>> + Send;

    fn has_side_data(&self) -> bool {
        false
    }

    /// Auxiliary metadata stored alongside the blob, if any.
    fn read_side_data(&mut self) -> impl Future<Output = Result<Option<Bytes>, NetError>> + Send {
        async { Ok(None) }
    }

    /// Restrict subsequent reads to `length` bytes starting at `offset`.
    fn set_read_range(&mut self, offset: u64, length: u64) -> Result<(), NetError>;

    /// Read up to `buf.len()` bytes of the range into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = Result<usize, NetError>> + Send;
}

// ── In-memory ───────────────────────────────────────────────────────────

/// Reader over bytes already in memory. Every read completes without suspending.
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobReader {
    data: Bytes,
    side_data: Option<Bytes>,
    error: Option<NetError>,
    position: usize,
    end: usize,
}

impl MemoryBlobReader {
    pub fn new(data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let end = data.len();
        Self { data, side_data: None, error: None, position: 0, end }
    }

    pub fn with_side_data(mut self, side_data: impl Into<Bytes>) -> Self {
        self.side_data = Some(side_data.into());
        self
    }

    /// A reader that fails before any I/O with `error`.
    pub fn failed(error: NetError) -> Self {
        Self { error: Some(error), ..Self::default() }
    }
}

impl BlobReader for MemoryBlobReader {
    fn net_error(&self) -> Option<NetError> {
        self.error
    }

    async fn calculate_size(&mut self) -> Result<u64, NetError> {
        Ok(self.data.len() as u64)
    }

    fn has_side_data(&self) -> bool {
        self.side_data.is_some()
    }

    async fn read_side_data(&mut self) -> Result<Option<Bytes>, NetError> {
        Ok(self.side_data.clone())
    }

    fn set_read_range(&mut self, offset: u64, length: u64) -> Result<(), NetError> {
        let start = usize::try_from(offset).map_err(|_| NetError::RangeNotSatisfiable)?;
        let end = offset
            .checked_add(length)
            .and_then(|end| usize::try_from(end).ok())
            .filter(|end| *end <= self.data.len())
            .ok_or(NetError::RangeNotSatisfiable)?;
        self.position = start;
        self.end = end;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let n = buf.len().min(self.end.saturating_sub(self.position));
        buf[..n].copy_from_slice(&self.data[self.position..self.position + n]);
        self.position += n;
        Ok(n)
    }
}

// ── File-backed ─────────────────────────────────────────────────────────

/// Reader over a file on disk. The file is opened when the size is computed
/// and positioned lazily on the first read.
#[derive(Debug)]
pub struct FileBlobReader {
    path: PathBuf,
    file: Option<File>,
    offset: u64,
    remaining: u64,
    positioned: bool,
}

impl FileBlobReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), file: None, offset: 0, remaining: 0, positioned: false }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlobReader for FileBlobReader {
    async fn calculate_size(&mut self) -> Result<u64, NetError> {
        let file = File::open(&self.path).await?;
        let size = file.metadata().await?.len();
        self.file = Some(file);
        self.remaining = size;
        Ok(size)
    }

    fn set_read_range(&mut self, offset: u64, length: u64) -> Result<(), NetError> {
        if self.file.is_none() {
            return Err(NetError::Failed);
        }
        self.offset = offset;
        self.remaining = length;
        self.positioned = false;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, NetError> {
        let file = self.file.as_mut().ok_or(NetError::Failed)?;
        if self.remaining == 0 {
            return Ok(0);
        }
        if !self.positioned {
            file.seek(SeekFrom::Start(self.offset)).await?;
            self.positioned = true;
        }
        let max = usize::try_from(self.remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = file.read(&mut buf[..max]).await?;
        self.remaining -= n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_reader_honours_range() {
        let mut r = MemoryBlobReader::new(&b"0123456789"[..]);
        assert_eq!(r.calculate_size().await, Ok(10));
        r.set_read_range(2, 5).unwrap();

        let mut buf = [0u8; 3];
        assert_eq!(r.read(&mut buf).await, Ok(3));
        assert_eq!(&buf, b"234");
        assert_eq!(r.read(&mut buf).await, Ok(2));
        assert_eq!(&buf[..2], b"56");
        assert_eq!(r.read(&mut buf).await, Ok(0));
    }

    #[tokio::test]
    async fn memory_reader_rejects_range_past_end() {
        let mut r = MemoryBlobReader::new(&b"abc"[..]);
        assert_eq!(r.set_read_range(2, 5), Err(NetError::RangeNotSatisfiable));
    }

    #[tokio::test]
    async fn side_data_is_optional() {
        let mut plain = MemoryBlobReader::new(&b"x"[..]);
        assert!(!plain.has_side_data());
        assert_eq!(plain.read_side_data().await, Ok(None));

        let mut meta = MemoryBlobReader::new(&b"x"[..]).with_side_data(&b"meta"[..]);
        assert!(meta.has_side_data());
        assert_eq!(meta.read_side_data().await, Ok(Some(Bytes::from_static(b"meta"))));
    }

    #[tokio::test]
    async fn missing_file_is_file_not_found() {
        let path = std::env::temp_dir().join(format!("flowgate-missing-{}", uuid::Uuid::new_v4()));
        let mut r = FileBlobReader::new(path);
        assert_eq!(r.calculate_size().await, Err(NetError::FileNotFound));
    }

    #[tokio::test]
    async fn file_reader_seeks_to_offset() {
        let path = std::env::temp_dir().join(format!("flowgate-reader-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, b"hello, world").await.unwrap();

        let mut r = FileBlobReader::new(&path);
        assert_eq!(r.calculate_size().await, Ok(12));
        r.set_read_range(7, 5).unwrap();

        let mut out = Vec::new();
        let mut buf = [0u8; 2];
        loop {
            let n = r.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            out.extend_from_slice(&buf[..n]);
        }
        assert_eq!(out, b"world");

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
