//! Chunk sources feeding the importer.
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::errors::UnixFsError;

/// Default chunk size: 256KiB.
pub const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

/// A forward-only, non-restartable source of chunks.
#[async_trait]
pub trait Splitter: Send {
    /// The next chunk, or `None` once the input is exhausted.
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UnixFsError>;

    /// Upper bound on the length of every chunk.
    fn chunk_size(&self) -> usize;
}

/// Splits a reader into chunks of exactly `size` bytes, except the last one.
#[derive(Debug)]
pub struct SizeSplitter<R> {
    reader: R,
    size: usize,
    done: bool,
}

impl<R> SizeSplitter<R> {
    pub fn new(reader: R, size: usize) -> Self {
        Self {
            reader,
            size: size.max(1),
            done: false,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> Splitter for SizeSplitter<R> {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, UnixFsError> {
        if self.done {
            return Ok(None);
        }
        let mut buf = BytesMut::zeroed(self.size);
        let mut filled = 0;
        while filled < self.size {
            let n = self
                .reader
                .read(&mut buf[filled..])
                .await
                .map_err(UnixFsError::Chunker)?;
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }

    fn chunk_size(&self) -> usize {
        self.size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_size_splitter() {
        let data = (0..=255u8).collect::<Vec<_>>();
        let mut splitter = SizeSplitter::new(&data[..], 100);
        let mut sizes = Vec::new();
        let mut joined = Vec::new();
        while let Some(chunk) = splitter.next_chunk().await.unwrap() {
            sizes.push(chunk.len());
            joined.extend_from_slice(&chunk);
        }
        assert_eq!(sizes, vec![100, 100, 56]);
        assert_eq!(joined, data);
        assert!(splitter.next_chunk().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_exact_multiple_and_empty_input() {
        let data = [7u8; 200];
        let mut splitter = SizeSplitter::new(&data[..], 100);
        assert_eq!(splitter.next_chunk().await.unwrap().unwrap().len(), 100);
        assert_eq!(splitter.next_chunk().await.unwrap().unwrap().len(), 100);
        assert!(splitter.next_chunk().await.unwrap().is_none());

        let mut empty = SizeSplitter::new(&[][..], 100);
        assert!(empty.next_chunk().await.unwrap().is_none());
    }
}
