//! The buffered byte source feeding the protocol codecs.

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::container::ring::Ring;

/// A connection read buffer: a byte ring paired with the readable half
/// of a connection.
///
/// The buffer owns the ring but never the socket, so tests can
/// substitute any in-memory reader for the source.
pub struct ConnBuf<R> {
    ring: Ring<u8>,
    reader: R,
}

impl<R> ConnBuf<R> {
    /// Creates a buffer of the given ring capacity over `reader`.
    pub fn new(capacity: usize, reader: R) -> Self {
        ConnBuf {
            ring: Ring::new(capacity),
            reader,
        }
    }

    /// Returns the number of buffered bytes.
    pub fn available(&self) -> usize {
        self.ring.size()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    /// Offset of the first occurrence of `pat` among the buffered bytes.
    pub fn index_of(&self, pat: &[u8]) -> Option<usize> {
        self.ring.index_of(pat)
    }

    /// Reports whether the newest buffered bytes equal `pat`.
    pub fn has_suffix(&self, pat: &[u8]) -> bool {
        self.ring.has_suffix(pat)
    }

    /// Discards all buffered bytes.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    /// Discards all buffered bytes and swaps in a new source.
    pub fn reset(&mut self, reader: R) {
        self.ring.clear();
        self.reader = reader;
    }

    /// Dequeues up to `dst.len()` buffered bytes; zero when empty.
    pub fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.ring, dst)
    }

    /// Buffers bytes directly, bypassing the source.
    pub fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.ring, src)
    }
}

impl<R: AsyncRead + Unpin> ConnBuf<R> {
    /// Pulls bytes from the source into the ring, using at most two
    /// reads over the writable spans.
    ///
    /// Returns the number of bytes added. Zero means the ring is
    /// already full or the source reached EOF; neither is an error at
    /// this layer. Errors surface only from the reader itself.
    pub async fn fill(&mut self) -> io::Result<usize> {
        let mut added = 0;

        for _ in 0..2 {
            let Self { ring, reader } = self;

            let span = ring.write_span();
            if span.is_empty() {
                break;
            }

            let len = span.len();
            let n = reader.read(span).await?;
            ring.advance_end(n);
            added += n;

            if n == 0 || n < len {
                break;
            }
        }

        Ok(added)
    }
}
