//! A fixed-capacity cyclic buffer.

use std::{
    cmp,
    fmt::{self, Display, Formatter},
    io,
};

/// The capacity used when a requested capacity is zero or not a power of two.
pub const DEFAULT_CAPACITY: usize = 0x1000;

/// Errors when operating on a ring at its capacity bounds.
#[derive(Debug)]
pub enum Error {
    /// No free space left in the ring.
    Full,

    /// No buffered elements left in the ring.
    Empty,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Error::Full => write!(f, "ring full"),
            Error::Empty => write!(f, "ring empty"),
        }
    }
}

impl std::error::Error for Error {}

/// A cyclic buffer of fixed, power-of-two capacity.
///
/// The two cursors are kept modulo twice the capacity, which tells a full
/// ring apart from an empty one without wasting a slot: the size is
/// `(end - start) mod 2C` and ranges over `0..=C`.
pub struct Ring<T> {
    buf: Box<[T]>,
    imask: usize,
    lmask: usize,
    start: usize,
    end: usize,
}

impl<T: Clone + Default> Ring<T> {
    /// Creates a ring with the given capacity.
    ///
    /// A capacity of zero, or one that is not a power of two, becomes
    /// [`DEFAULT_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 || capacity & (capacity - 1) != 0 {
            DEFAULT_CAPACITY
        } else {
            capacity
        };

        Ring {
            buf: vec![T::default(); capacity].into_boxed_slice(),
            imask: capacity - 1,
            lmask: 2 * capacity - 1,
            start: 0,
            end: 0,
        }
    }
}

impl<T> Ring<T> {
    /// Returns the effective capacity.
    pub fn cap(&self) -> usize {
        self.imask + 1
    }

    /// Returns the number of buffered elements.
    pub fn size(&self) -> usize {
        self.end.wrapping_sub(self.start) & self.lmask
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn is_full(&self) -> bool {
        self.size() == self.cap()
    }

    /// Discards all buffered elements.
    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }
}

impl<T: Clone> Ring<T> {
    /// Appends an element, failing when the ring is full.
    pub fn push(&mut self, val: T) -> bool {
        if self.is_full() {
            return false;
        }

        self.buf[self.end & self.imask] = val;
        self.end = (self.end + 1) & self.lmask;

        true
    }

    /// Removes and returns the oldest element.
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }

        let val = self.buf[self.start & self.imask].clone();
        self.start = (self.start + 1) & self.lmask;

        Some(val)
    }
}

impl<T: PartialEq> Ring<T> {
    /// Reports whether the newest `pat.len()` elements equal `pat`.
    ///
    /// An empty pattern always matches; a pattern longer than the
    /// buffered size never does.
    pub fn has_suffix(&self, pat: &[T]) -> bool {
        let n = pat.len();
        if n == 0 {
            return true;
        }
        if self.size() < n {
            return false;
        }

        let from = (self.end & self.imask).wrapping_sub(n);

        pat.iter()
            .enumerate()
            .all(|(i, t)| *t == self.buf[from.wrapping_add(i) & self.imask])
    }

    /// Returns the offset from the read cursor of the first occurrence
    /// of `pat`.
    ///
    /// An empty pattern matches at offset 0 of any non-empty ring and
    /// nowhere in an empty one; the HTTP head scan depends on this
    /// convention.
    pub fn index_of(&self, pat: &[T]) -> Option<usize> {
        let n = pat.len();
        if n == 0 {
            return (!self.is_empty()).then_some(0);
        }

        let size = self.size();
        if size < n {
            return None;
        }

        'outer: for i in 0..=size - n {
            for (j, t) in pat.iter().enumerate() {
                if self.buf[(self.start + i + j) & self.imask] != *t {
                    continue 'outer;
                }
            }
            return Some(i);
        }

        None
    }
}

impl Ring<u8> {
    /// First contiguous writable span; empty when the ring is full.
    pub(crate) fn write_span(&mut self) -> &mut [u8] {
        if self.is_full() {
            return &mut [];
        }

        let from = self.end & self.imask;
        let to = self.start & self.imask;

        if to <= from {
            &mut self.buf[from..]
        } else {
            &mut self.buf[from..to]
        }
    }

    /// First contiguous readable span; empty when the ring is empty.
    pub(crate) fn read_span(&self) -> &[u8] {
        if self.is_empty() {
            return &[];
        }

        let from = self.start & self.imask;
        let to = self.end & self.imask;

        if to <= from {
            &self.buf[from..]
        } else {
            &self.buf[from..to]
        }
    }

    /// Commits `n` bytes placed into a writable span.
    pub(crate) fn advance_end(&mut self, n: usize) {
        debug_assert!(n <= self.cap() - self.size());
        self.end = (self.end + n) & self.lmask;
    }

    /// Releases `n` bytes consumed from a readable span.
    pub(crate) fn advance_start(&mut self, n: usize) {
        debug_assert!(n <= self.size());
        self.start = (self.start + n) & self.lmask;
    }

    /// Exposes the writable region to `f` as at most two contiguous
    /// spans; `f` reports how many bytes it filled in each.
    ///
    /// Returning less than a full span stops the walk early.
    pub fn with_write_region<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&mut [u8]) -> usize,
    {
        let mut filled = 0;

        for _ in 0..2 {
            let span = self.write_span();
            if span.is_empty() {
                break;
            }

            let len = span.len();
            let n = f(span);
            debug_assert!(n <= len);

            self.advance_end(n);
            filled += n;

            if n < len {
                break;
            }
        }

        filled
    }

    /// Drains the ring into `w` using at most two sink writes.
    pub fn write_to<W: io::Write>(&mut self, w: &mut W) -> io::Result<usize> {
        if self.is_empty() {
            return Err(io::Error::new(io::ErrorKind::Other, Error::Empty));
        }

        let mut total = 0;

        for _ in 0..2 {
            let (n, len) = {
                let span = self.read_span();
                if span.is_empty() {
                    break;
                }
                (w.write(span)?, span.len())
            };

            self.advance_start(n);
            total += n;

            if n < len {
                break;
            }
        }

        Ok(total)
    }

    /// Fills the ring from `r` using at most two source reads.
    pub fn read_from<R: io::Read>(&mut self, r: &mut R) -> io::Result<usize> {
        if self.is_full() {
            return Err(io::Error::new(io::ErrorKind::Other, Error::Full));
        }

        let mut total = 0;

        for _ in 0..2 {
            let (n, len) = {
                let span = self.write_span();
                if span.is_empty() {
                    break;
                }
                let len = span.len();
                (r.read(span)?, len)
            };

            self.advance_end(n);
            total += n;

            if n == 0 || n < len {
                break;
            }
        }

        Ok(total)
    }
}

impl io::Write for Ring<u8> {
    /// Copies up to the free capacity from `src`.
    ///
    /// A full ring is an error; running out of space midway is a short
    /// write, not an error.
    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        if self.is_full() {
            return Err(io::Error::new(io::ErrorKind::Other, Error::Full));
        }

        let mut written = 0;

        for _ in 0..2 {
            if written == src.len() {
                break;
            }

            let span = self.write_span();
            if span.is_empty() {
                break;
            }

            let n = cmp::min(span.len(), src.len() - written);
            span[..n].copy_from_slice(&src[written..written + n]);

            self.advance_end(n);
            written += n;
        }

        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl io::Read for Ring<u8> {
    /// Dequeues up to `dst.len()` bytes; an empty ring reads zero bytes.
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        let mut read = 0;

        for _ in 0..2 {
            if read == dst.len() {
                break;
            }

            let n = {
                let span = self.read_span();
                if span.is_empty() {
                    break;
                }
                let n = cmp::min(span.len(), dst.len() - read);
                dst[read..read + n].copy_from_slice(&span[..n]);
                n
            };

            self.advance_start(n);
            read += n;
        }

        Ok(read)
    }
}
