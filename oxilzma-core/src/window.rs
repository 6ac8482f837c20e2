//! Output window (sliding history) for LZ77-family decompression.
//!
//! The window keeps the most recent `capacity` bytes of decoded output so
//! that back-references can be resolved, and forwards completed data to a
//! [`Write`] sink every time the buffer wraps around. Unlike a plain ring
//! buffer the capacity does not have to be a power of two: LZMA headers may
//! declare any dictionary size.

use crate::error::{LzmaError, Result};
use std::io::Write;

/// Smallest window ever allocated.
pub const MIN_WINDOW_SIZE: usize = 1 << 12;

/// A circular history buffer that flushes into a sink.
#[derive(Debug)]
pub struct OutputWindow<W: Write> {
    /// The underlying buffer.
    buffer: Vec<u8>,
    /// Next write position in `buffer`.
    pos: usize,
    /// Start of the not-yet-flushed region.
    flushed: usize,
    /// Whether the buffer has wrapped at least once.
    is_full: bool,
    /// Total bytes written since creation.
    total: u64,
    /// Destination for completed data.
    sink: W,
}

impl<W: Write> OutputWindow<W> {
    /// Create a window of at least `capacity` bytes in front of `sink`.
    pub fn new(capacity: usize, sink: W) -> Self {
        let capacity = capacity.max(MIN_WINDOW_SIZE);
        Self {
            buffer: vec![0; capacity],
            pos: 0,
            flushed: 0,
            is_full: false,
            total: 0,
            sink,
        }
    }

    /// Window capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of history bytes available for back-references.
    pub fn len(&self) -> usize {
        if self.is_full {
            self.buffer.len()
        } else {
            self.pos
        }
    }

    /// Whether nothing has been written yet.
    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Total number of bytes written through the window.
    pub fn total_out(&self) -> u64 {
        self.total
    }

    /// Write a single byte.
    #[inline]
    pub fn put_byte(&mut self, byte: u8) -> Result<()> {
        self.buffer[self.pos] = byte;
        self.pos += 1;
        self.total += 1;
        if self.pos == self.buffer.len() {
            self.wrap()?;
        }
        Ok(())
    }

    /// Read the byte `dist + 1` positions back (`dist == 0` is the last byte).
    ///
    /// Returns 0 when nothing that far back has been written yet.
    #[inline]
    pub fn get_byte(&self, dist: u32) -> u8 {
        let dist = dist as usize;
        if dist >= self.len() {
            return 0;
        }
        let index = if dist < self.pos {
            self.pos - dist - 1
        } else {
            self.buffer.len() - (dist - self.pos) - 1
        };
        self.buffer[index]
    }

    /// Copy `len` bytes starting `dist + 1` positions back.
    ///
    /// Overlapping copies (`len > dist + 1`) repeat the pattern, as LZ77
    /// requires. A distance beyond the history is `CorruptStream`; the
    /// window cannot see the compressed stream, so the error carries offset
    /// 0 for the caller to fill in with [`LzmaError::at_offset`].
    pub fn copy_block(&mut self, dist: u32, len: usize) -> Result<()> {
        let dist = dist as usize;
        if dist >= self.len() {
            return Err(LzmaError::corrupted(
                0,
                format!("back-reference distance {} exceeds history {}", dist + 1, self.len()),
            ));
        }

        let size = self.buffer.len();
        let mut src = if dist < self.pos {
            self.pos - dist - 1
        } else {
            size - (dist - self.pos) - 1
        };

        for _ in 0..len {
            self.buffer[self.pos] = self.buffer[src];
            src += 1;
            if src == size {
                src = 0;
            }
            self.pos += 1;
            self.total += 1;
            if self.pos == size {
                self.wrap()?;
            }
        }

        Ok(())
    }

    /// Write out everything that has not reached the sink yet.
    pub fn flush(&mut self) -> Result<()> {
        if self.pos > self.flushed {
            self.sink.write_all(&self.buffer[self.flushed..self.pos])?;
            self.flushed = self.pos;
        }
        self.sink.flush()?;
        Ok(())
    }

    /// Flush and return the sink.
    pub fn into_inner(mut self) -> Result<W> {
        self.flush()?;
        Ok(self.sink)
    }

    fn wrap(&mut self) -> Result<()> {
        self.sink.write_all(&self.buffer[self.flushed..])?;
        self.pos = 0;
        self.flushed = 0;
        self.is_full = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put_all<W: Write>(window: &mut OutputWindow<W>, bytes: &[u8]) {
        for &b in bytes {
            window.put_byte(b).unwrap();
        }
    }

    #[test]
    fn test_window_basic() {
        let mut window = OutputWindow::new(MIN_WINDOW_SIZE, Vec::new());
        put_all(&mut window, b"Hello");

        assert_eq!(window.len(), 5);
        assert_eq!(window.get_byte(0), b'o');
        assert_eq!(window.get_byte(1), b'l');
        assert_eq!(window.get_byte(4), b'H');
        assert_eq!(window.into_inner().unwrap(), b"Hello");
    }

    #[test]
    fn test_window_copy_overlap() {
        let mut window = OutputWindow::new(MIN_WINDOW_SIZE, Vec::new());
        put_all(&mut window, b"AB");
        window.copy_block(1, 6).unwrap();
        assert_eq!(window.into_inner().unwrap(), b"ABABABAB");
    }

    #[test]
    fn test_window_single_byte_repeat() {
        let mut window = OutputWindow::new(MIN_WINDOW_SIZE, Vec::new());
        window.put_byte(b'X').unwrap();
        window.copy_block(0, 5).unwrap();
        assert_eq!(window.into_inner().unwrap(), b"XXXXXX");
    }

    #[test]
    fn test_window_wraps_and_flushes() {
        let mut window = OutputWindow::new(MIN_WINDOW_SIZE, Vec::new());
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        put_all(&mut window, &data);

        assert_eq!(window.len(), MIN_WINDOW_SIZE);
        assert_eq!(window.total_out(), 10_000);
        assert_eq!(window.get_byte(0), data[9_999]);
        assert_eq!(
            window.get_byte(MIN_WINDOW_SIZE as u32 - 1),
            data[10_000 - MIN_WINDOW_SIZE]
        );

        // Copy across the wrap point.
        window.copy_block(300, 500).unwrap();
        let out = window.into_inner().unwrap();
        assert_eq!(out.len(), 10_500);
        for i in 0..500 {
            assert_eq!(out[10_000 + i], out[10_000 + i - 301]);
        }
    }

    #[test]
    fn test_window_odd_capacity() {
        let mut window = OutputWindow::new(5000, Vec::new());
        assert_eq!(window.capacity(), 5000);
        let data: Vec<u8> = (0..12_345u32).map(|i| (i * 7) as u8).collect();
        put_all(&mut window, &data);
        assert_eq!(window.get_byte(4999), data[12_345 - 5000]);
        assert_eq!(window.into_inner().unwrap(), data);
    }

    #[test]
    fn test_window_invalid_distance() {
        let mut window = OutputWindow::new(MIN_WINDOW_SIZE, Vec::new());
        assert!(window.copy_block(0, 1).is_err());
        window.put_byte(1).unwrap();
        assert!(window.copy_block(1, 1).is_err());
        assert_eq!(window.get_byte(5), 0);
    }
}
