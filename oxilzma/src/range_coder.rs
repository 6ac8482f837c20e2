//! Range coder for LZMA compression.
//!
//! The range coder is an entropy coding method similar to arithmetic coding.
//! LZMA uses a specific variant with:
//! - 32-bit range tracking
//! - Normalization when range drops below 2^24
//! - 11-bit probability model (2048 = 100%)

use oxilzma_core::error::{LzmaError, Result};
use std::io::{self, Read, Write};

/// Number of bits in probability model.
pub const PROB_BITS: u32 = 11;

/// Probability representing 50%.
pub const PROB_INIT: u16 = 1 << (PROB_BITS - 1);

/// Maximum probability value.
pub const PROB_MAX: u16 = 1 << PROB_BITS;

/// Number of bits to shift for probability update.
pub const MOVE_BITS: u32 = 5;

/// Top value for range normalization.
const TOP_VALUE: u32 = 1 << 24;

/// Range decoder for LZMA decompression.
#[derive(Debug)]
pub struct RangeDecoder<R: Read> {
    reader: R,
    range: u32,
    code: u32,
    /// Bytes consumed from `reader`.
    position: u64,
}

impl<R: Read> RangeDecoder<R> {
    /// Create a new range decoder, consuming the 5 initialization bytes.
    ///
    /// `base_offset` is the stream offset of the first body byte; error
    /// offsets are counted from the start of the stream.
    pub fn new(reader: R, base_offset: u64) -> Result<Self> {
        let mut decoder = Self {
            reader,
            range: 0xFFFF_FFFF,
            code: 0,
            position: base_offset,
        };

        // The encoder's cache mechanism always emits a leading zero byte.
        if decoder.read_byte()? != 0x00 {
            return Err(LzmaError::corrupted(
                base_offset,
                "range coder start byte is not zero",
            ));
        }

        for _ in 0..4 {
            decoder.code = (decoder.code << 8) | decoder.read_byte()? as u32;
        }

        if decoder.code == decoder.range {
            return Err(LzmaError::corrupted(
                decoder.position,
                "invalid range coder initial code",
            ));
        }

        Ok(decoder)
    }

    fn read_byte(&mut self) -> Result<u8> {
        let mut buf = [0u8; 1];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {
                self.position += 1;
                Ok(buf[0])
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(LzmaError::truncated(self.position))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Normalize the range (refill when range gets small).
    #[inline]
    fn normalize(&mut self) -> Result<()> {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.code = (self.code << 8) | self.read_byte()? as u32;
        }
        Ok(())
    }

    /// Decode a single bit with the given probability.
    #[inline]
    pub fn decode_bit(&mut self, prob: &mut u16) -> Result<u32> {
        self.normalize()?;

        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if self.code < bound {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
            Ok(0)
        } else {
            self.range -= bound;
            self.code -= bound;
            *prob -= *prob >> MOVE_BITS;
            Ok(1)
        }
    }

    /// Decode a bit with fixed 50% probability.
    #[inline]
    pub fn decode_direct_bit(&mut self) -> Result<u32> {
        self.normalize()?;

        self.range >>= 1;
        self.code = self.code.wrapping_sub(self.range);

        // Sign of the wrapped difference is the unsigned `code < range` test.
        let bit = if (self.code as i32) < 0 {
            self.code = self.code.wrapping_add(self.range);
            0
        } else {
            1
        };

        Ok(bit)
    }

    /// Decode `count` bits with fixed probability, MSB first.
    pub fn decode_direct_bits(&mut self, count: u32) -> Result<u32> {
        let mut result = 0u32;
        for _ in 0..count {
            result = (result << 1) | self.decode_direct_bit()?;
        }
        Ok(result)
    }

    /// Catch up on the last normalization and report whether the coder
    /// ended cleanly.
    ///
    /// The encoder's flush leaves `code == 0` once every body byte has been
    /// read; anything else means the tail of the stream was damaged.
    pub fn is_finished_ok(&mut self) -> Result<bool> {
        self.normalize()?;
        Ok(self.code == 0)
    }

    /// Stream offset of the next unread byte.
    pub fn position(&self) -> u64 {
        self.position
    }
}

/// Range encoder for LZMA compression.
///
/// Output accumulates in an internal buffer which the caller drains into
/// its sink between blocks with [`RangeEncoder::write_pending`].
#[derive(Debug)]
pub struct RangeEncoder {
    /// Pending output.
    buffer: Vec<u8>,
    /// Bytes already handed to a sink.
    written: u64,
    /// Current range.
    range: u32,
    /// Low value; bit 32 carries into the cached bytes.
    low: u64,
    /// Cache byte.
    cache: u8,
    /// Number of pending bytes (the cache plus any 0xFF run).
    cache_size: u64,
}

impl RangeEncoder {
    /// Create a new range encoder.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            written: 0,
            range: 0xFFFF_FFFF,
            low: 0,
            cache: 0,
            cache_size: 1,
        }
    }

    /// Shift low and write bytes.
    ///
    /// Bytes are held back while they might still receive a carry: a run of
    /// 0xFF bytes behind `cache` becomes 0x00 bytes if a carry arrives.
    fn shift_low(&mut self) {
        if self.low < 0xFF00_0000 || self.low > 0xFFFF_FFFF {
            let carry = (self.low >> 32) as u8;
            let mut tmp = self.cache;

            loop {
                self.buffer.push(tmp.wrapping_add(carry));
                tmp = 0xFF;
                self.cache_size -= 1;
                if self.cache_size == 0 {
                    break;
                }
            }

            self.cache = (self.low >> 24) as u8;
        }

        self.cache_size += 1;
        self.low = (self.low << 8) & 0xFFFF_FFFF;
    }

    #[inline]
    fn normalize(&mut self) {
        if self.range < TOP_VALUE {
            self.range <<= 8;
            self.shift_low();
        }
    }

    /// Encode a single bit with the given probability.
    #[inline]
    pub fn encode_bit(&mut self, prob: &mut u16, bit: u32) {
        let bound = (self.range >> PROB_BITS) * (*prob as u32);

        if bit == 0 {
            self.range = bound;
            *prob += (PROB_MAX - *prob) >> MOVE_BITS;
        } else {
            self.low += bound as u64;
            self.range -= bound;
            *prob -= *prob >> MOVE_BITS;
        }

        self.normalize();
    }

    /// Encode `count` bits of `value` with fixed probability, MSB first.
    pub fn encode_direct_bits(&mut self, value: u32, count: u32) {
        for i in (0..count).rev() {
            self.range >>= 1;
            if (value >> i) & 1 != 0 {
                self.low += self.range as u64;
            }
            self.normalize();
        }
    }

    /// Push out every pending byte. The encoder must not be used afterwards.
    pub fn flush(&mut self) {
        for _ in 0..5 {
            self.shift_low();
        }
    }

    /// Total compressed size so far, counting bytes still held in the cache.
    pub fn processed_bytes(&self) -> u64 {
        self.written + self.buffer.len() as u64 + self.cache_size + 4
    }

    /// Bytes handed to a sink so far.
    pub fn bytes_written(&self) -> u64 {
        self.written
    }

    /// Move buffered output into `sink`.
    pub fn write_pending<W: Write>(&mut self, sink: &mut W) -> io::Result<()> {
        if !self.buffer.is_empty() {
            sink.write_all(&self.buffer)?;
            self.written += self.buffer.len() as u64;
            self.buffer.clear();
        }
        Ok(())
    }

    /// Flush and return all output that has not been drained yet.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush();
        self.buffer
    }
}

impl Default for RangeEncoder {
    fn default() -> Self {
        Self::new()
    }
}
