//! # oxilzma
//!
//! LZMA (Lempel-Ziv-Markov chain Algorithm) compression and decompression
//! of raw `.lzma` streams.
//!
//! ## Features
//!
//! - **Pure Rust**, no unsafe code
//! - Binary-tree match finders (BT2 and BT4)
//! - Price-driven optimal parsing
//! - Compression levels 1-9
//! - Streaming through [`std::io::Read`] / [`std::io::Write`] with bounded
//!   memory, for both known-size and end-marker terminated streams
//!
//! ## Usage
//!
//! ```rust
//! use oxilzma::{LzmaLevel, compress, decompress};
//!
//! let data = b"Hello, LZMA! Hello, LZMA! Hello, LZMA!";
//! let compressed = compress(data, LzmaLevel::DEFAULT)?;
//! let restored = decompress(&compressed)?;
//! assert_eq!(restored, data);
//! # Ok::<(), oxilzma::LzmaError>(())
//! ```
//!
//! ## Stream format
//!
//! An LZMA stream consists of:
//! 1. Properties byte (lc, lp, pb encoded)
//! 2. Dictionary size (4 bytes, little-endian)
//! 3. Uncompressed size (8 bytes, little-endian, 0xFFFFFFFFFFFFFFFF = unknown)
//! 4. Range-coded body
//!
//! The algorithm uses:
//! - LZ77-style dictionary compression with sliding window
//! - Range coding for entropy encoding
//! - Context-dependent probability models

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bit_tree;
pub mod decoder;
pub mod distance;
pub mod encoder;
pub mod header;
pub mod length;
pub mod literal;
pub mod match_finder;
pub mod model;
pub mod optimal;
pub mod price;
pub mod range_coder;

// Re-exports
pub use decoder::LzmaDecoder;
pub use encoder::{EncoderConfig, LzmaEncoder};
pub use header::{HEADER_SIZE, LzmaHeader};
pub use match_finder::MatchFinderKind;
pub use model::{LzmaModel, LzmaProperties, State};
pub use oxilzma_core::error::{LzmaError, Result};
pub use range_coder::{RangeDecoder, RangeEncoder};

use std::io::{Read, Write};

/// LZMA compression level, 1 (fastest) to 9 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LzmaLevel(u8);

impl LzmaLevel {
    /// Fastest compression (level 1).
    pub const FAST: Self = Self(1);
    /// Default compression (level 5).
    pub const DEFAULT: Self = Self(5);
    /// Best compression (level 9).
    pub const BEST: Self = Self(9);

    /// Create a new compression level, clamped to 1..=9.
    pub fn new(level: u8) -> Self {
        Self(level.clamp(1, 9))
    }

    /// Get the level value.
    pub fn level(&self) -> u8 {
        self.0
    }

    /// Get the dictionary size for this level.
    pub fn dict_size(&self) -> u32 {
        match self.0 {
            1 => 1 << 16, // 64 KB
            2 => 1 << 20, // 1 MB
            3 => 1 << 19, // 512 KB
            4 => 1 << 20, // 1 MB
            5 => 1 << 21, // 2 MB
            6 => 1 << 22, // 4 MB
            7 => 1 << 23, // 8 MB
            8 => 1 << 24, // 16 MB
            _ => 1 << 25, // 32 MB
        }
    }

    /// Get the fast-bytes setting for this level.
    pub fn fast_bytes(&self) -> u32 {
        match self.0 {
            1..=4 => 64,
            5..=7 => 128,
            _ => 255,
        }
    }

    /// Get the match finder for this level.
    pub fn match_finder(&self) -> MatchFinderKind {
        match self.0 {
            1 | 2 => MatchFinderKind::Bt2,
            _ => MatchFinderKind::Bt4,
        }
    }
}

impl Default for LzmaLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Compress `data` into a stream with a known size.
pub fn compress(data: &[u8], level: LzmaLevel) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len() / 2 + HEADER_SIZE + 16);
    LzmaEncoder::new(EncoderConfig::from_level(level)).encode(
        data,
        &mut out,
        Some(data.len() as u64),
    )?;
    Ok(out)
}

/// Decompress a complete stream.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    LzmaDecoder::from_header(data)?.decompress()
}

/// Compress the UTF-8 bytes of `text`.
pub fn compress_str(text: &str, level: LzmaLevel) -> Result<Vec<u8>> {
    compress(text.as_bytes(), level)
}

/// Decompress a stream whose content is UTF-8 text.
pub fn decompress_str(data: &[u8]) -> Result<String> {
    let bytes = decompress(data)?;
    String::from_utf8(bytes).map_err(|e| LzmaError::invalid_utf8(e.to_string()))
}

/// Compress everything `reader` yields into `writer`, using an unknown-size
/// header and an end marker. Returns the number of bytes written.
pub fn compress_stream<R: Read, W: Write>(reader: R, writer: W, level: LzmaLevel) -> Result<u64> {
    LzmaEncoder::new(EncoderConfig::from_level(level)).encode(reader, writer, None)
}

/// Decompress a stream from `reader` into `writer`. Returns the number of
/// bytes produced.
pub fn decompress_stream<R: Read, W: Write>(reader: R, writer: W) -> Result<u64> {
    LzmaDecoder::from_header(reader)?.decode_to(writer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level() {
        assert_eq!(LzmaLevel::FAST.level(), 1);
        assert_eq!(LzmaLevel::DEFAULT.level(), 5);
        assert_eq!(LzmaLevel::BEST.level(), 9);
        assert_eq!(LzmaLevel::default(), LzmaLevel::DEFAULT);
    }

    #[test]
    fn test_level_clamp() {
        assert_eq!(LzmaLevel::new(100).level(), 9);
        assert_eq!(LzmaLevel::new(0).level(), 1);
    }

    #[test]
    fn test_level_table() {
        let expected = [
            (16, 64, MatchFinderKind::Bt2),
            (20, 64, MatchFinderKind::Bt2),
            (19, 64, MatchFinderKind::Bt4),
            (20, 64, MatchFinderKind::Bt4),
            (21, 128, MatchFinderKind::Bt4),
            (22, 128, MatchFinderKind::Bt4),
            (23, 128, MatchFinderKind::Bt4),
            (24, 255, MatchFinderKind::Bt4),
            (25, 255, MatchFinderKind::Bt4),
        ];
        for (i, &(dict_log, fast, mf)) in expected.iter().enumerate() {
            let level = LzmaLevel::new(i as u8 + 1);
            assert_eq!(level.dict_size(), 1 << dict_log);
            assert_eq!(level.fast_bytes(), fast);
            assert_eq!(level.match_finder(), mf);
        }
    }

    #[test]
    fn test_compress_decompress_single_byte() {
        let original = b"A";
        let compressed = compress(original, LzmaLevel::DEFAULT).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_compress_decompress_hello() {
        let original = b"Hello";
        let compressed = compress(original, LzmaLevel::DEFAULT).unwrap();
        assert_eq!(decompress(&compressed).unwrap(), original);
    }

    #[test]
    fn test_compress_decompress_empty() {
        let compressed = compress(b"", LzmaLevel::DEFAULT).unwrap();
        assert_eq!(compressed.len(), HEADER_SIZE + 5);
        assert!(decompress(&compressed).unwrap().is_empty());
    }

    #[test]
    fn test_header_fields() {
        let data = b"header check";
        let compressed = compress(data, LzmaLevel::DEFAULT).unwrap();
        let header = LzmaHeader::read(&mut &compressed[..]).unwrap();
        assert_eq!(compressed[0], 0x5D);
        assert_eq!(header.dict_size, 1 << 21);
        assert_eq!(header.uncompressed_size, Some(data.len() as u64));
    }

    #[test]
    fn test_compression_levels() {
        let data = b"Hello World! This is a test of LZMA compression with various levels.";
        for level in 1..=9 {
            let compressed = compress(data, LzmaLevel::new(level)).unwrap();
            let decompressed = decompress(&compressed).unwrap();
            assert_eq!(&decompressed[..], &data[..], "Level {} roundtrip failed", level);
        }
    }

    #[test]
    fn test_str_roundtrip() {
        let text = "Grüße, LZMA! ✓ ".repeat(50);
        let compressed = compress_str(&text, LzmaLevel::DEFAULT).unwrap();
        assert_eq!(decompress_str(&compressed).unwrap(), text);
    }

    #[test]
    fn test_decompress_str_invalid_utf8() {
        let compressed = compress(&[0xFF, 0xFE, 0x80], LzmaLevel::DEFAULT).unwrap();
        let err = decompress_str(&compressed).unwrap_err();
        assert!(matches!(err, LzmaError::InvalidUtf8 { .. }));
    }

    #[test]
    fn test_stream_roundtrip() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i % 251) as u8 ^ (i / 1000) as u8).collect();
        let mut compressed = Vec::new();
        let written = compress_stream(&data[..], &mut compressed, LzmaLevel::FAST).unwrap();
        assert_eq!(written, compressed.len() as u64);
        assert_eq!(&compressed[5..13], &[0xFF; 8]);

        let mut out = Vec::new();
        let produced = decompress_stream(&compressed[..], &mut out).unwrap();
        assert_eq!(produced, data.len() as u64);
        assert_eq!(out, data);
    }
}
