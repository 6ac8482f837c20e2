//! The 13-byte `.lzma` stream header.
//!
//! | Offset | Size | Field                                            |
//! |--------|------|--------------------------------------------------|
//! | 0      | 1    | Properties byte `(pb * 5 + lp) * 9 + lc`          |
//! | 1      | 4    | Dictionary size, little-endian                   |
//! | 5      | 8    | Uncompressed size, little-endian (`u64::MAX` = unknown) |

use crate::model::LzmaProperties;
use oxilzma_core::error::{DICT_SIZE_LIMIT, LzmaError, Result};
use std::io::{self, Read, Write};

/// Size of the header in bytes.
pub const HEADER_SIZE: usize = 13;

/// Uncompressed size value meaning "unknown; terminated by an end marker".
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Parsed stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaHeader {
    /// Literal and position parameters.
    pub props: LzmaProperties,
    /// Dictionary size the stream was encoded with.
    pub dict_size: u32,
    /// Uncompressed size, or `None` when the stream ends with an end marker.
    pub uncompressed_size: Option<u64>,
}

impl LzmaHeader {
    /// Create a header.
    pub fn new(props: LzmaProperties, dict_size: u32, uncompressed_size: Option<u64>) -> Self {
        Self {
            props,
            dict_size,
            uncompressed_size,
        }
    }

    /// Read and validate a header.
    ///
    /// Fewer than 5 bytes is an invalid header; running out inside the size
    /// field is truncated input.
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let mut buf = [0u8; HEADER_SIZE];
        let got = read_full(reader, &mut buf)?;

        if got < 5 {
            return Err(LzmaError::invalid_header(format!(
                "need at least 5 header bytes, got {got}"
            )));
        }

        let props = LzmaProperties::from_byte(buf[0]).ok_or_else(|| {
            LzmaError::invalid_header(format!("invalid properties byte 0x{:02X}", buf[0]))
        })?;

        let dict_size = u32::from_le_bytes([buf[1], buf[2], buf[3], buf[4]]);
        if dict_size > DICT_SIZE_LIMIT {
            return Err(LzmaError::unsupported_dict_size(dict_size));
        }

        if got < HEADER_SIZE {
            return Err(LzmaError::truncated(got as u64));
        }

        let mut size_bytes = [0u8; 8];
        size_bytes.copy_from_slice(&buf[5..13]);
        let size = u64::from_le_bytes(size_bytes);

        Ok(Self {
            props,
            dict_size,
            uncompressed_size: (size != UNKNOWN_SIZE).then_some(size),
        })
    }

    /// Serialize to the 13-byte wire form.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.props.to_byte();
        buf[1..5].copy_from_slice(&self.dict_size.to_le_bytes());
        buf[5..13].copy_from_slice(&self.uncompressed_size.unwrap_or(UNKNOWN_SIZE).to_le_bytes());
        buf
    }

    /// Write the header.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_all(&self.to_bytes())?;
        Ok(())
    }
}

/// Fill `buf` as far as the reader allows; returns the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}
