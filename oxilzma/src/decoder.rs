//! LZMA decompression.
//!
//! The decoder mirrors the encoder's model decision for decision. Decoded
//! bytes go through an [`OutputWindow`] sized to the dictionary (or to the
//! declared output size, when that is smaller), which forwards them to the
//! caller's writer.

use crate::distance::END_MARKER_DISTANCE;
use crate::header::{HEADER_SIZE, LzmaHeader};
use crate::model::{LzmaModel, MATCH_LEN_MIN, NUM_REPS, State};
use crate::range_coder::RangeDecoder;
use log::debug;
use oxilzma_core::error::{LzmaError, Result};
use oxilzma_core::window::OutputWindow;
use std::io::{Read, Write};

/// Largest buffer reserved up front by [`LzmaDecoder::decompress`].
const MAX_PREALLOC: u64 = 1 << 26;

/// LZMA decoder for a stream with a header.
#[derive(Debug)]
pub struct LzmaDecoder<R: Read> {
    reader: R,
    header: LzmaHeader,
}

impl<R: Read> LzmaDecoder<R> {
    /// Read and validate the header from `reader`.
    pub fn from_header(mut reader: R) -> Result<Self> {
        let header = LzmaHeader::read(&mut reader)?;
        Ok(Self { reader, header })
    }

    /// The stream header.
    pub fn header(&self) -> &LzmaHeader {
        &self.header
    }

    /// Decode the whole stream into a vector.
    pub fn decompress(self) -> Result<Vec<u8>> {
        let capacity = self
            .header
            .uncompressed_size
            .unwrap_or(0)
            .min(MAX_PREALLOC) as usize;
        let mut out = Vec::with_capacity(capacity);
        self.decode_to(&mut out)?;
        Ok(out)
    }

    /// Decode the whole stream into `sink`; returns the number of bytes
    /// produced.
    pub fn decode_to<W: Write>(self, sink: W) -> Result<u64> {
        let LzmaHeader {
            props,
            dict_size,
            uncompressed_size,
        } = self.header;

        debug!(
            "lzma decode: lc={} lp={} pb={} dict_size={} size={:?}",
            props.lc, props.lp, props.pb, dict_size, uncompressed_size
        );

        let dict_check = dict_size.max(1);
        let window_size = match uncompressed_size {
            Some(n) => n.min(dict_size as u64) as usize,
            None => dict_size as usize,
        };

        let mut window = OutputWindow::new(window_size, sink);
        let mut rc = RangeDecoder::new(self.reader, HEADER_SIZE as u64)?;
        let mut model = LzmaModel::new(props);
        let mut state = State::new();
        let mut reps = [0u32; NUM_REPS];
        let pos_mask = props.pos_state_mask();

        loop {
            let produced = window.total_out();
            if uncompressed_size.is_some_and(|size| produced >= size) {
                break;
            }

            let pos_state = (produced & pos_mask) as usize;
            let s = state.value();

            if rc.decode_bit(&mut model.is_match[s][pos_state])? == 0 {
                let ctx = model.literal.context(produced, window.get_byte(0));
                let byte = if state.is_literal() {
                    model.literal.decode_normal(&mut rc, ctx)?
                } else {
                    let match_byte = window.get_byte(reps[0]);
                    model
                        .literal
                        .decode_with_match_byte(&mut rc, ctx, match_byte)?
                };
                window.put_byte(byte)?;
                state.update_literal();
                continue;
            }

            let len = if rc.decode_bit(&mut model.is_rep[s])? == 0 {
                let len = model.match_len.decode(&mut rc, pos_state)? + MATCH_LEN_MIN as u32;
                let dist = model.distance.decode(&mut rc, len)?;

                if dist == END_MARKER_DISTANCE {
                    if uncompressed_size.is_none() {
                        break;
                    }
                    return Err(LzmaError::corrupted(
                        rc.position(),
                        "end marker in a stream of known size",
                    ));
                }

                reps = [dist, reps[0], reps[1], reps[2]];
                state.update_match();
                len
            } else {
                if rc.decode_bit(&mut model.is_rep0[s])? == 0 {
                    if rc.decode_bit(&mut model.is_rep0_long[s][pos_state])? == 0 {
                        check_distance(reps[0], produced, dict_check, rc.position())?;
                        state.update_short_rep();
                        window.put_byte(window.get_byte(reps[0]))?;
                        continue;
                    }
                } else {
                    let index = if rc.decode_bit(&mut model.is_rep1[s])? == 0 {
                        1
                    } else if rc.decode_bit(&mut model.is_rep2[s])? == 0 {
                        2
                    } else {
                        3
                    };
                    let dist = reps[index];
                    reps.copy_within(0..index, 1);
                    reps[0] = dist;
                }

                let len = model.rep_len.decode(&mut rc, pos_state)? + MATCH_LEN_MIN as u32;
                state.update_long_rep();
                len
            };

            let dist = reps[0];
            check_distance(dist, produced, dict_check, rc.position())?;

            if let Some(size) = uncompressed_size {
                if produced + len as u64 > size {
                    return Err(LzmaError::corrupted(
                        rc.position(),
                        format!("match of {len} bytes runs past the declared size {size}"),
                    ));
                }
            }

            window
                .copy_block(dist, len as usize)
                .map_err(|e| e.at_offset(rc.position()))?;
        }

        if !rc.is_finished_ok()? {
            // A known-size stream may still carry an end marker.
            let marker = uncompressed_size.is_some() && {
                let pos_state = (window.total_out() & pos_mask) as usize;
                trailing_end_marker(&mut rc, &mut model, state, pos_state)?
            };
            if !marker {
                return Err(LzmaError::corrupted(
                    rc.position(),
                    "range coder did not finish cleanly",
                ));
            }
        }

        window.flush()?;
        let total = window.total_out();
        debug!("lzma decode done: {} -> {} bytes", rc.position(), total);
        Ok(total)
    }
}

/// Decode one symbol after the last byte of a known-size stream and report
/// whether it is a cleanly finished end marker.
fn trailing_end_marker<R: Read>(
    rc: &mut RangeDecoder<R>,
    model: &mut LzmaModel,
    state: State,
    pos_state: usize,
) -> Result<bool> {
    match decode_end_marker(rc, model, state, pos_state) {
        // Running out of input here means the tail was damaged, not cut.
        Err(LzmaError::TruncatedInput { .. }) => Ok(false),
        other => other,
    }
}

fn decode_end_marker<R: Read>(
    rc: &mut RangeDecoder<R>,
    model: &mut LzmaModel,
    state: State,
    pos_state: usize,
) -> Result<bool> {
    let s = state.value();
    if rc.decode_bit(&mut model.is_match[s][pos_state])? == 0
        || rc.decode_bit(&mut model.is_rep[s])? != 0
    {
        return Ok(false);
    }
    let len = model.match_len.decode(rc, pos_state)? + MATCH_LEN_MIN as u32;
    if model.distance.decode(rc, len)? != END_MARKER_DISTANCE {
        return Ok(false);
    }
    rc.is_finished_ok()
}

#[inline]
fn check_distance(dist: u32, produced: u64, dict_check: u32, offset: u64) -> Result<()> {
    if dist as u64 >= produced || dist >= dict_check {
        return Err(LzmaError::corrupted(
            offset,
            format!(
                "distance {} is beyond the {} bytes of history",
                dist as u64 + 1,
                produced.min(dict_check as u64)
            ),
        ));
    }
    Ok(())
}
