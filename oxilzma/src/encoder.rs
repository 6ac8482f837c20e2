//! LZMA compression.
//!
//! The encoder reads its input through a [`MatchFinder`] in blocks of at
//! least 4096 bytes. For every block the [`OptimalParser`] picks tokens and
//! the model codes them through the range encoder; finished output is
//! drained into the caller's writer between blocks.
//!
//! ## Configuration
//!
//! [`EncoderConfig::from_level`] maps a [`LzmaLevel`] to a dictionary size,
//! a fast-bytes threshold and a match finder. Every field can be adjusted
//! with the `with_*` setters.

use crate::LzmaLevel;
use crate::distance::END_MARKER_DISTANCE;
use crate::header::{HEADER_SIZE, LzmaHeader};
use crate::match_finder::{MatchFinder, MatchFinderKind};
use crate::model::{LzmaModel, LzmaProperties, MATCH_LEN_MAX, MATCH_LEN_MIN, NUM_REPS, State};
use crate::optimal::{LITERAL, OptimalParser, ParseContext, PriceTables};
use crate::range_coder::RangeEncoder;
use log::{debug, trace, warn};
use oxilzma_core::error::{LzmaError, Result};
use std::io::{self, Read, Write};

/// Smallest dictionary the encoder uses.
pub const MIN_DICT_SIZE: u32 = 1 << 12;

/// Largest dictionary the encoder uses.
pub const MAX_DICT_SIZE: u32 = 1 << 26;

/// Smallest fast-bytes setting.
pub const MIN_FAST_BYTES: u32 = 5;

/// Largest fast-bytes setting.
pub const MAX_FAST_BYTES: u32 = MATCH_LEN_MAX as u32;

/// Input bytes coded per block before output is drained.
const BLOCK_SIZE: u64 = 1 << 12;

/// Matches coded between distance price refreshes.
const DIST_PRICE_INTERVAL: u32 = 1 << 7;

/// Aligned distances coded between alignment price refreshes.
const ALIGN_PRICE_INTERVAL: u32 = 1 << 4;

/// Encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderConfig {
    /// Dictionary size recorded in the header and used for the history.
    pub dict_size: u32,
    /// Match length at which the parser stops searching for alternatives.
    pub fast_bytes: u32,
    /// Match finder variant.
    pub match_finder: MatchFinderKind,
    /// Terminate the stream with an end marker even when the size is known.
    pub end_marker: bool,
}

impl EncoderConfig {
    /// Settings for a compression level.
    pub fn from_level(level: LzmaLevel) -> Self {
        Self {
            dict_size: level.dict_size(),
            fast_bytes: level.fast_bytes(),
            match_finder: level.match_finder(),
            end_marker: false,
        }
    }

    /// Set the dictionary size, clamped to `MIN_DICT_SIZE..=MAX_DICT_SIZE`.
    pub fn with_dict_size(mut self, dict_size: u32) -> Self {
        self.dict_size = dict_size.clamp(MIN_DICT_SIZE, MAX_DICT_SIZE);
        self
    }

    /// Set fast bytes, clamped to `MIN_FAST_BYTES..=MAX_FAST_BYTES`.
    pub fn with_fast_bytes(mut self, fast_bytes: u32) -> Self {
        self.fast_bytes = fast_bytes.clamp(MIN_FAST_BYTES, MAX_FAST_BYTES);
        self
    }

    /// Set the match finder.
    pub fn with_match_finder(mut self, match_finder: MatchFinderKind) -> Self {
        self.match_finder = match_finder;
        self
    }

    /// Request an end marker.
    pub fn with_end_marker(mut self, end_marker: bool) -> Self {
        self.end_marker = end_marker;
        self
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::from_level(LzmaLevel::DEFAULT)
    }
}

/// LZMA encoder.
#[derive(Debug, Clone, Default)]
pub struct LzmaEncoder {
    config: EncoderConfig,
}

impl LzmaEncoder {
    /// Create an encoder.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Settings in use.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Header written for an input of `size` bytes (`None` = unknown).
    pub fn header(&self, size: Option<u64>) -> LzmaHeader {
        LzmaHeader::new(LzmaProperties::default(), self.config.dict_size, size)
    }

    /// Compress `reader` into `writer`.
    ///
    /// With `size` given, the input must be exactly that long; otherwise the
    /// stream is written with an unknown size and an end marker. Returns the
    /// number of bytes written, header included.
    pub fn encode<R: Read, W: Write>(&self, reader: R, writer: W, size: Option<u64>) -> Result<u64> {
        self.encode_with_progress(reader, writer, size, |_, _| {})
    }

    /// Like [`encode`](Self::encode), calling `progress(in, out)` after
    /// every block.
    pub fn encode_with_progress<R, W, F>(
        &self,
        reader: R,
        mut writer: W,
        size: Option<u64>,
        mut progress: F,
    ) -> Result<u64>
    where
        R: Read,
        W: Write,
        F: FnMut(u64, u64),
    {
        let config = &self.config;
        let end_marker = config.end_marker || size.is_none();

        // Small inputs never need the full dictionary.
        let history = match size {
            Some(n) => n.max(MIN_DICT_SIZE as u64).min(config.dict_size as u64) as u32,
            None => config.dict_size,
        };

        debug!(
            "lzma encode: dict_size={} history={} fast_bytes={} mf={} size={:?}",
            config.dict_size, history, config.fast_bytes, config.match_finder, size
        );

        self.header(size).write(&mut writer)?;

        // Read one byte past a declared size so overlong input is noticed.
        let mut reader = reader.take(size.map_or(u64::MAX, |n| n.saturating_add(1)));
        let mut session = Session::new(config, history);

        loop {
            session.mf.fill(&mut reader)?;
            if let Some(n) = size {
                let seen = session.mf.position() + session.mf.available() as u64;
                if seen > n {
                    return Err(size_mismatch(n, "more"));
                }
            }

            let finished = session.code_one_block();
            session.rc.write_pending(&mut writer)?;

            let out = HEADER_SIZE as u64 + session.rc.processed_bytes();
            trace!("lzma block: in={} out={}", session.now_pos, out);
            progress(session.now_pos, out);

            if finished {
                break;
            }
        }

        if let Some(n) = size {
            if session.now_pos != n {
                return Err(size_mismatch(n, "fewer"));
            }
        }

        if end_marker {
            session.write_end_marker();
        }
        session.rc.flush();
        session.rc.write_pending(&mut writer)?;
        writer.flush()?;

        let total = HEADER_SIZE as u64 + session.rc.bytes_written();
        progress(session.now_pos, total);
        debug!("lzma encode done: {} -> {} bytes", session.now_pos, total);
        Ok(total)
    }
}

fn size_mismatch(declared: u64, relation: &str) -> LzmaError {
    warn!("input has {relation} bytes than the declared {declared}");
    LzmaError::Io(io::Error::new(
        io::ErrorKind::InvalidInput,
        format!("input has {relation} bytes than the declared size {declared}"),
    ))
}

/// State of one compression run.
struct Session {
    model: LzmaModel,
    rc: RangeEncoder,
    mf: MatchFinder,
    parser: OptimalParser,
    prices: PriceTables,
    state: State,
    reps: [u32; NUM_REPS],
    prev_byte: u8,
    now_pos: u64,
    pos_state_mask: u64,
    match_price_count: u32,
    align_price_count: u32,
}

impl Session {
    fn new(config: &EncoderConfig, history: u32) -> Self {
        let props = LzmaProperties::default();
        let model = LzmaModel::new(props);
        let mut prices = PriceTables::new(config.dict_size, config.fast_bytes);
        prices.refresh_all(&model);

        Self {
            model,
            rc: RangeEncoder::new(),
            mf: MatchFinder::new(config.match_finder, history, config.fast_bytes),
            parser: OptimalParser::new(config.fast_bytes, props.pb),
            prices,
            state: State::new(),
            reps: [0; NUM_REPS],
            prev_byte: 0,
            now_pos: 0,
            pos_state_mask: props.pos_state_mask(),
            match_price_count: 0,
            align_price_count: 0,
        }
    }

    /// Whether every buffered input byte has been coded.
    fn input_done(&self) -> bool {
        self.mf.is_exhausted() && self.mf.available() == 0
    }

    /// Code at least [`BLOCK_SIZE`] bytes, or the rest of the input.
    ///
    /// Returns `true` once the input is fully coded.
    fn code_one_block(&mut self) -> bool {
        let block_start = self.now_pos;

        if self.now_pos == 0 {
            if self.input_done() {
                return true;
            }
            // Nothing to refer back to yet.
            self.parser.read_match_distances(&mut self.mf);
            let byte = self.mf.byte_at(-(self.parser.additional_offset() as isize));
            self.rc
                .encode_bit(&mut self.model.is_match[self.state.value()][0], 0);
            let ctx = self.model.literal.context(0, 0);
            self.model.literal.encode(&mut self.rc, ctx, byte);
            self.state.update_literal();
            self.prev_byte = byte;
            self.parser.consume(1);
            self.now_pos = 1;
        }

        if self.input_done() {
            return true;
        }

        loop {
            let ctx = ParseContext {
                model: &self.model,
                prices: &self.prices,
                state: self.state,
                reps: self.reps,
                prev_byte: self.prev_byte,
            };
            let (len, back) = self.parser.get_optimum(&mut self.mf, &ctx, self.now_pos);

            let pos_state = (self.now_pos & self.pos_state_mask) as usize;
            let offset = self.parser.additional_offset() as isize;

            if len == 1 && back == LITERAL {
                self.encode_literal(pos_state, offset);
            } else {
                self.rc
                    .encode_bit(&mut self.model.is_match[self.state.value()][pos_state], 1);
                if back < NUM_REPS as u32 {
                    self.encode_rep(back as usize, len, pos_state);
                } else {
                    self.encode_match(back - NUM_REPS as u32, len, pos_state);
                }
                self.prev_byte = self.mf.byte_at(len as isize - 1 - offset);
            }

            self.parser.consume(len);
            self.now_pos += len as u64;

            if self.parser.additional_offset() == 0 {
                if self.match_price_count >= DIST_PRICE_INTERVAL {
                    self.prices.distance.fill_distance_prices(&self.model.distance);
                    self.match_price_count = 0;
                }
                if self.align_price_count >= ALIGN_PRICE_INTERVAL {
                    self.prices.distance.fill_align_prices(&self.model.distance);
                    self.align_price_count = 0;
                }
                if self.input_done() {
                    return true;
                }
                if self.now_pos - block_start >= BLOCK_SIZE {
                    return false;
                }
            }
        }
    }

    fn encode_literal(&mut self, pos_state: usize, offset: isize) {
        let state = self.state;
        self.rc
            .encode_bit(&mut self.model.is_match[state.value()][pos_state], 0);

        let byte = self.mf.byte_at(-offset);
        let ctx = self.model.literal.context(self.now_pos, self.prev_byte);
        if state.is_literal() {
            self.model.literal.encode(&mut self.rc, ctx, byte);
        } else {
            let match_byte = self.mf.byte_at(-(self.reps[0] as isize) - 1 - offset);
            self.model
                .literal
                .encode_matched(&mut self.rc, ctx, match_byte, byte);
        }

        self.state.update_literal();
        self.prev_byte = byte;
    }

    fn encode_rep(&mut self, rep_index: usize, len: u32, pos_state: usize) {
        let s = self.state.value();
        self.rc.encode_bit(&mut self.model.is_rep[s], 1);

        if rep_index == 0 {
            self.rc.encode_bit(&mut self.model.is_rep0[s], 0);
            self.rc
                .encode_bit(&mut self.model.is_rep0_long[s][pos_state], (len != 1) as u32);
        } else {
            self.rc.encode_bit(&mut self.model.is_rep0[s], 1);
            if rep_index == 1 {
                self.rc.encode_bit(&mut self.model.is_rep1[s], 0);
            } else {
                self.rc.encode_bit(&mut self.model.is_rep1[s], 1);
                self.rc
                    .encode_bit(&mut self.model.is_rep2[s], rep_index as u32 - 2);
            }
        }

        if len == 1 {
            self.state.update_short_rep();
        } else {
            self.prices.rep_len.encode(
                &mut self.model.rep_len,
                &mut self.rc,
                len - MATCH_LEN_MIN as u32,
                pos_state,
            );
            self.state.update_long_rep();
        }

        if rep_index != 0 {
            let dist = self.reps[rep_index];
            self.reps.copy_within(0..rep_index, 1);
            self.reps[0] = dist;
        }
    }

    fn encode_match(&mut self, dist: u32, len: u32, pos_state: usize) {
        self.rc
            .encode_bit(&mut self.model.is_rep[self.state.value()], 0);
        self.state.update_match();

        self.prices.match_len.encode(
            &mut self.model.match_len,
            &mut self.rc,
            len - MATCH_LEN_MIN as u32,
            pos_state,
        );
        if self.model.distance.encode(&mut self.rc, dist, len) {
            self.align_price_count += 1;
        }

        self.reps.copy_within(0..NUM_REPS - 1, 1);
        self.reps[0] = dist;
        self.match_price_count += 1;
    }

    /// Code a length-2 match at [`END_MARKER_DISTANCE`].
    fn write_end_marker(&mut self) {
        let pos_state = (self.now_pos & self.pos_state_mask) as usize;
        let s = self.state.value();
        self.rc.encode_bit(&mut self.model.is_match[s][pos_state], 1);
        self.rc.encode_bit(&mut self.model.is_rep[s], 0);
        self.state.update_match();

        let len = MATCH_LEN_MIN as u32;
        self.model
            .match_len
            .encode(&mut self.rc, len - MATCH_LEN_MIN as u32, pos_state);
        self.model
            .distance
            .encode(&mut self.rc, END_MARKER_DISTANCE, len);
    }
}
