//! LZMA probability models.
//!
//! LZMA uses context-dependent probability models for:
//! - Literal encoding (context = previous byte + position)
//! - Match length encoding
//! - Distance encoding
//! - State machine transitions

use crate::distance::DistanceCoder;
use crate::length::LengthCoder;
use crate::literal::LiteralCoder;
use crate::price::{bit_price, price0, price1};
use crate::range_coder::PROB_INIT;

/// Number of literal context bits (default: 3).
pub const LC_DEFAULT: u32 = 3;

/// Number of literal position bits (default: 0).
pub const LP_DEFAULT: u32 = 0;

/// Number of position bits (default: 2).
pub const PB_DEFAULT: u32 = 2;

/// Maximum number of position states.
pub const POS_STATES_MAX: usize = 1 << 4;

/// Number of states in the LZMA state machine.
pub const NUM_STATES: usize = 12;

/// Number of rep distances remembered.
pub const NUM_REPS: usize = 4;

/// Number of bits for low length coding.
pub const LEN_LOW_BITS: u32 = 3;
/// Number of bits for mid length coding.
pub const LEN_MID_BITS: u32 = 3;
/// Number of bits for high length coding.
pub const LEN_HIGH_BITS: u32 = 8;

/// Number of low length symbols.
pub const LEN_LOW_SYMBOLS: usize = 1 << LEN_LOW_BITS;
/// Number of mid length symbols.
pub const LEN_MID_SYMBOLS: usize = 1 << LEN_MID_BITS;
/// Number of high length symbols.
pub const LEN_HIGH_SYMBOLS: usize = 1 << LEN_HIGH_BITS;
/// Total number of length symbols.
pub const LEN_SYMBOLS: usize = LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS + LEN_HIGH_SYMBOLS;

/// Minimum match length.
pub const MATCH_LEN_MIN: usize = 2;

/// Maximum match length.
pub const MATCH_LEN_MAX: usize = MATCH_LEN_MIN + LEN_SYMBOLS - 1;

/// Number of bits in a distance slot.
pub const DIST_SLOT_BITS: u32 = 6;

/// Number of distance slots.
pub const DIST_SLOTS: usize = 1 << DIST_SLOT_BITS;

/// Number of slot trees, selected by match length.
pub const LEN_TO_POS_STATES: usize = 4;

/// Number of alignment bits for distance encoding.
pub const DIST_ALIGN_BITS: u32 = 4;
/// Size of alignment table.
pub const DIST_ALIGN_SIZE: usize = 1 << DIST_ALIGN_BITS;

/// First slot with footer bits.
pub const START_POS_MODEL_INDEX: usize = 4;

/// First slot whose footer uses direct bits.
pub const END_POS_MODEL_INDEX: usize = 14;

/// Number of distances covered by the slot and special models alone.
pub const FULL_DISTANCES: usize = 1 << (END_POS_MODEL_INDEX / 2);

/// LZMA state machine state.
///
/// States 0..7 mean the previous packet was a literal; 7..12 mean it was a
/// match or rep of some kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct State(u8);

impl State {
    /// Initial state.
    pub const fn new() -> Self {
        Self(0)
    }

    /// Get state value.
    pub fn value(self) -> usize {
        self.0 as usize
    }

    /// Check if state represents a literal.
    pub fn is_literal(self) -> bool {
        self.0 < 7
    }

    /// Update state after literal.
    pub fn update_literal(&mut self) {
        self.0 = match self.0 {
            0..=3 => 0,
            4..=9 => self.0 - 3,
            _ => self.0 - 6,
        };
    }

    /// Update state after match.
    pub fn update_match(&mut self) {
        self.0 = if self.0 < 7 { 7 } else { 10 };
    }

    /// Update state after short rep.
    pub fn update_short_rep(&mut self) {
        self.0 = if self.0 < 7 { 9 } else { 11 };
    }

    /// Update state after long rep.
    pub fn update_long_rep(&mut self) {
        self.0 = if self.0 < 7 { 8 } else { 11 };
    }
}

/// LZMA properties (lc, lp, pb).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LzmaProperties {
    /// Literal context bits.
    pub lc: u32,
    /// Literal position bits.
    pub lp: u32,
    /// Position bits.
    pub pb: u32,
}

impl LzmaProperties {
    /// Create new properties.
    pub fn new(lc: u32, lp: u32, pb: u32) -> Self {
        Self { lc, lp, pb }
    }

    /// Parse from property byte.
    ///
    /// Returns `None` for bytes `>= 225`, which cannot encode valid
    /// `lc <= 8`, `lp <= 4`, `pb <= 4`.
    pub fn from_byte(byte: u8) -> Option<Self> {
        if byte >= 9 * 5 * 5 {
            return None;
        }
        let byte = byte as u32;
        Some(Self {
            lc: byte % 9,
            lp: (byte / 9) % 5,
            pb: byte / 45,
        })
    }

    /// Encode to property byte.
    pub fn to_byte(&self) -> u8 {
        ((self.pb * 5 + self.lp) * 9 + self.lc) as u8
    }

    /// Get number of literal states.
    pub fn num_lit_states(&self) -> usize {
        1 << (self.lc + self.lp)
    }

    /// Get number of position states.
    pub fn num_pos_states(&self) -> usize {
        1 << self.pb
    }

    /// Mask selecting the position-state bits of a position.
    pub fn pos_state_mask(&self) -> u64 {
        (1 << self.pb) - 1
    }
}

impl Default for LzmaProperties {
    fn default() -> Self {
        Self {
            lc: LC_DEFAULT,
            lp: LP_DEFAULT,
            pb: PB_DEFAULT,
        }
    }
}

/// Complete LZMA model containing all probability tables.
#[derive(Debug, Clone)]
pub struct LzmaModel {
    /// LZMA properties.
    pub props: LzmaProperties,

    /// Is-match probabilities.
    pub is_match: [[u16; POS_STATES_MAX]; NUM_STATES],
    /// Is-rep probabilities.
    pub is_rep: [u16; NUM_STATES],
    /// Is-rep0 probabilities.
    pub is_rep0: [u16; NUM_STATES],
    /// Is-rep1 probabilities.
    pub is_rep1: [u16; NUM_STATES],
    /// Is-rep2 probabilities.
    pub is_rep2: [u16; NUM_STATES],
    /// Is-rep0-long probabilities.
    pub is_rep0_long: [[u16; POS_STATES_MAX]; NUM_STATES],

    /// Match length coder.
    pub match_len: LengthCoder,
    /// Rep match length coder.
    pub rep_len: LengthCoder,

    /// Literal coder.
    pub literal: LiteralCoder,

    /// Distance coder.
    pub distance: DistanceCoder,
}

impl LzmaModel {
    /// Create a new LZMA model with the given properties.
    pub fn new(props: LzmaProperties) -> Self {
        let num_pos_states = props.num_pos_states();

        Self {
            props,
            is_match: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            is_rep: [PROB_INIT; NUM_STATES],
            is_rep0: [PROB_INIT; NUM_STATES],
            is_rep1: [PROB_INIT; NUM_STATES],
            is_rep2: [PROB_INIT; NUM_STATES],
            is_rep0_long: [[PROB_INIT; POS_STATES_MAX]; NUM_STATES],
            match_len: LengthCoder::new(num_pos_states),
            rep_len: LengthCoder::new(num_pos_states),
            literal: LiteralCoder::new(props.lc, props.lp),
            distance: DistanceCoder::new(),
        }
    }

    /// Price of the is-match decision.
    #[inline]
    pub fn is_match_price(&self, state: State, pos_state: usize, is_match: bool) -> u32 {
        bit_price(self.is_match[state.value()][pos_state], is_match as u32)
    }

    /// Price of the is-rep decision.
    #[inline]
    pub fn is_rep_price(&self, state: State, is_rep: bool) -> u32 {
        bit_price(self.is_rep[state.value()], is_rep as u32)
    }

    /// Price of the bits selecting a short rep (rep0, one byte).
    #[inline]
    pub fn short_rep_price(&self, state: State, pos_state: usize) -> u32 {
        price0(self.is_rep0[state.value()]) + price0(self.is_rep0_long[state.value()][pos_state])
    }

    /// Price of the bits selecting long rep `rep_index`, excluding the length.
    pub fn pure_rep_price(&self, rep_index: usize, state: State, pos_state: usize) -> u32 {
        let s = state.value();
        if rep_index == 0 {
            price0(self.is_rep0[s]) + price1(self.is_rep0_long[s][pos_state])
        } else {
            let mut price = price1(self.is_rep0[s]);
            if rep_index == 1 {
                price += price0(self.is_rep1[s]);
            } else {
                price += price1(self.is_rep1[s]);
                price += bit_price(self.is_rep2[s], rep_index as u32 - 2);
            }
            price
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut state = State::new();
        assert!(state.is_literal());

        state.update_match();
        assert!(!state.is_literal());
        assert_eq!(state.value(), 7);

        state.update_literal();
        assert!(state.is_literal());
        assert_eq!(state.value(), 4);
    }

    #[test]
    fn test_state_table() {
        let after_literal = [0, 0, 0, 0, 1, 2, 3, 4, 5, 6, 4, 5];
        let after_match = [7, 7, 7, 7, 7, 7, 7, 10, 10, 10, 10, 10];
        let after_long_rep = [8, 8, 8, 8, 8, 8, 8, 11, 11, 11, 11, 11];
        let after_short_rep = [9, 9, 9, 9, 9, 9, 9, 11, 11, 11, 11, 11];

        for s in 0..NUM_STATES {
            let state = State(s as u8);

            let mut next = state;
            next.update_literal();
            assert_eq!(next.value(), after_literal[s]);

            let mut next = state;
            next.update_match();
            assert_eq!(next.value(), after_match[s]);

            let mut next = state;
            next.update_long_rep();
            assert_eq!(next.value(), after_long_rep[s]);

            let mut next = state;
            next.update_short_rep();
            assert_eq!(next.value(), after_short_rep[s]);
        }
    }

    #[test]
    fn test_properties_encoding() {
        let props = LzmaProperties::new(3, 0, 2);
        assert_eq!(props.to_byte(), 0x5D);
        let decoded = LzmaProperties::from_byte(0x5D).unwrap();
        assert_eq!(decoded, props);
    }

    #[test]
    fn test_properties_all_bytes() {
        for byte in 0..=255u8 {
            match LzmaProperties::from_byte(byte) {
                Some(props) => {
                    assert!(byte < 225);
                    assert!(props.lc <= 8 && props.lp <= 4 && props.pb <= 4);
                    assert_eq!(props.to_byte(), byte);
                }
                None => assert!(byte >= 225),
            }
        }
    }

    #[test]
    fn test_default_properties() {
        let props = LzmaProperties::default();
        assert_eq!(props.lc, 3);
        assert_eq!(props.lp, 0);
        assert_eq!(props.pb, 2);
        assert_eq!(props.pos_state_mask(), 3);
    }

    #[test]
    fn test_new_model_starts_even() {
        let model = LzmaModel::new(LzmaProperties::default());
        let tables = [&model.is_rep, &model.is_rep0, &model.is_rep1, &model.is_rep2];
        assert!(tables.iter().all(|t| t.iter().all(|&p| p == PROB_INIT)));
        assert!(model.is_match.iter().flatten().all(|&p| p == PROB_INIT));
        assert!(model.is_rep0_long.iter().flatten().all(|&p| p == PROB_INIT));
        let state = State::new();
        assert_eq!(model.is_match_price(state, 0, true), model.is_match_price(state, 0, false));
    }

    #[test]
    fn test_constants() {
        assert_eq!(LEN_SYMBOLS, 272);
        assert_eq!(MATCH_LEN_MAX, 273);
        assert_eq!(FULL_DISTANCES, 128);
    }

    #[test]
    fn test_rep_prices_untrained() {
        let model = LzmaModel::new(LzmaProperties::default());
        let state = State::new();
        assert_eq!(model.short_rep_price(state, 0), 128);
        assert_eq!(model.pure_rep_price(0, state, 1), 128);
        assert_eq!(model.pure_rep_price(1, state, 1), 128);
        assert_eq!(model.pure_rep_price(3, state, 1), 192);
        assert_eq!(model.is_match_price(state, 0, true), 64);
    }
}
