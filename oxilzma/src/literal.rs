//! Literal coder.
//!
//! Each literal is coded with one of `2^(lc + lp)` 0x300-entry probability
//! tables, chosen by the low `lp` bits of the position and the high `lc`
//! bits of the previous byte. A table holds three 8-bit trees: the plain
//! tree at `1..0x100`, and two "matched" trees at `0x100..0x300` used while
//! the coded bits agree with the byte at distance rep0.

use crate::price::bit_price;
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder};
use oxilzma_core::error::Result;
use std::io::Read;

/// Probabilities per literal context.
pub const LITERAL_CODER_SIZE: usize = 0x300;

/// Literal probability tables for every context.
#[derive(Debug, Clone)]
pub struct LiteralCoder {
    probs: Vec<[u16; LITERAL_CODER_SIZE]>,
    lc: u32,
    lp_mask: u64,
}

impl LiteralCoder {
    /// Create the tables for `lc` context bits and `lp` position bits.
    pub fn new(lc: u32, lp: u32) -> Self {
        Self {
            probs: vec![[PROB_INIT; LITERAL_CODER_SIZE]; 1 << (lc + lp)],
            lc,
            lp_mask: (1 << lp) - 1,
        }
    }

    /// Select the table for position `pos` following `prev_byte`.
    #[inline]
    pub fn context(&self, pos: u64, prev_byte: u8) -> usize {
        (((pos & self.lp_mask) as usize) << self.lc) + ((prev_byte as usize) >> (8 - self.lc))
    }

    /// Encode `symbol` with the plain tree.
    pub fn encode(&mut self, rc: &mut RangeEncoder, ctx: usize, symbol: u8) {
        let probs = &mut self.probs[ctx];
        let mut context = 1usize;
        for i in (0..8).rev() {
            let bit = ((symbol >> i) & 1) as u32;
            rc.encode_bit(&mut probs[context], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Encode `symbol` using `match_byte` as extra context.
    pub fn encode_matched(&mut self, rc: &mut RangeEncoder, ctx: usize, match_byte: u8, symbol: u8) {
        let probs = &mut self.probs[ctx];
        let mut context = 1usize;
        let mut same = true;
        for i in (0..8).rev() {
            let bit = ((symbol >> i) & 1) as u32;
            let mut index = context;
            if same {
                let match_bit = ((match_byte >> i) & 1) as usize;
                index += (1 + match_bit) << 8;
                same = match_bit as u32 == bit;
            }
            rc.encode_bit(&mut probs[index], bit);
            context = (context << 1) | bit as usize;
        }
    }

    /// Decode a literal with the plain tree.
    pub fn decode_normal<R: Read>(&mut self, rc: &mut RangeDecoder<R>, ctx: usize) -> Result<u8> {
        let probs = &mut self.probs[ctx];
        let mut symbol = 1usize;
        while symbol < 0x100 {
            symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
        }
        Ok(symbol as u8)
    }

    /// Decode a literal coded with [`LiteralCoder::encode_matched`].
    pub fn decode_with_match_byte<R: Read>(
        &mut self,
        rc: &mut RangeDecoder<R>,
        ctx: usize,
        match_byte: u8,
    ) -> Result<u8> {
        let probs = &mut self.probs[ctx];
        let mut match_byte = match_byte as usize;
        let mut symbol = 1usize;

        while symbol < 0x100 {
            let match_bit = (match_byte >> 7) & 1;
            match_byte <<= 1;
            let bit = rc.decode_bit(&mut probs[((1 + match_bit) << 8) + symbol])? as usize;
            symbol = (symbol << 1) | bit;

            if match_bit != bit {
                // Diverged from the match byte; finish with the plain tree.
                while symbol < 0x100 {
                    symbol = (symbol << 1) | rc.decode_bit(&mut probs[symbol])? as usize;
                }
                break;
            }
        }

        Ok(symbol as u8)
    }

    /// Price of coding `symbol` in context `ctx`, matched or plain.
    pub fn price(&self, ctx: usize, matched: bool, match_byte: u8, symbol: u8) -> u32 {
        let probs = &self.probs[ctx];
        let mut price = 0;
        let mut context = 1usize;
        let mut i = 8;

        if matched {
            while i > 0 {
                i -= 1;
                let match_bit = ((match_byte >> i) & 1) as usize;
                let bit = ((symbol >> i) & 1) as u32;
                price += bit_price(probs[((1 + match_bit) << 8) + context], bit);
                context = (context << 1) | bit as usize;
                if match_bit as u32 != bit {
                    break;
                }
            }
        }

        while i > 0 {
            i -= 1;
            let bit = ((symbol >> i) & 1) as u32;
            price += bit_price(probs[context], bit);
            context = (context << 1) | bit as usize;
        }

        price
    }
}
