//! Bit-tree coders.
//!
//! A bit tree codes an `n`-bit symbol one bit at a time, using the bits
//! seen so far as the probability context. Node 1 is the root and the
//! children of node `m` are `2m` and `2m + 1`, so a tree of `n` bits needs
//! `2^n` probabilities (index 0 is unused).
//!
//! Normal trees walk the symbol MSB first; reverse trees walk it LSB first.

use crate::price::bit_price;
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder};
use oxilzma_core::error::Result;
use std::io::Read;

/// A bit tree with its own probability array.
#[derive(Debug, Clone)]
pub struct BitTree {
    num_bits: u32,
    probs: Vec<u16>,
}

impl BitTree {
    /// Create a tree for `num_bits`-bit symbols.
    pub fn new(num_bits: u32) -> Self {
        Self {
            num_bits,
            probs: vec![PROB_INIT; 1 << num_bits],
        }
    }

    /// Number of bits per symbol.
    pub fn num_bits(&self) -> u32 {
        self.num_bits
    }

    /// Encode `symbol` MSB first.
    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32) {
        let mut m = 1usize;
        for i in (0..self.num_bits).rev() {
            let bit = (symbol >> i) & 1;
            rc.encode_bit(&mut self.probs[m], bit);
            m = (m << 1) | bit as usize;
        }
    }

    /// Decode an MSB-first symbol.
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>) -> Result<u32> {
        let mut m = 1usize;
        for _ in 0..self.num_bits {
            m = (m << 1) | rc.decode_bit(&mut self.probs[m])? as usize;
        }
        Ok(m as u32 - (1 << self.num_bits))
    }

    /// Encode `symbol` LSB first.
    pub fn reverse_encode(&mut self, rc: &mut RangeEncoder, symbol: u32) {
        reverse_encode_at(&mut self.probs, 1, self.num_bits, rc, symbol);
    }

    /// Decode an LSB-first symbol.
    pub fn reverse_decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>) -> Result<u32> {
        reverse_decode_at(&mut self.probs, 1, self.num_bits, rc)
    }

    /// Price of encoding `symbol` MSB first.
    pub fn price(&self, symbol: u32) -> u32 {
        let mut price = 0;
        let mut m = 1usize;
        for i in (0..self.num_bits).rev() {
            let bit = (symbol >> i) & 1;
            price += bit_price(self.probs[m], bit);
            m = (m << 1) | bit as usize;
        }
        price
    }

    /// Price of encoding `symbol` LSB first.
    pub fn reverse_price(&self, symbol: u32) -> u32 {
        reverse_price_at(&self.probs, 1, self.num_bits, symbol)
    }
}

/// Reverse-encode `symbol` with a tree embedded in a larger array.
///
/// Several small trees can share one array this way: node `m` of the tree
/// lives at `probs[root + m - 1]`, so `root` is the index of the root node.
pub fn reverse_encode_at(
    probs: &mut [u16],
    root: usize,
    num_bits: u32,
    rc: &mut RangeEncoder,
    mut symbol: u32,
) {
    let mut m = 1usize;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        rc.encode_bit(&mut probs[root + m - 1], bit);
        m = (m << 1) | bit as usize;
        symbol >>= 1;
    }
}

/// Reverse-decode a symbol with a tree rooted at `probs[root]`.
pub fn reverse_decode_at<R: Read>(
    probs: &mut [u16],
    root: usize,
    num_bits: u32,
    rc: &mut RangeDecoder<R>,
) -> Result<u32> {
    let mut m = 1usize;
    let mut symbol = 0u32;
    for i in 0..num_bits {
        let bit = rc.decode_bit(&mut probs[root + m - 1])?;
        m = (m << 1) | bit as usize;
        symbol |= bit << i;
    }
    Ok(symbol)
}

/// Price of reverse-encoding `symbol` with a tree rooted at `probs[root]`.
pub fn reverse_price_at(probs: &[u16], root: usize, num_bits: u32, mut symbol: u32) -> u32 {
    let mut price = 0;
    let mut m = 1usize;
    for _ in 0..num_bits {
        let bit = symbol & 1;
        price += bit_price(probs[root + m - 1], bit);
        m = (m << 1) | bit as usize;
        symbol >>= 1;
    }
    price
}
