//! Match distance coder.
//!
//! A zero-based distance is split into a 6-bit position slot and footer
//! bits. Slots 0..4 are the distance itself. Slots 4..14 code their footer
//! with small reverse trees packed into one shared array. Larger slots send
//! the footer as direct bits followed by 4 reverse-coded alignment bits.
//! The slot tree is chosen by the match length (2, 3, 4, 5+).

use crate::bit_tree::{BitTree, reverse_decode_at, reverse_encode_at, reverse_price_at};
use crate::model::{
    DIST_ALIGN_BITS, DIST_ALIGN_SIZE, DIST_SLOT_BITS, DIST_SLOTS, END_POS_MODEL_INDEX,
    FULL_DISTANCES, LEN_TO_POS_STATES, MATCH_LEN_MIN, START_POS_MODEL_INDEX,
};
use crate::price::{BIT_PRICE_SHIFT_BITS, direct_bits_price};
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder};
use oxilzma_core::error::Result;
use std::io::Read;

/// Distance value that marks the end of the stream.
pub const END_MARKER_DISTANCE: u32 = 0xFFFF_FFFF;

const ALIGN_MASK: u32 = DIST_ALIGN_SIZE as u32 - 1;

/// Position slot of a zero-based distance.
#[inline]
pub fn pos_slot(dist: u32) -> u32 {
    if dist < START_POS_MODEL_INDEX as u32 {
        return dist;
    }
    let n = 31 - dist.leading_zeros();
    (n << 1) | ((dist >> (n - 1)) & 1)
}

/// Slot tree selector for a match of `len` bytes.
#[inline]
pub fn len_to_pos_state(len: u32) -> usize {
    (len as usize - MATCH_LEN_MIN).min(LEN_TO_POS_STATES - 1)
}

/// Footer bit count and base distance of a slot `>= 4`.
#[inline]
fn slot_base(slot: u32) -> (u32, u32) {
    let footer_bits = (slot >> 1) - 1;
    (footer_bits, (2 | (slot & 1)) << footer_bits)
}

/// Distance coder probabilities.
#[derive(Debug, Clone)]
pub struct DistanceCoder {
    pos_slot: Vec<BitTree>,
    special: [u16; FULL_DISTANCES - END_POS_MODEL_INDEX],
    align: BitTree,
}

impl DistanceCoder {
    /// Create a coder with all probabilities at 50%.
    pub fn new() -> Self {
        Self {
            pos_slot: (0..LEN_TO_POS_STATES)
                .map(|_| BitTree::new(DIST_SLOT_BITS))
                .collect(),
            special: [PROB_INIT; FULL_DISTANCES - END_POS_MODEL_INDEX],
            align: BitTree::new(DIST_ALIGN_BITS),
        }
    }

    /// Encode `dist` for a match of `len` bytes.
    ///
    /// Returns `true` when the alignment tree was used.
    pub fn encode(&mut self, rc: &mut RangeEncoder, dist: u32, len: u32) -> bool {
        let slot = pos_slot(dist);
        self.pos_slot[len_to_pos_state(len)].encode(rc, slot);

        if slot < START_POS_MODEL_INDEX as u32 {
            return false;
        }

        let (footer_bits, base) = slot_base(slot);
        let reduced = dist - base;

        if slot < END_POS_MODEL_INDEX as u32 {
            reverse_encode_at(
                &mut self.special,
                (base - slot) as usize,
                footer_bits,
                rc,
                reduced,
            );
            false
        } else {
            rc.encode_direct_bits(reduced >> DIST_ALIGN_BITS, footer_bits - DIST_ALIGN_BITS);
            self.align.reverse_encode(rc, reduced & ALIGN_MASK);
            true
        }
    }

    /// Decode a distance for a match of `len` bytes.
    ///
    /// May return [`END_MARKER_DISTANCE`].
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, len: u32) -> Result<u32> {
        let slot = self.pos_slot[len_to_pos_state(len)].decode(rc)?;

        if slot < START_POS_MODEL_INDEX as u32 {
            return Ok(slot);
        }

        let (footer_bits, base) = slot_base(slot);

        if slot < END_POS_MODEL_INDEX as u32 {
            let reduced = reverse_decode_at(
                &mut self.special,
                (base - slot) as usize,
                footer_bits,
                rc,
            )?;
            Ok(base + reduced)
        } else {
            let direct = rc.decode_direct_bits(footer_bits - DIST_ALIGN_BITS)?;
            let align = self.align.reverse_decode(rc)?;
            Ok(base + (direct << DIST_ALIGN_BITS) + align)
        }
    }
}

impl Default for DistanceCoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached distance prices for the optimal parser.
#[derive(Debug, Clone)]
pub struct DistancePrices {
    dist_table_size: u32,
    slot_prices: Vec<u32>,
    distance_prices: Vec<u32>,
    align_prices: [u32; DIST_ALIGN_SIZE],
}

impl DistancePrices {
    /// Create tables for distances below `dict_size`.
    pub fn new(dict_size: u32) -> Self {
        let mut dict_log = 0;
        while dict_log < DIST_SLOTS as u32 / 2 && (1u64 << dict_log) < dict_size as u64 {
            dict_log += 1;
        }
        Self {
            dist_table_size: (dict_log * 2).min(DIST_SLOTS as u32),
            slot_prices: vec![0; LEN_TO_POS_STATES * DIST_SLOTS],
            distance_prices: vec![0; LEN_TO_POS_STATES * FULL_DISTANCES],
            align_prices: [0; DIST_ALIGN_SIZE],
        }
    }

    /// Recompute slot and short-distance prices.
    pub fn fill_distance_prices(&mut self, coder: &DistanceCoder) {
        let mut footer_prices = [0u32; FULL_DISTANCES];
        for (dist, price) in footer_prices
            .iter_mut()
            .enumerate()
            .skip(START_POS_MODEL_INDEX)
        {
            let slot = pos_slot(dist as u32);
            let (footer_bits, base) = slot_base(slot);
            *price = reverse_price_at(
                &coder.special,
                (base - slot) as usize,
                footer_bits,
                dist as u32 - base,
            );
        }

        for len_state in 0..LEN_TO_POS_STATES {
            let tree = &coder.pos_slot[len_state];
            let slots = &mut self.slot_prices[len_state * DIST_SLOTS..][..DIST_SLOTS];

            for slot in 0..self.dist_table_size {
                let mut price = tree.price(slot);
                if slot >= END_POS_MODEL_INDEX as u32 {
                    price += ((slot >> 1) - 1 - DIST_ALIGN_BITS) << BIT_PRICE_SHIFT_BITS;
                }
                slots[slot as usize] = price;
            }

            let dists = &mut self.distance_prices[len_state * FULL_DISTANCES..][..FULL_DISTANCES];
            for (dist, price) in dists.iter_mut().enumerate() {
                *price = if dist < START_POS_MODEL_INDEX {
                    slots[dist]
                } else {
                    slots[pos_slot(dist as u32) as usize] + footer_prices[dist]
                };
            }
        }
    }

    /// Recompute alignment prices.
    pub fn fill_align_prices(&mut self, coder: &DistanceCoder) {
        for (i, price) in self.align_prices.iter_mut().enumerate() {
            *price = coder.align.reverse_price(i as u32);
        }
    }

    /// Price of distance `dist` for a match of `len` bytes.
    #[inline]
    pub fn price(&self, dist: u32, len: u32) -> u32 {
        let len_state = len_to_pos_state(len);
        if (dist as usize) < FULL_DISTANCES {
            self.distance_prices[len_state * FULL_DISTANCES + dist as usize]
        } else {
            let slot = pos_slot(dist);
            if slot >= self.dist_table_size {
                // Beyond the dictionary; never chosen.
                return direct_bits_price(DIST_SLOTS as u32);
            }
            self.slot_prices[len_state * DIST_SLOTS + slot as usize]
                + self.align_prices[(dist & ALIGN_MASK) as usize]
        }
    }
}
