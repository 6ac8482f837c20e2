//! Bit prices for the optimal parser.
//!
//! A price approximates `-log2(P)` of coding a bit, in units of 1/64 bit.
//! Probabilities are quantized to 9 bits before the lookup.

use crate::range_coder::{PROB_BITS, PROB_MAX};

/// Bits dropped from a probability before the table lookup.
const MOVE_REDUCING_BITS: u32 = 2;

/// Fixed-point shift of a price (1 bit = 64).
pub const BIT_PRICE_SHIFT_BITS: u32 = 6;

/// Price assigned to unreachable optimum nodes.
pub const INFINITY_PRICE: u32 = 0x0FFF_FFFF;

const PRICE_TABLE_BITS: u32 = PROB_BITS - MOVE_REDUCING_BITS;

/// Price of a 0 bit for each quantized probability.
pub const PROB_PRICES: [u32; 1 << PRICE_TABLE_BITS] = {
    let mut table = [0u32; 1 << PRICE_TABLE_BITS];
    let mut i = PRICE_TABLE_BITS as i32 - 1;
    while i >= 0 {
        let shift = PRICE_TABLE_BITS - i as u32 - 1;
        let start = 1usize << shift;
        let end = 1usize << (shift + 1);
        let mut j = start;
        while j < end {
            table[j] = ((i as u32) << BIT_PRICE_SHIFT_BITS)
                + ((((end - j) as u32) << BIT_PRICE_SHIFT_BITS) >> shift);
            j += 1;
        }
        i -= 1;
    }
    table
};

/// Price of coding a 0 with probability `prob`.
#[inline]
pub fn price0(prob: u16) -> u32 {
    PROB_PRICES[(prob >> MOVE_REDUCING_BITS) as usize]
}

/// Price of coding a 1 with probability `prob`.
#[inline]
pub fn price1(prob: u16) -> u32 {
    PROB_PRICES[((PROB_MAX - prob) >> MOVE_REDUCING_BITS) as usize]
}

/// Price of coding `bit` with probability `prob`.
#[inline]
pub fn bit_price(prob: u16, bit: u32) -> u32 {
    if bit == 0 { price0(prob) } else { price1(prob) }
}

/// Price of `count` bits coded with fixed probability.
#[inline]
pub fn direct_bits_price(count: u32) -> u32 {
    count << BIT_PRICE_SHIFT_BITS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range_coder::PROB_INIT;

    #[test]
    fn test_even_probability_is_one_bit() {
        assert_eq!(price0(PROB_INIT), 64);
        assert_eq!(price1(PROB_INIT), 64);
        assert_eq!(direct_bits_price(5), 5 * 64);
    }

    #[test]
    fn test_prices_are_monotonic() {
        // Higher probability of zero means a cheaper zero.
        for p in (8..PROB_MAX - 8).step_by(4) {
            assert!(price0(p) >= price0(p + 4));
            assert!(price1(p) <= price1(p + 4));
        }
    }

    #[test]
    fn test_skewed_prices() {
        let likely = PROB_MAX - 64;
        assert!(price0(likely) < 8);
        assert!(price1(likely) >= 5 * 64);
        assert_eq!(bit_price(likely, 0), price0(likely));
        assert_eq!(bit_price(likely, 1), price1(likely));
    }
}
