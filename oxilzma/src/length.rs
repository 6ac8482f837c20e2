//! Match length coder.
//!
//! Lengths 2..=273 are coded as `len - 2`:
//!
//! | choice | choice2 | tree                  | symbols  |
//! |--------|---------|-----------------------|----------|
//! | 0      | -       | low\[pos_state\], 3 b  | 0..8     |
//! | 1      | 0       | mid\[pos_state\], 3 b  | 8..16    |
//! | 1      | 1       | high, 8 bits          | 16..272  |

use crate::bit_tree::BitTree;
use crate::model::{
    LEN_HIGH_BITS, LEN_LOW_BITS, LEN_LOW_SYMBOLS, LEN_MID_BITS, LEN_MID_SYMBOLS, LEN_SYMBOLS,
    POS_STATES_MAX,
};
use crate::price::{price0, price1};
use crate::range_coder::{PROB_INIT, RangeDecoder, RangeEncoder};
use oxilzma_core::error::Result;
use std::io::Read;

/// Length coder probabilities.
#[derive(Debug, Clone)]
pub struct LengthCoder {
    choice: u16,
    choice2: u16,
    low: Vec<BitTree>,
    mid: Vec<BitTree>,
    high: BitTree,
}

impl LengthCoder {
    /// Create a coder for `num_pos_states` position states.
    pub fn new(num_pos_states: usize) -> Self {
        Self {
            choice: PROB_INIT,
            choice2: PROB_INIT,
            low: (0..num_pos_states).map(|_| BitTree::new(LEN_LOW_BITS)).collect(),
            mid: (0..num_pos_states).map(|_| BitTree::new(LEN_MID_BITS)).collect(),
            high: BitTree::new(LEN_HIGH_BITS),
        }
    }

    /// Encode length symbol `symbol` (`len - 2`).
    pub fn encode(&mut self, rc: &mut RangeEncoder, symbol: u32, pos_state: usize) {
        let symbol = symbol as usize;
        if symbol < LEN_LOW_SYMBOLS {
            rc.encode_bit(&mut self.choice, 0);
            self.low[pos_state].encode(rc, symbol as u32);
        } else if symbol < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
            rc.encode_bit(&mut self.choice, 1);
            rc.encode_bit(&mut self.choice2, 0);
            self.mid[pos_state].encode(rc, (symbol - LEN_LOW_SYMBOLS) as u32);
        } else {
            rc.encode_bit(&mut self.choice, 1);
            rc.encode_bit(&mut self.choice2, 1);
            self.high
                .encode(rc, (symbol - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32);
        }
    }

    /// Decode a length symbol (`len - 2`).
    pub fn decode<R: Read>(&mut self, rc: &mut RangeDecoder<R>, pos_state: usize) -> Result<u32> {
        if rc.decode_bit(&mut self.choice)? == 0 {
            self.low[pos_state].decode(rc)
        } else if rc.decode_bit(&mut self.choice2)? == 0 {
            Ok(LEN_LOW_SYMBOLS as u32 + self.mid[pos_state].decode(rc)?)
        } else {
            Ok((LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS) as u32 + self.high.decode(rc)?)
        }
    }

    /// Price of a single symbol, computed from the current probabilities.
    pub fn price(&self, symbol: u32, pos_state: usize) -> u32 {
        let symbol = symbol as usize;
        if symbol < LEN_LOW_SYMBOLS {
            price0(self.choice) + self.low[pos_state].price(symbol as u32)
        } else if symbol < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
            price1(self.choice)
                + price0(self.choice2)
                + self.mid[pos_state].price((symbol - LEN_LOW_SYMBOLS) as u32)
        } else {
            price1(self.choice)
                + price1(self.choice2)
                + self
                    .high
                    .price((symbol - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32)
        }
    }

    /// Fill `prices[..num_symbols]` for `pos_state`.
    fn set_prices(&self, pos_state: usize, num_symbols: usize, prices: &mut [u32]) {
        let a0 = price0(self.choice);
        let a1 = price1(self.choice);
        let b0 = a1 + price0(self.choice2);
        let b1 = a1 + price1(self.choice2);

        for (i, price) in prices.iter_mut().enumerate().take(num_symbols) {
            *price = if i < LEN_LOW_SYMBOLS {
                a0 + self.low[pos_state].price(i as u32)
            } else if i < LEN_LOW_SYMBOLS + LEN_MID_SYMBOLS {
                b0 + self.mid[pos_state].price((i - LEN_LOW_SYMBOLS) as u32)
            } else {
                b1 + self
                    .high
                    .price((i - LEN_LOW_SYMBOLS - LEN_MID_SYMBOLS) as u32)
            };
        }
    }
}

/// Cached length prices for the optimal parser.
///
/// Each position state's row is recomputed after it has been used for
/// `table_size` encodes.
#[derive(Debug, Clone)]
pub struct LengthPrices {
    table_size: usize,
    prices: Vec<u32>,
    counters: [usize; POS_STATES_MAX],
}

impl LengthPrices {
    /// Create a table covering symbols `0..table_size`.
    pub fn new(table_size: usize) -> Self {
        let table_size = table_size.min(LEN_SYMBOLS);
        Self {
            table_size,
            prices: vec![0; POS_STATES_MAX * LEN_SYMBOLS],
            counters: [0; POS_STATES_MAX],
        }
    }

    /// Recompute the row for `pos_state`.
    pub fn update_table(&mut self, coder: &LengthCoder, pos_state: usize) {
        let start = pos_state * LEN_SYMBOLS;
        coder.set_prices(
            pos_state,
            self.table_size,
            &mut self.prices[start..start + LEN_SYMBOLS],
        );
        self.counters[pos_state] = self.table_size;
    }

    /// Recompute the rows for the first `num_pos_states` position states.
    pub fn update_tables(&mut self, coder: &LengthCoder, num_pos_states: usize) {
        for pos_state in 0..num_pos_states {
            self.update_table(coder, pos_state);
        }
    }

    /// Price of `symbol` in `pos_state`.
    #[inline]
    pub fn price(&self, coder: &LengthCoder, symbol: u32, pos_state: usize) -> u32 {
        if (symbol as usize) < self.table_size {
            self.prices[pos_state * LEN_SYMBOLS + symbol as usize]
        } else {
            coder.price(symbol, pos_state)
        }
    }

    /// Encode through `coder` and refresh the row when its counter runs out.
    pub fn encode(
        &mut self,
        coder: &mut LengthCoder,
        rc: &mut RangeEncoder,
        symbol: u32,
        pos_state: usize,
    ) {
        coder.encode(rc, symbol, pos_state);
        self.counters[pos_state] = self.counters[pos_state].saturating_sub(1);
        if self.counters[pos_state] == 0 {
            self.update_table(coder, pos_state);
        }
    }
}
