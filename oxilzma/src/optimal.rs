//! Optimal parsing for LZMA compression.
//!
//! Instead of taking the longest match at every position, the parser builds
//! a lattice over the next few thousand positions. Node `i` holds the
//! cheapest known way (in estimated bits) to code the first `i` bytes,
//! together with the coder state and rep distances that path leaves behind.
//! Nodes are relaxed forward with literals, short reps, rep matches, fresh
//! matches and three two-step combinations:
//!
//! - literal followed by rep0
//! - rep match, literal, rep0
//! - match, literal, rep0
//!
//! When the sweep ends the cheapest path is traced back and replayed one
//! token per call.

use crate::distance::DistancePrices;
use crate::length::LengthPrices;
use crate::match_finder::MatchFinder;
use crate::model::{LzmaModel, MATCH_LEN_MAX, MATCH_LEN_MIN, NUM_REPS, State};
use crate::price::INFINITY_PRICE;

/// Number of lattice nodes.
pub const NUM_OPTS: usize = 1 << 12;

/// `back` value of a literal token.
pub const LITERAL: u32 = u32::MAX;

/// Cached prices shared by the parser and the encoder.
#[derive(Debug, Clone)]
pub struct PriceTables {
    /// Match length prices.
    pub match_len: LengthPrices,
    /// Rep match length prices.
    pub rep_len: LengthPrices,
    /// Distance prices.
    pub distance: DistancePrices,
}

impl PriceTables {
    /// Create tables for the given dictionary size and fast bytes.
    pub fn new(dict_size: u32, fast_bytes: u32) -> Self {
        let table_size = (fast_bytes as usize + 1).saturating_sub(MATCH_LEN_MIN);
        Self {
            match_len: LengthPrices::new(table_size),
            rep_len: LengthPrices::new(table_size),
            distance: DistancePrices::new(dict_size),
        }
    }

    /// Recompute every table from `model`.
    pub fn refresh_all(&mut self, model: &LzmaModel) {
        let num_pos_states = model.props.num_pos_states();
        self.distance.fill_distance_prices(&model.distance);
        self.distance.fill_align_prices(&model.distance);
        self.match_len.update_tables(&model.match_len, num_pos_states);
        self.rep_len.update_tables(&model.rep_len, num_pos_states);
    }

    /// Price of rep `rep_index` with length `len`, excluding is-match/is-rep.
    #[inline]
    pub fn rep_price(
        &self,
        model: &LzmaModel,
        rep_index: usize,
        len: u32,
        state: State,
        pos_state: usize,
    ) -> u32 {
        self.rep_len
            .price(&model.rep_len, len - MATCH_LEN_MIN as u32, pos_state)
            + model.pure_rep_price(rep_index, state, pos_state)
    }

    /// Price of a fresh match, excluding is-match/is-rep.
    #[inline]
    pub fn match_price(&self, model: &LzmaModel, dist: u32, len: u32, pos_state: usize) -> u32 {
        self.distance.price(dist, len)
            + self
                .match_len
                .price(&model.match_len, len - MATCH_LEN_MIN as u32, pos_state)
    }
}

/// Coder state the parser prices against.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext<'a> {
    /// Current probabilities.
    pub model: &'a LzmaModel,
    /// Cached prices.
    pub prices: &'a PriceTables,
    /// State before the next token.
    pub state: State,
    /// Rep distances before the next token.
    pub reps: [u32; NUM_REPS],
    /// Byte preceding the next token.
    pub prev_byte: u8,
}

/// Lattice node.
#[derive(Debug, Clone, Copy, Default)]
struct Optimal {
    state: State,
    prev1_is_char: bool,
    prev2: bool,
    pos_prev2: u32,
    back_prev2: u32,
    price: u32,
    pos_prev: u32,
    back_prev: u32,
    reps: [u32; NUM_REPS],
}

impl Optimal {
    fn make_as_char(&mut self) {
        self.back_prev = LITERAL;
        self.prev1_is_char = false;
    }

    fn make_as_short_rep(&mut self) {
        self.back_prev = 0;
        self.prev1_is_char = false;
    }

    fn is_short_rep(&self) -> bool {
        self.back_prev == 0
    }

    /// Record a single-step path from `pos_prev`.
    #[inline]
    fn relax(&mut self, price: u32, pos_prev: usize, back: u32) {
        if price < self.price {
            self.price = price;
            self.pos_prev = pos_prev as u32;
            self.back_prev = back;
            self.prev1_is_char = false;
        }
    }
}

/// Price-driven LZMA parser.
#[derive(Debug)]
pub struct OptimalParser {
    nodes: Vec<Optimal>,
    opt_end: usize,
    opt_cur: usize,
    matches: Vec<u32>,
    longest_match_len: u32,
    longest_match_found: bool,
    additional_offset: u32,
    fast_bytes: u32,
    pos_state_mask: u64,
}

impl OptimalParser {
    /// Create a parser for `fast_bytes` and `pb` position bits.
    pub fn new(fast_bytes: u32, pb: u32) -> Self {
        Self {
            nodes: vec![Optimal::default(); NUM_OPTS],
            opt_end: 0,
            opt_cur: 0,
            matches: Vec::with_capacity(MATCH_LEN_MAX * 2 + 2),
            longest_match_len: 0,
            longest_match_found: false,
            additional_offset: 0,
            fast_bytes,
            pos_state_mask: (1 << pb) - 1,
        }
    }

    /// How many positions the match finder is ahead of the coder.
    pub fn additional_offset(&self) -> u32 {
        self.additional_offset
    }

    /// Account for `len` bytes having been coded.
    pub fn consume(&mut self, len: u32) {
        self.additional_offset -= len;
    }

    /// Search the next position; returns the longest match length.
    pub fn read_match_distances(&mut self, mf: &mut MatchFinder) -> u32 {
        mf.get_matches(&mut self.matches);
        self.additional_offset += 1;

        match *self.matches.as_slice() {
            [.., len, dist] if len == self.fast_bytes => {
                // The finder stops at fast bytes; extend to the real length.
                let limit = MATCH_LEN_MAX - len as usize;
                len + mf.match_len(len as isize - 1, dist, limit) as u32
            }
            [.., len, _] => len,
            _ => 0,
        }
    }

    fn move_pos(&mut self, mf: &mut MatchFinder, num: u32) {
        if num > 0 {
            mf.skip(num);
            self.additional_offset += num;
        }
    }

    /// Choose the next token at `position`.
    ///
    /// Returns `(len, back)` where `back` is [`LITERAL`], a rep index
    /// `0..4`, or a zero-based distance plus 4.
    pub fn get_optimum(
        &mut self,
        mf: &mut MatchFinder,
        ctx: &ParseContext<'_>,
        position: u64,
    ) -> (u32, u32) {
        if self.opt_end != self.opt_cur {
            let node = self.nodes[self.opt_cur];
            let len = node.pos_prev - self.opt_cur as u32;
            self.opt_cur = node.pos_prev as usize;
            return (len, node.back_prev);
        }
        self.opt_cur = 0;
        self.opt_end = 0;

        let model = ctx.model;
        let prices = ctx.prices;
        let fast = self.fast_bytes;

        let len_main = if self.longest_match_found {
            self.longest_match_found = false;
            self.longest_match_len
        } else {
            self.read_match_distances(mf)
        };
        let num_pairs = self.matches.len();

        if mf.available() + 1 < 2 {
            return (1, LITERAL);
        }

        let reps = ctx.reps;
        let mut rep_lens = [0u32; NUM_REPS];
        let mut rep_max = 0;
        for i in 0..NUM_REPS {
            rep_lens[i] = mf.match_len(-1, reps[i], MATCH_LEN_MAX) as u32;
            if rep_lens[i] > rep_lens[rep_max] {
                rep_max = i;
            }
        }

        if rep_lens[rep_max] >= fast {
            let len = rep_lens[rep_max];
            self.move_pos(mf, len - 1);
            return (len, rep_max as u32);
        }

        if len_main >= fast {
            let back = self.matches[num_pairs - 1] + NUM_REPS as u32;
            self.move_pos(mf, len_main - 1);
            return (len_main, back);
        }

        let current_byte = mf.byte_at(-1);
        let match_byte = mf.byte_at(-(reps[0] as isize) - 2);

        if len_main < 2 && current_byte != match_byte && rep_lens[rep_max] < 2 {
            return (1, LITERAL);
        }

        let state = ctx.state;
        self.nodes[0].state = state;
        let pos_state = (position & self.pos_state_mask) as usize;

        let lit_ctx = model.literal.context(position, ctx.prev_byte);
        self.nodes[1].price = model.is_match_price(state, pos_state, false)
            + model
                .literal
                .price(lit_ctx, !state.is_literal(), match_byte, current_byte);
        self.nodes[1].make_as_char();

        let match_price = model.is_match_price(state, pos_state, true);
        let rep_match_price = match_price + model.is_rep_price(state, true);

        if match_byte == current_byte {
            let short_rep_price = rep_match_price + model.short_rep_price(state, pos_state);
            if short_rep_price < self.nodes[1].price {
                self.nodes[1].price = short_rep_price;
                self.nodes[1].make_as_short_rep();
            }
        }

        let mut len_end = len_main.max(rep_lens[rep_max]) as usize;
        if len_end < 2 {
            return (1, self.nodes[1].back_prev);
        }

        self.nodes[1].pos_prev = 0;
        self.nodes[0].reps = reps;
        for node in &mut self.nodes[2..=len_end] {
            node.price = INFINITY_PRICE;
        }

        for (i, &rep_len) in rep_lens.iter().enumerate() {
            if rep_len < 2 {
                continue;
            }
            let price = rep_match_price + model.pure_rep_price(i, state, pos_state);
            for len in (2..=rep_len).rev() {
                let len_price = prices
                    .rep_len
                    .price(&model.rep_len, len - MATCH_LEN_MIN as u32, pos_state);
                self.nodes[len as usize].relax(price + len_price, 0, i as u32);
            }
        }

        let normal_match_price = match_price + model.is_rep_price(state, false);

        let mut len = if rep_lens[0] >= 2 { rep_lens[0] + 1 } else { 2 };
        if len <= len_main {
            let mut offs = 0;
            while len > self.matches[offs] {
                offs += 2;
            }
            loop {
                let dist = self.matches[offs + 1];
                let price = normal_match_price + prices.match_price(model, dist, len, pos_state);
                self.nodes[len as usize].relax(price, 0, dist + NUM_REPS as u32);
                if len == self.matches[offs] {
                    offs += 2;
                    if offs == num_pairs {
                        break;
                    }
                }
                len += 1;
            }
        }

        let mut cur = 0usize;
        let mut position = position;

        loop {
            cur += 1;
            if cur == len_end {
                return self.backward(cur);
            }

            let mut new_len = self.read_match_distances(mf);
            let mut num_pairs = self.matches.len();
            if new_len >= fast {
                self.longest_match_len = new_len;
                self.longest_match_found = true;
                return self.backward(cur);
            }
            position += 1;

            let node = self.nodes[cur];
            let mut pos_prev = node.pos_prev as usize;
            let mut state;
            if node.prev1_is_char {
                pos_prev -= 1;
                if node.prev2 {
                    state = self.nodes[node.pos_prev2 as usize].state;
                    if node.back_prev2 < NUM_REPS as u32 {
                        state.update_long_rep();
                    } else {
                        state.update_match();
                    }
                } else {
                    state = self.nodes[pos_prev].state;
                }
                state.update_literal();
            } else {
                state = self.nodes[pos_prev].state;
            }

            let reps = if pos_prev == cur - 1 {
                if node.is_short_rep() {
                    state.update_short_rep();
                } else {
                    state.update_literal();
                }
                self.nodes[pos_prev].reps
            } else {
                let back = if node.prev1_is_char && node.prev2 {
                    pos_prev = node.pos_prev2 as usize;
                    state.update_long_rep();
                    node.back_prev2
                } else {
                    if node.back_prev < NUM_REPS as u32 {
                        state.update_long_rep();
                    } else {
                        state.update_match();
                    }
                    node.back_prev
                };

                let prev = self.nodes[pos_prev].reps;
                match back {
                    0 => prev,
                    1 => [prev[1], prev[0], prev[2], prev[3]],
                    2 => [prev[2], prev[0], prev[1], prev[3]],
                    3 => [prev[3], prev[0], prev[1], prev[2]],
                    _ => [back - NUM_REPS as u32, prev[0], prev[1], prev[2]],
                }
            };

            self.nodes[cur].state = state;
            self.nodes[cur].reps = reps;
            let cur_price = self.nodes[cur].price;

            let current_byte = mf.byte_at(-1);
            let match_byte = mf.byte_at(-(reps[0] as isize) - 2);
            let pos_state = (position & self.pos_state_mask) as usize;

            let lit_ctx = model.literal.context(position, mf.byte_at(-2));
            let cur_and1_price = cur_price
                + model.is_match_price(state, pos_state, false)
                + model
                    .literal
                    .price(lit_ctx, !state.is_literal(), match_byte, current_byte);

            let mut next_is_char = false;
            let next = &mut self.nodes[cur + 1];
            if cur_and1_price < next.price {
                next.price = cur_and1_price;
                next.pos_prev = cur as u32;
                next.make_as_char();
                next_is_char = true;
            }

            let match_price = cur_price + model.is_match_price(state, pos_state, true);
            let rep_match_price = match_price + model.is_rep_price(state, true);

            if match_byte == current_byte && !(next.pos_prev < cur as u32 && next.back_prev == 0) {
                let short_rep_price = rep_match_price + model.short_rep_price(state, pos_state);
                if short_rep_price <= next.price {
                    next.price = short_rep_price;
                    next.pos_prev = cur as u32;
                    next.make_as_short_rep();
                    next_is_char = true;
                }
            }

            let avail_full = (mf.available() as u32 + 1).min((NUM_OPTS - 1 - cur) as u32);
            if avail_full < 2 {
                continue;
            }
            let avail = avail_full.min(fast);

            if !next_is_char && match_byte != current_byte {
                // Literal, then rep0.
                let limit = (avail_full - 1).min(fast);
                let len_test2 = mf.match_len(0, reps[0], limit as usize) as u32;
                if len_test2 >= 2 {
                    let mut state2 = state;
                    state2.update_literal();
                    let pos_state_next = ((position + 1) & self.pos_state_mask) as usize;
                    let next_rep_match_price = cur_and1_price
                        + model.is_match_price(state2, pos_state_next, true)
                        + model.is_rep_price(state2, true);

                    let offset = cur + 1 + len_test2 as usize;
                    self.extend_to(&mut len_end, offset);
                    let price = next_rep_match_price
                        + prices.rep_price(model, 0, len_test2, state2, pos_state_next);
                    let opt = &mut self.nodes[offset];
                    if price < opt.price {
                        opt.price = price;
                        opt.pos_prev = cur as u32 + 1;
                        opt.back_prev = 0;
                        opt.prev1_is_char = true;
                        opt.prev2 = false;
                    }
                }
            }

            let mut start_len = 2;

            for (rep_index, &rep) in reps.iter().enumerate() {
                let len_test = mf.match_len(-1, rep, avail as usize) as u32;
                if len_test < 2 {
                    continue;
                }

                self.extend_to(&mut len_end, cur + len_test as usize);
                for len in (2..=len_test).rev() {
                    let price =
                        rep_match_price + prices.rep_price(model, rep_index, len, state, pos_state);
                    self.nodes[cur + len as usize].relax(price, cur, rep_index as u32);
                }

                if rep_index == 0 {
                    start_len = len_test + 1;
                }

                // Rep match, literal, rep0.
                if len_test < avail_full {
                    let limit = (avail_full - 1 - len_test).min(fast);
                    let len_test2 = mf.match_len(len_test as isize, rep, limit as usize) as u32;
                    if len_test2 >= 2 {
                        let mut state2 = state;
                        state2.update_long_rep();
                        let lit_pos = position + len_test as u64;
                        let pos_state_next = (lit_pos & self.pos_state_mask) as usize;
                        let lit_ctx = model.literal.context(lit_pos, mf.byte_at(len_test as isize - 2));
                        let cur_and_len_char_price = rep_match_price
                            + prices.rep_price(model, rep_index, len_test, state, pos_state)
                            + model.is_match_price(state2, pos_state_next, false)
                            + model.literal.price(
                                lit_ctx,
                                true,
                                mf.byte_at(len_test as isize - 1 - (rep as isize + 1)),
                                mf.byte_at(len_test as isize - 1),
                            );
                        state2.update_literal();
                        let pos_state_next = ((lit_pos + 1) & self.pos_state_mask) as usize;
                        let next_rep_match_price = cur_and_len_char_price
                            + model.is_match_price(state2, pos_state_next, true)
                            + model.is_rep_price(state2, true);

                        let offset = len_test as usize + 1 + len_test2 as usize;
                        self.extend_to(&mut len_end, cur + offset);
                        let price = next_rep_match_price
                            + prices.rep_price(model, 0, len_test2, state2, pos_state_next);
                        let opt = &mut self.nodes[cur + offset];
                        if price < opt.price {
                            opt.price = price;
                            opt.pos_prev = (cur + len_test as usize + 1) as u32;
                            opt.back_prev = 0;
                            opt.prev1_is_char = true;
                            opt.prev2 = true;
                            opt.pos_prev2 = cur as u32;
                            opt.back_prev2 = rep_index as u32;
                        }
                    }
                }
            }

            if new_len > avail {
                new_len = avail;
                let mut n = 0;
                while new_len > self.matches[n] {
                    n += 2;
                }
                self.matches[n] = new_len;
                self.matches.truncate(n + 2);
                num_pairs = n + 2;
            }

            if new_len >= start_len {
                let normal_match_price = match_price + model.is_rep_price(state, false);
                self.extend_to(&mut len_end, cur + new_len as usize);

                let mut offs = 0;
                while start_len > self.matches[offs] {
                    offs += 2;
                }

                let mut len_test = start_len;
                loop {
                    let cur_back = self.matches[offs + 1];
                    let cur_and_len_price =
                        normal_match_price + prices.match_price(model, cur_back, len_test, pos_state);
                    self.nodes[cur + len_test as usize].relax(
                        cur_and_len_price,
                        cur,
                        cur_back + NUM_REPS as u32,
                    );

                    if len_test == self.matches[offs] {
                        // Match, literal, rep0.
                        if len_test < avail_full {
                            let limit = (avail_full - 1 - len_test).min(fast);
                            let len_test2 =
                                mf.match_len(len_test as isize, cur_back, limit as usize) as u32;
                            if len_test2 >= 2 {
                                let mut state2 = state;
                                state2.update_match();
                                let lit_pos = position + len_test as u64;
                                let pos_state_next = (lit_pos & self.pos_state_mask) as usize;
                                let lit_ctx = model
                                    .literal
                                    .context(lit_pos, mf.byte_at(len_test as isize - 2));
                                let cur_and_len_char_price = cur_and_len_price
                                    + model.is_match_price(state2, pos_state_next, false)
                                    + model.literal.price(
                                        lit_ctx,
                                        true,
                                        mf.byte_at(len_test as isize - (cur_back as isize + 1) - 1),
                                        mf.byte_at(len_test as isize - 1),
                                    );
                                state2.update_literal();
                                let pos_state_next = ((lit_pos + 1) & self.pos_state_mask) as usize;
                                let next_rep_match_price = cur_and_len_char_price
                                    + model.is_match_price(state2, pos_state_next, true)
                                    + model.is_rep_price(state2, true);

                                let offset = len_test as usize + 1 + len_test2 as usize;
                                self.extend_to(&mut len_end, cur + offset);
                                let price = next_rep_match_price
                                    + prices.rep_price(model, 0, len_test2, state2, pos_state_next);
                                let opt = &mut self.nodes[cur + offset];
                                if price < opt.price {
                                    opt.price = price;
                                    opt.pos_prev = (cur + len_test as usize + 1) as u32;
                                    opt.back_prev = 0;
                                    opt.prev1_is_char = true;
                                    opt.prev2 = true;
                                    opt.pos_prev2 = cur as u32;
                                    opt.back_prev2 = cur_back + NUM_REPS as u32;
                                }
                            }
                        }

                        offs += 2;
                        if offs == num_pairs {
                            break;
                        }
                    }
                    len_test += 1;
                }
            }
        }
    }

    /// Grow the lattice to `end`, marking new nodes unreachable.
    #[inline]
    fn extend_to(&mut self, len_end: &mut usize, end: usize) {
        while *len_end < end {
            *len_end += 1;
            self.nodes[*len_end].price = INFINITY_PRICE;
        }
    }

    /// Reverse the chain ending at `cur` and return its first token.
    fn backward(&mut self, mut cur: usize) -> (u32, u32) {
        self.opt_end = cur;
        let mut pos_mem = self.nodes[cur].pos_prev;
        let mut back_mem = self.nodes[cur].back_prev;

        loop {
            let node = self.nodes[cur];
            if node.prev1_is_char {
                let mem = pos_mem as usize;
                self.nodes[mem].make_as_char();
                self.nodes[mem].pos_prev = pos_mem - 1;
                if node.prev2 {
                    let before = &mut self.nodes[mem - 1];
                    before.prev1_is_char = false;
                    before.pos_prev = node.pos_prev2;
                    before.back_prev = node.back_prev2;
                }
            }

            let pos_prev = pos_mem as usize;
            let back_cur = back_mem;
            back_mem = self.nodes[pos_prev].back_prev;
            pos_mem = self.nodes[pos_prev].pos_prev;
            self.nodes[pos_prev].back_prev = back_cur;
            self.nodes[pos_prev].pos_prev = cur as u32;
            cur = pos_prev;

            if cur == 0 {
                break;
            }
        }

        self.opt_cur = self.nodes[0].pos_prev as usize;
        (self.opt_cur as u32, self.nodes[0].back_prev)
    }
}
