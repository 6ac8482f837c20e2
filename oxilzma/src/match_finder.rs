//! Binary-tree match finders.
//!
//! Every input position is inserted into a hash chain head and a binary
//! search tree over the last `history_size` positions, ordered by the bytes
//! that follow. Inserting a position walks the tree from the hash head,
//! reporting ever longer matches and re-linking the tree so the new
//! position becomes its root.
//!
//! Two variants are provided:
//!
//! - [`MatchFinderKind::Bt2`]: 2-byte direct hash, at least 3 bytes of
//!   lookahead needed.
//! - [`MatchFinderKind::Bt4`]: CRC-mixed 2-, 3- and 4-byte hashes, at least
//!   4 bytes of lookahead needed.
//!
//! Positions are stored as `u32` offsets from a moving base, plus one, so 0
//! always means "empty". Before the offsets would overflow, every entry is
//! shifted down by the same amount and entries that fall out of the history
//! become empty.

use crate::model::MATCH_LEN_MAX;
use oxilzma_core::crc::CRC32_TABLE;
use std::fmt;
use std::io::{self, Read};

const HASH2_SIZE: usize = 1 << 10;
const HASH3_SIZE: usize = 1 << 16;
const HASH3_OFFSET: usize = HASH2_SIZE;
const FIX_HASH_SIZE: usize = HASH2_SIZE + HASH3_SIZE;
const BT2_HASH_SIZE: usize = 1 << 16;

/// Bytes requested from the source per read.
pub const READ_CHUNK: usize = 1 << 16;

/// Lookahead kept in front of the current position while input remains.
pub const MIN_LOOKAHEAD: usize = 1 << 15;

/// Relative position at which the tables are renormalized.
const NORMALIZE_LIMIT: u32 = u32::MAX;

/// History kept behind the tree window for the parser's look-back.
const KEEP_EXTRA: usize = 4096 + MATCH_LEN_MAX + 1;

/// Match finder variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchFinderKind {
    /// Binary tree with a 2-byte hash.
    Bt2,
    /// Binary tree with 2-, 3- and 4-byte hashes.
    #[default]
    Bt4,
}

impl MatchFinderKind {
    /// Bytes of lookahead needed before a position is searched.
    pub fn min_match_check(self) -> u32 {
        match self {
            Self::Bt2 => 3,
            Self::Bt4 => 4,
        }
    }

    /// Bytes already known equal when a hash head is followed.
    fn hash_direct_bytes(self) -> u32 {
        match self {
            Self::Bt2 => 2,
            Self::Bt4 => 0,
        }
    }

    /// Short lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Bt2 => "bt2",
            Self::Bt4 => "bt4",
        }
    }
}

impl fmt::Display for MatchFinderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A binary-tree match finder over a sliding input buffer.
#[derive(Debug)]
pub struct MatchFinder {
    kind: MatchFinderKind,
    /// Buffered input; `buf[0]` is stream offset `buf_start`.
    buf: Vec<u8>,
    buf_start: u64,
    /// Stream offset of the next position to insert.
    pos: u64,
    /// The source reported end of input.
    eof: bool,
    /// Bytes kept behind `pos` when the buffer is compacted.
    keep_before: usize,
    cyclic_size: u32,
    cyclic_pos: u32,
    match_max_len: u32,
    cut_value: u32,
    hash_mask: u32,
    fix_hash_size: usize,
    /// Stream offset subtracted from every stored position.
    pos_base: u64,
    normalize_at: u32,
    hash: Vec<u32>,
    son: Vec<u32>,
}

impl MatchFinder {
    /// Create a match finder that can see `history_size` bytes back and
    /// reports matches up to `match_max_len` bytes.
    pub fn new(kind: MatchFinderKind, history_size: u32, match_max_len: u32) -> Self {
        let cyclic_size = history_size + 1;

        let (hash_mask, fix_hash_size, hash_len) = match kind {
            MatchFinderKind::Bt2 => (0, 0, BT2_HASH_SIZE),
            MatchFinderKind::Bt4 => {
                let mut hs = history_size.saturating_sub(1);
                hs |= hs >> 1;
                hs |= hs >> 2;
                hs |= hs >> 4;
                hs |= hs >> 8;
                hs >>= 1;
                hs |= 0xFFFF;
                if hs > 1 << 24 {
                    hs >>= 1;
                }
                (hs, FIX_HASH_SIZE, FIX_HASH_SIZE + hs as usize + 1)
            }
        };

        Self {
            kind,
            buf: Vec::new(),
            buf_start: 0,
            pos: 0,
            eof: false,
            keep_before: cyclic_size as usize + KEEP_EXTRA,
            cyclic_size,
            cyclic_pos: 0,
            match_max_len,
            cut_value: 16 + match_max_len / 2,
            hash_mask,
            fix_hash_size,
            pos_base: 0,
            normalize_at: NORMALIZE_LIMIT,
            hash: vec![0; hash_len],
            son: vec![0; cyclic_size as usize * 2],
        }
    }

    /// Variant in use.
    pub fn kind(&self) -> MatchFinderKind {
        self.kind
    }

    /// Stream offset of the next position to insert.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Buffered bytes from the current position to the end of input seen.
    #[inline]
    pub fn available(&self) -> usize {
        (self.buf_start + self.buf.len() as u64).saturating_sub(self.pos) as usize
    }

    /// Whether the source has been read to its end.
    pub fn is_exhausted(&self) -> bool {
        self.eof
    }

    /// Top up the lookahead from `reader`.
    ///
    /// After this returns, at least [`MIN_LOOKAHEAD`] bytes are buffered
    /// ahead of the current position, or the source is exhausted.
    pub fn fill<R: Read>(&mut self, reader: &mut R) -> io::Result<()> {
        let behind = (self.pos - self.buf_start) as usize;
        let excess = behind.saturating_sub(self.keep_before);
        if excess >= self.keep_before.max(READ_CHUNK) {
            self.buf.drain(..excess);
            self.buf_start += excess as u64;
        }

        while !self.eof && self.available() < MIN_LOOKAHEAD {
            let len = self.buf.len();
            self.buf.resize(len + READ_CHUNK, 0);
            let n = loop {
                match reader.read(&mut self.buf[len..]) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        self.buf.truncate(len);
                        return Err(e);
                    }
                }
            };
            self.buf.truncate(len + n);
            if n == 0 {
                self.eof = true;
            }
        }

        Ok(())
    }

    #[inline]
    fn cur_index(&self) -> usize {
        (self.pos - self.buf_start) as usize
    }

    /// Buffer index of a stored (one-based) position.
    #[inline]
    fn index_of(&self, tree_pos: u32) -> usize {
        (tree_pos as u64 + self.pos_base - 1 - self.buf_start) as usize
    }

    /// Stored form of the current position.
    #[inline]
    fn tree_pos(&self) -> u32 {
        (self.pos + 1 - self.pos_base) as u32
    }

    /// Byte at `offset` from the current position (`-1` is the last
    /// inserted byte). Returns 0 outside the buffer.
    #[inline]
    pub fn byte_at(&self, offset: isize) -> u8 {
        let index = self.cur_index() as isize + offset;
        if index < 0 {
            return 0;
        }
        self.buf.get(index as usize).copied().unwrap_or(0)
    }

    /// Length of the match between the bytes at `offset` and the bytes
    /// `dist + 1` before them, up to `limit` and the end of input.
    pub fn match_len(&self, offset: isize, dist: u32, limit: usize) -> usize {
        let start = self.cur_index() as isize + offset;
        let back = start - dist as isize - 1;
        if back < 0 || start as usize >= self.buf.len() {
            return 0;
        }
        let (start, back) = (start as usize, back as usize);
        let limit = limit.min(self.buf.len() - start);

        self.buf[start..start + limit]
            .iter()
            .zip(&self.buf[back..back + limit])
            .take_while(|(a, b)| a == b)
            .count()
    }

    #[inline]
    fn move_pos(&mut self) {
        self.cyclic_pos += 1;
        if self.cyclic_pos >= self.cyclic_size {
            self.cyclic_pos = 0;
        }
        self.pos += 1;
        if self.pos + 1 - self.pos_base >= self.normalize_at as u64 {
            self.normalize();
        }
    }

    /// Rebase every stored position so the current one is `cyclic_size`.
    fn normalize(&mut self) {
        let sub = (self.pos + 1 - self.pos_base) as u32 - self.cyclic_size;
        for entry in self.hash.iter_mut().chain(self.son.iter_mut()) {
            *entry = entry.saturating_sub(sub);
        }
        self.pos_base += sub as u64;
    }

    /// Usable match length at the current position, or `None` when too
    /// little input remains to search.
    #[inline]
    fn len_limit(&self) -> Option<u32> {
        let avail = self.available();
        let limit = if avail >= self.match_max_len as usize {
            self.match_max_len
        } else {
            avail as u32
        };
        (limit >= self.kind.min_match_check()).then_some(limit)
    }

    /// Hash slots for the current position; updates the small hashes and
    /// reports their previous heads in `small_heads`.
    #[inline]
    fn hash_current(&mut self, cur_pos: u32, small_heads: &mut [u32; 2]) -> usize {
        let cur = self.cur_index();
        let b = &self.buf[cur..];
        match self.kind {
            MatchFinderKind::Bt2 => b[0] as usize | ((b[1] as usize) << 8),
            MatchFinderKind::Bt4 => {
                let mut temp = CRC32_TABLE[b[0] as usize] ^ b[1] as u32;
                let h2 = temp as usize & (HASH2_SIZE - 1);
                temp ^= (b[2] as u32) << 8;
                let h3 = temp as usize & (HASH3_SIZE - 1);
                let hv = ((temp ^ (CRC32_TABLE[b[3] as usize] << 5)) & self.hash_mask) as usize;

                small_heads[0] = self.hash[h2];
                small_heads[1] = self.hash[HASH3_OFFSET + h3];
                self.hash[h2] = cur_pos;
                self.hash[HASH3_OFFSET + h3] = cur_pos;
                hv
            }
        }
    }

    /// Insert the current position and collect its matches.
    ///
    /// `distances` receives `[len, dist, len, dist, ...]` with strictly
    /// increasing lengths and zero-based distances.
    pub fn get_matches(&mut self, distances: &mut Vec<u32>) {
        distances.clear();

        let Some(len_limit) = self.len_limit() else {
            self.move_pos();
            return;
        };

        let cur_pos = self.tree_pos();
        let match_min_pos = cur_pos.saturating_sub(self.cyclic_size);
        let cur = self.cur_index();
        let mut max_len = 1u32;

        let mut small_heads = [0u32; 2];
        let hash_value = self.hash_current(cur_pos, &mut small_heads);
        let head = self.fix_hash_size + hash_value;
        let mut cur_match = self.hash[head];

        if self.kind == MatchFinderKind::Bt4 {
            let [mut cur_match2, cur_match3] = small_heads;

            if cur_match2 > match_min_pos && self.buf[self.index_of(cur_match2)] == self.buf[cur] {
                max_len = 2;
                distances.push(2);
                distances.push(cur_pos - cur_match2 - 1);
            }

            if cur_match3 > match_min_pos && self.buf[self.index_of(cur_match3)] == self.buf[cur] {
                if cur_match3 == cur_match2 {
                    distances.clear();
                }
                max_len = 3;
                distances.push(3);
                distances.push(cur_pos - cur_match3 - 1);
                cur_match2 = cur_match3;
            }

            // The tree walk will report this candidate with its full length.
            if !distances.is_empty() && cur_match2 == cur_match {
                distances.truncate(distances.len() - 2);
                max_len = 1;
            }
        }

        self.hash[head] = cur_pos;

        let direct = self.kind.hash_direct_bytes();
        if direct != 0
            && cur_match > match_min_pos
            && self.buf[self.index_of(cur_match) + direct as usize]
                != self.buf[cur + direct as usize]
        {
            max_len = direct;
            distances.push(direct);
            distances.push(cur_pos - cur_match - 1);
        }

        let mut ptr0 = (self.cyclic_pos as usize) * 2 + 1;
        let mut ptr1 = (self.cyclic_pos as usize) * 2;
        let mut len0 = direct;
        let mut len1 = direct;
        let mut count = self.cut_value;

        loop {
            if cur_match <= match_min_pos || count == 0 {
                self.son[ptr0] = 0;
                self.son[ptr1] = 0;
                break;
            }
            count -= 1;

            let delta = cur_pos - cur_match;
            let cyclic = self.cyclic_index(delta);
            let pby1 = self.index_of(cur_match);
            let mut len = len0.min(len1);

            if self.buf[pby1 + len as usize] == self.buf[cur + len as usize] {
                len += 1;
                while len != len_limit
                    && self.buf[pby1 + len as usize] == self.buf[cur + len as usize]
                {
                    len += 1;
                }

                if max_len < len {
                    max_len = len;
                    distances.push(len);
                    distances.push(delta - 1);
                    if len == len_limit {
                        self.son[ptr1] = self.son[cyclic];
                        self.son[ptr0] = self.son[cyclic + 1];
                        break;
                    }
                }
            }

            if self.buf[pby1 + len as usize] < self.buf[cur + len as usize] {
                self.son[ptr1] = cur_match;
                ptr1 = cyclic + 1;
                cur_match = self.son[ptr1];
                len1 = len;
            } else {
                self.son[ptr0] = cur_match;
                ptr0 = cyclic;
                cur_match = self.son[ptr0];
                len0 = len;
            }
        }

        self.move_pos();
    }

    /// Insert the next `num` positions without reporting matches.
    pub fn skip(&mut self, num: u32) {
        for _ in 0..num {
            let Some(len_limit) = self.len_limit() else {
                self.move_pos();
                continue;
            };

            let cur_pos = self.tree_pos();
            let match_min_pos = cur_pos.saturating_sub(self.cyclic_size);
            let cur = self.cur_index();

            let mut small_heads = [0u32; 2];
            let hash_value = self.hash_current(cur_pos, &mut small_heads);
            let head = self.fix_hash_size + hash_value;
            let mut cur_match = self.hash[head];
            self.hash[head] = cur_pos;

            let direct = self.kind.hash_direct_bytes();
            let mut ptr0 = (self.cyclic_pos as usize) * 2 + 1;
            let mut ptr1 = (self.cyclic_pos as usize) * 2;
            let mut len0 = direct;
            let mut len1 = direct;
            let mut count = self.cut_value;

            loop {
                if cur_match <= match_min_pos || count == 0 {
                    self.son[ptr0] = 0;
                    self.son[ptr1] = 0;
                    break;
                }
                count -= 1;

                let delta = cur_pos - cur_match;
                let cyclic = self.cyclic_index(delta);
                let pby1 = self.index_of(cur_match);
                let mut len = len0.min(len1);

                if self.buf[pby1 + len as usize] == self.buf[cur + len as usize] {
                    len += 1;
                    while len != len_limit
                        && self.buf[pby1 + len as usize] == self.buf[cur + len as usize]
                    {
                        len += 1;
                    }
                    if len == len_limit {
                        self.son[ptr1] = self.son[cyclic];
                        self.son[ptr0] = self.son[cyclic + 1];
                        break;
                    }
                }

                if self.buf[pby1 + len as usize] < self.buf[cur + len as usize] {
                    self.son[ptr1] = cur_match;
                    ptr1 = cyclic + 1;
                    cur_match = self.son[ptr1];
                    len1 = len;
                } else {
                    self.son[ptr0] = cur_match;
                    ptr0 = cyclic;
                    cur_match = self.son[ptr0];
                    len0 = len;
                }
            }

            self.move_pos();
        }
    }

    /// Index into `son` of the node `delta` positions back.
    #[inline]
    fn cyclic_index(&self, delta: u32) -> usize {
        let slot = if delta <= self.cyclic_pos {
            self.cyclic_pos - delta
        } else {
            self.cyclic_pos + self.cyclic_size - delta
        };
        slot as usize * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finder(kind: MatchFinderKind, data: &[u8], history: u32, max_len: u32) -> MatchFinder {
        let mut mf = MatchFinder::new(kind, history, max_len);
        mf.fill(&mut &data[..]).unwrap();
        mf
    }

    fn pairs(distances: &[u32]) -> Vec<(u32, u32)> {
        distances.chunks(2).map(|c| (c[0], c[1])).collect()
    }

    #[test]
    fn test_finds_repeat() {
        for kind in [MatchFinderKind::Bt2, MatchFinderKind::Bt4] {
            let data = b"abcdefgh__abcdefgh__";
            let mut mf = finder(kind, data, 4096, 64);
            let mut d = Vec::new();

            mf.skip(10);
            mf.get_matches(&mut d);
            let found = pairs(&d);
            assert_eq!(found.last(), Some(&(10, 9)), "{kind}");
            assert_eq!(mf.position(), 11);
        }
    }

    #[test]
    fn test_lengths_strictly_increase() {
        let data = b"xyzab_xyzabc_xyz_xyzabcd_xyzabcde";
        let mut mf = finder(MatchFinderKind::Bt4, data, 4096, 64);
        let mut d = Vec::new();
        while mf.available() > 0 {
            mf.get_matches(&mut d);
            let found = pairs(&d);
            for w in found.windows(2) {
                assert!(w[0].0 < w[1].0);
            }
            for &(len, dist) in &found {
                let pos = mf.position() as usize - 1;
                let start = pos - dist as usize - 1;
                assert_eq!(&data[pos..pos + len as usize], &data[start..start + len as usize]);
            }
        }
    }

    #[test]
    fn test_bt2_reports_two_byte_match() {
        let data = b"abXabY";
        let mut mf = finder(MatchFinderKind::Bt2, data, 4096, 64);
        let mut d = Vec::new();
        mf.skip(3);
        mf.get_matches(&mut d);
        assert_eq!(pairs(&d), vec![(2, 2)]);
    }

    #[test]
    fn test_match_limited_by_max_len() {
        let data = vec![b'a'; 1000];
        let mut mf = finder(MatchFinderKind::Bt4, &data, 4096, 32);
        let mut d = Vec::new();
        mf.skip(1);
        mf.get_matches(&mut d);
        assert_eq!(pairs(&d).last(), Some(&(32, 0)));
    }

    #[test]
    fn test_end_of_input() {
        let data = b"abcabc";
        let mut mf = finder(MatchFinderKind::Bt4, data, 4096, 64);
        let mut d = Vec::new();
        mf.skip(3);
        // Three bytes left, fewer than the 4 a BT4 search needs.
        mf.get_matches(&mut d);
        assert!(d.is_empty());
        assert_eq!(mf.available(), 2);
        assert!(mf.is_exhausted());
    }

    #[test]
    fn test_byte_at_and_match_len() {
        let data = b"hello hello world";
        let mut mf = finder(MatchFinderKind::Bt4, data, 4096, 64);
        mf.skip(7);
        assert_eq!(mf.byte_at(-1), b'h');
        assert_eq!(mf.byte_at(0), b'e');
        assert_eq!(mf.byte_at(-100), 0);
        // "hello" at 6 repeats "hello" at 0: distance 6 -> zero-based 5.
        assert_eq!(mf.match_len(-1, 5, 273), 6);
        assert_eq!(mf.match_len(-1, 5, 3), 3);
        assert_eq!(mf.match_len(-1, 0, 273), 0);
    }

    #[test]
    fn test_history_window_pruning() {
        let mut data = b"needle-in-haystack".to_vec();
        data.extend((0..10_000u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8));
        data.extend_from_slice(b"needle-in-haystack");

        let mut mf = finder(MatchFinderKind::Bt4, &data, 4096, 64);
        let mut d = Vec::new();
        mf.skip(data.len() as u32 - 18);
        mf.get_matches(&mut d);
        // The first copy is beyond the history.
        assert!(pairs(&d).iter().all(|&(_, dist)| dist < 4096));
    }

    #[test]
    fn test_fill_compacts_buffer() {
        let data: Vec<u8> = (0..1_000_000u32).map(|i| (i % 1000) as u8).collect();
        let mut reader = &data[..];
        let mut mf = MatchFinder::new(MatchFinderKind::Bt4, 4096, 64);
        let mut d = Vec::new();

        while !(mf.is_exhausted() && mf.available() == 0) {
            mf.fill(&mut reader).unwrap();
            for _ in 0..4096.min(mf.available()) {
                mf.get_matches(&mut d);
            }
            assert!(mf.buf.len() < 512 * 1024);
        }
        assert_eq!(mf.position(), 1_000_000);
    }

    #[test]
    fn test_renormalization_preserves_matches() {
        let mut data = Vec::new();
        for i in 0..12_000u32 {
            data.extend_from_slice(format!("row {} col {};", i % 97, i % 13).as_bytes());
        }

        for kind in [MatchFinderKind::Bt2, MatchFinderKind::Bt4] {
            let mut plain = MatchFinder::new(kind, 4096, 64);
            let mut rebased = MatchFinder::new(kind, 4096, 64);
            rebased.normalize_at = 10_000;
            let (mut a, mut b) = (&data[..], &data[..]);
            let (mut da, mut db) = (Vec::new(), Vec::new());

            while !(plain.is_exhausted() && plain.available() == 0) {
                plain.fill(&mut a).unwrap();
                rebased.fill(&mut b).unwrap();
                for _ in 0..4096.min(plain.available()) {
                    plain.get_matches(&mut da);
                    rebased.get_matches(&mut db);
                    assert_eq!(da, db, "{kind} at {}", plain.position());
                }
            }

            assert!(rebased.pos_base > 0);
            assert_eq!(rebased.position(), data.len() as u64);
            assert!(rebased.hash.iter().all(|&p| p < rebased.normalize_at));
        }
    }

    #[test]
    fn test_table_entry_width() {
        let mf = MatchFinder::new(MatchFinderKind::Bt4, 1 << 16, 64);
        assert_eq!(std::mem::size_of_val(&mf.son[0]), 4);
        assert_eq!(mf.son.len(), 2 * ((1 << 16) + 1));
    }

    #[test]
    fn test_hash_mask_sizes() {
        let mf = MatchFinder::new(MatchFinderKind::Bt4, 1 << 16, 64);
        assert_eq!(mf.hash_mask, 0xFFFF);
        let mf = MatchFinder::new(MatchFinderKind::Bt4, 1 << 22, 64);
        assert_eq!(mf.hash_mask, (1 << 21) - 1);
        let mf = MatchFinder::new(MatchFinderKind::Bt2, 1 << 22, 64);
        assert_eq!(mf.hash.len(), BT2_HASH_SIZE);
    }
}
