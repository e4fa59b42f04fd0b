//! Rank index for the waiting line
//!
//! A Fenwick tree over join sequence numbers. Each slot holds 1 while the
//! entry with that sequence is still waiting, so the rank of an entry is the
//! prefix sum up to its slot. Sequence numbers only ever grow, which lets the
//! tree be rebuilt over a sliding window `[base, base + capacity)` whenever a
//! new sequence falls outside it.

const MIN_CAPACITY: u64 = 16;

#[derive(Debug, Clone)]
pub struct RankIndex {
    base: u64,
    /// 1-based Fenwick array; `tree.len() == capacity + 1`
    tree: Vec<i64>,
}

impl RankIndex {
    pub fn new() -> Self {
        Self {
            base: 0,
            tree: vec![0; MIN_CAPACITY as usize + 1],
        }
    }

    fn capacity(&self) -> u64 {
        (self.tree.len() - 1) as u64
    }

    fn slot(&self, sequence: u64) -> Option<usize> {
        if sequence < self.base || sequence - self.base >= self.capacity() {
            return None;
        }
        Some((sequence - self.base) as usize + 1)
    }

    fn add(&mut self, slot: usize, delta: i64) {
        let mut i = slot;
        while i < self.tree.len() {
            self.tree[i] += delta;
            i += i & i.wrapping_neg();
        }
    }

    fn prefix(&self, slot: usize) -> i64 {
        let mut i = slot;
        let mut sum = 0;
        while i > 0 {
            sum += self.tree[i];
            i -= i & i.wrapping_neg();
        }
        sum
    }

    /// Mark `sequence` as waiting. `live` must yield the sequences already
    /// waiting in ascending order; it is only consumed when the window has to
    /// move.
    pub fn insert(&mut self, sequence: u64, live: impl Iterator<Item = u64>) {
        match self.slot(sequence) {
            Some(slot) => self.add(slot, 1),
            None => self.rebuild(live.chain(std::iter::once(sequence))),
        }
    }

    /// Clear the slot for `sequence`
    pub fn remove(&mut self, sequence: u64) {
        if let Some(slot) = self.slot(sequence) {
            self.add(slot, -1);
        }
    }

    /// 1-based rank of `sequence` among waiting sequences
    pub fn rank(&self, sequence: u64) -> u64 {
        self.slot(sequence)
            .map(|slot| self.prefix(slot).max(0) as u64)
            .unwrap_or(0)
    }

    /// Recreate the window starting at the oldest live sequence
    pub fn rebuild(&mut self, live: impl Iterator<Item = u64>) {
        let live: Vec<u64> = live.collect();
        let base = live.first().copied().unwrap_or(0);
        let span = live.last().map_or(0, |last| last - base + 1);
        let capacity = (span * 2).max(MIN_CAPACITY);

        self.base = base;
        self.tree = vec![0; capacity as usize + 1];
        for sequence in live {
            if let Some(slot) = self.slot(sequence) {
                self.add(slot, 1);
            }
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl Default for RankIndex {
    fn default() -> Self {
        Self::new()
    }
}
