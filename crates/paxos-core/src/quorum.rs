//! # quorum
//!
//! why: count matching votes until a majority is reached
//! relations: used by proposer.rs for promise/accept counting and quorum reads
//! what: VoteCount, ValueTally

use std::collections::HashMap;
use std::hash::Hash;

/// Counts granted votes against a fixed quorum.
#[derive(Debug, Clone)]
pub struct VoteCount {
    granted: usize,
    quorum: usize,
}

impl VoteCount {
    pub fn new(quorum: usize) -> Self {
        Self { granted: 0, quorum }
    }

    /// Record one granted vote. Returns true once quorum is reached.
    pub fn grant(&mut self) -> bool {
        self.granted += 1;
        self.reached()
    }

    pub fn reached(&self) -> bool {
        self.granted >= self.quorum
    }

    pub fn granted(&self) -> usize {
        self.granted
    }
}

/// Occurrence count per observed value.
#[derive(Debug, Clone)]
pub struct ValueTally<V> {
    counts: HashMap<V, usize>,
    quorum: usize,
}

impl<V: Copy + Eq + Hash> ValueTally<V> {
    pub fn new(quorum: usize) -> Self {
        Self {
            counts: HashMap::new(),
            quorum,
        }
    }

    /// Record an observation. Returns the value once it reaches quorum.
    pub fn record(&mut self, value: V) -> Option<V> {
        let count = self.counts.entry(value).or_insert(0);
        *count += 1;
        (*count >= self.quorum).then_some(value)
    }

    pub fn count(&self, value: &V) -> usize {
        self.counts.get(value).copied().unwrap_or(0)
    }

    /// Number of distinct values seen.
    pub fn distinct(&self) -> usize {
        self.counts.len()
    }
}
