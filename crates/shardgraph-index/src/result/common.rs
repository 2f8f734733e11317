use std::cmp::Ordering;

use super::SamplerCache;

/// Flat result: `(id, weight)` pairs in ascending id order.
#[derive(Debug, Clone, Default)]
pub struct CommonIndexResult {
    name: String,
    entries: Vec<(u64, f32)>,
    pub(super) sampler: SamplerCache,
}

impl CommonIndexResult {
    /// Sorts `entries` by id; ties keep their input order.
    pub fn new(name: &str, mut entries: Vec<(u64, f32)>) -> Self {
        entries.sort_by_key(|&(id, _)| id);
        Self::from_sorted(name, entries)
    }

    pub(crate) fn from_sorted(name: &str, entries: Vec<(u64, f32)>) -> Self {
        debug_assert!(entries.windows(2).all(|w| w[0].0 <= w[1].0));
        Self {
            name: name.to_string(),
            entries,
            sampler: SamplerCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entries(&self) -> &[(u64, f32)] {
        &self.entries
    }

    pub fn ids(&self) -> Vec<u64> {
        self.entries.iter().map(|&(id, _)| id).collect()
    }

    pub fn weights(&self) -> Vec<f32> {
        self.entries.iter().map(|&(_, w)| w).collect()
    }

    pub fn sum_weight(&self) -> f32 {
        self.entries.iter().map(|&(_, w)| w).sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn sample(&self, count: usize) -> Vec<(u64, f32)> {
        self.sampler.sample(count, || (self.ids(), self.weights()))
    }

    /// Linear merge keeping ids present on both sides, with this side's
    /// weights.
    pub fn intersection(&self, other: &CommonIndexResult) -> CommonIndexResult {
        let (l, r) = (&self.entries, &other.entries);
        let mut out = Vec::with_capacity(l.len().min(r.len()));
        let (mut i, mut j) = (0, 0);
        while i < l.len() && j < r.len() {
            match l[i].0.cmp(&r[j].0) {
                Ordering::Less => i += 1,
                Ordering::Greater => j += 1,
                Ordering::Equal => {
                    out.push(l[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        Self::from_sorted(&self.name, out)
    }

    /// Linear merge of both sides. Ids on both sides take this side's weight.
    pub fn union(&self, other: &CommonIndexResult) -> CommonIndexResult {
        let (l, r) = (&self.entries, &other.entries);
        let mut out = Vec::with_capacity(l.len() + r.len());
        let (mut i, mut j) = (0, 0);
        while i < l.len() && j < r.len() {
            match l[i].0.cmp(&r[j].0) {
                Ordering::Less => {
                    out.push(l[i]);
                    i += 1;
                }
                Ordering::Greater => {
                    out.push(r[j]);
                    j += 1;
                }
                Ordering::Equal => {
                    out.push(l[i]);
                    i += 1;
                    j += 1;
                }
            }
        }
        out.extend_from_slice(&l[i..]);
        out.extend_from_slice(&r[j..]);
        Self::from_sorted(&self.name, out)
    }
}
