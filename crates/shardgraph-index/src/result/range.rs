use std::fmt::Debug;
use std::sync::Arc;

use super::{CommonIndexResult, SamplerCache};

/// Value-sorted `(id, cumulative weight)` rows shared by a range index and
/// its results.
pub trait RangeColumns: Send + Sync + Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id_at(&self, i: usize) -> u64;

    fn cum_weight_at(&self, i: usize) -> f32;

    fn weight_at(&self, i: usize) -> f32 {
        if i == 0 {
            self.cum_weight_at(0)
        } else {
            self.cum_weight_at(i) - self.cum_weight_at(i - 1)
        }
    }

    /// Total weight of rows `[begin, end)`.
    fn interval_weight(&self, begin: usize, end: usize) -> f32 {
        if begin >= end {
            return 0.0;
        }
        let lo = if begin == 0 {
            0.0
        } else {
            self.cum_weight_at(begin - 1)
        };
        self.cum_weight_at(end - 1) - lo
    }
}

/// Disjoint `[begin, end)` sections over one backing array, ordered by start.
#[derive(Debug, Clone)]
pub struct RangeIndexResult {
    name: String,
    rows: Arc<dyn RangeColumns>,
    sections: Vec<(usize, usize)>,
    pub(super) sampler: SamplerCache,
}

impl RangeIndexResult {
    /// Empty sections are dropped.
    pub(crate) fn new(
        name: &str,
        rows: Arc<dyn RangeColumns>,
        sections: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let sections = sections.into_iter().filter(|&(b, e)| b < e).collect();
        Self {
            name: name.to_string(),
            rows,
            sections,
            sampler: SamplerCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sections(&self) -> &[(usize, usize)] {
        &self.sections
    }

    /// Whether both results slice the same backing array.
    pub fn shares_backing(&self, other: &RangeIndexResult) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.rows) as *const (),
            Arc::as_ptr(&other.rows) as *const (),
        )
    }

    fn positions(&self) -> impl Iterator<Item = usize> + '_ {
        self.sections.iter().flat_map(|&(b, e)| b..e)
    }

    pub fn ids(&self) -> Vec<u64> {
        self.positions().map(|i| self.rows.id_at(i)).collect()
    }

    pub fn weights(&self) -> Vec<f32> {
        self.positions().map(|i| self.rows.weight_at(i)).collect()
    }

    pub fn sum_weight(&self) -> f32 {
        self.sections
            .iter()
            .map(|&(b, e)| self.rows.interval_weight(b, e))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.sections.iter().map(|&(b, e)| e - b).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn sample(&self, count: usize) -> Vec<(u64, f32)> {
        self.sampler.sample(count, || (self.ids(), self.weights()))
    }

    pub fn to_common(&self) -> CommonIndexResult {
        let pairs = self
            .positions()
            .map(|i| (self.rows.id_at(i), self.rows.weight_at(i)))
            .collect();
        CommonIndexResult::new(&self.name, pairs)
    }

    fn with_sections(&self, sections: Vec<(usize, usize)>) -> RangeIndexResult {
        RangeIndexResult::new(&self.name, Arc::clone(&self.rows), sections)
    }

    /// Pairwise clip of every left section against every right section.
    pub fn intersection(&self, other: &RangeIndexResult) -> RangeIndexResult {
        let mut out = Vec::new();
        for &(lb, le) in &self.sections {
            for &(rb, re) in &other.sections {
                let (b, e) = (lb.max(rb), le.min(re));
                if b < e {
                    out.push((b, e));
                }
            }
        }
        out.sort_unstable();
        self.with_sections(out)
    }

    /// Sort all sections by start and sweep-merge overlapping or adjacent ones.
    pub fn union(&self, other: &RangeIndexResult) -> RangeIndexResult {
        let mut all: Vec<(usize, usize)> = self
            .sections
            .iter()
            .chain(other.sections.iter())
            .copied()
            .collect();
        all.sort_unstable();
        let mut merged: Vec<(usize, usize)> = Vec::with_capacity(all.len());
        for (b, e) in all {
            match merged.last_mut() {
                Some(last) if b <= last.1 => last.1 = last.1.max(e),
                _ => merged.push((b, e)),
            }
        }
        self.with_sections(merged)
    }
}
