//! Weighted candidate sets produced by index searches.
//!
//! [`IndexResult`] is a closed set of three representations:
//!
//! - `Common`: ascending-by-id `(id, weight)` pairs.
//! - `Hash`: categorical buckets from one hash index, each an intact
//!   weighted collection shared with the index.
//! - `Range`: disjoint sections of one value-sorted backing array shared with
//!   a range index.
//!
//! Set algebra keeps the cheap representation when both operands come from
//! the same source (bucket-level for Hash, section clipping for Range) and
//! otherwise normalizes both sides to `Common`. When an id appears in both
//! operands the result carries the left operand's weight.

mod common;
mod hash;
mod range;

use std::borrow::Cow;
use std::sync::OnceLock;

use shardgraph_core::WeightedCollection;

pub use common::CommonIndexResult;
pub use hash::{HashIndexResult, WeightedIds};
pub use range::{RangeColumns, RangeIndexResult};

/// Name carried by results that have no originating index.
pub const COMMON_RESULT_NAME: &str = "common";

// ============================================================================
// Sampler cache
// ============================================================================

/// Flattened sampler built on first use and reused afterwards.
#[derive(Debug, Clone, Default)]
pub(crate) struct SamplerCache(OnceLock<Option<WeightedCollection<u64>>>);

impl SamplerCache {
    pub(crate) fn sample<F>(&self, count: usize, flatten: F) -> Vec<(u64, f32)>
    where
        F: FnOnce() -> (Vec<u64>, Vec<f32>),
    {
        let sampler = self.0.get_or_init(|| {
            let (ids, weights) = flatten();
            match WeightedCollection::new(ids, weights) {
                Ok(c) if c.sum_weight() > 0.0 => Some(c),
                Ok(_) => None,
                Err(err) => {
                    tracing::warn!(error = %err, "cannot build result sampler");
                    None
                }
            }
        });
        let Some(sampler) = sampler else {
            return Vec::new();
        };
        let mut rng = rand::thread_rng();
        (0..count)
            .filter_map(|_| sampler.sample_with(&mut rng))
            .collect()
    }

    pub(crate) fn is_built(&self) -> bool {
        self.0.get().is_some()
    }
}

// ============================================================================
// IndexResult
// ============================================================================

#[derive(Debug, Clone)]
pub enum IndexResult {
    Common(CommonIndexResult),
    Hash(HashIndexResult),
    Range(RangeIndexResult),
}

impl IndexResult {
    /// Result with no candidates.
    pub fn empty(name: &str) -> Self {
        IndexResult::Common(CommonIndexResult::new(name, Vec::new()))
    }

    pub fn name(&self) -> &str {
        match self {
            IndexResult::Common(r) => r.name(),
            IndexResult::Hash(r) => r.name(),
            IndexResult::Range(r) => r.name(),
        }
    }

    /// Ids in representation order. Parallel to [`IndexResult::weights`].
    pub fn ids(&self) -> Vec<u64> {
        match self {
            IndexResult::Common(r) => r.ids(),
            IndexResult::Hash(r) => r.ids(),
            IndexResult::Range(r) => r.ids(),
        }
    }

    pub fn sorted_ids(&self) -> Vec<u64> {
        match self {
            IndexResult::Common(r) => r.ids(),
            other => {
                let mut ids = other.ids();
                ids.sort_unstable();
                ids
            }
        }
    }

    pub fn weights(&self) -> Vec<f32> {
        match self {
            IndexResult::Common(r) => r.weights(),
            IndexResult::Hash(r) => r.weights(),
            IndexResult::Range(r) => r.weights(),
        }
    }

    pub fn sum_weight(&self) -> f32 {
        match self {
            IndexResult::Common(r) => r.sum_weight(),
            IndexResult::Hash(r) => r.sum_weight(),
            IndexResult::Range(r) => r.sum_weight(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            IndexResult::Common(r) => r.len(),
            IndexResult::Hash(r) => r.len(),
            IndexResult::Range(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `count` weighted draws with replacement. Empty when the result holds no
    /// weight.
    pub fn sample(&self, count: usize) -> Vec<(u64, f32)> {
        match self {
            IndexResult::Common(r) => r.sample(count),
            IndexResult::Hash(r) => r.sample(count),
            IndexResult::Range(r) => r.sample(count),
        }
    }

    /// Whether the sampler has been built by a previous [`IndexResult::sample`].
    pub fn sampler_ready(&self) -> bool {
        match self {
            IndexResult::Common(r) => r.sampler.is_built(),
            IndexResult::Hash(r) => r.sampler.is_built(),
            IndexResult::Range(r) => r.sampler.is_built(),
        }
    }

    pub fn to_common(&self) -> CommonIndexResult {
        self.as_common().into_owned()
    }

    fn as_common(&self) -> Cow<'_, CommonIndexResult> {
        match self {
            IndexResult::Common(r) => Cow::Borrowed(r),
            IndexResult::Hash(r) => Cow::Owned(r.to_common()),
            IndexResult::Range(r) => Cow::Owned(r.to_common()),
        }
    }

    pub fn intersection(&self, other: &IndexResult) -> IndexResult {
        match (self, other) {
            (IndexResult::Hash(l), IndexResult::Hash(r)) if l.name() == r.name() => {
                IndexResult::Hash(l.intersection(r))
            }
            (IndexResult::Range(l), IndexResult::Range(r)) if l.shares_backing(r) => {
                IndexResult::Range(l.intersection(r))
            }
            _ => IndexResult::Common(self.as_common().intersection(&other.as_common())),
        }
    }

    pub fn union(&self, other: &IndexResult) -> IndexResult {
        match (self, other) {
            (IndexResult::Hash(l), IndexResult::Hash(r)) if l.name() == r.name() => {
                IndexResult::Hash(l.union(r))
            }
            (IndexResult::Range(l), IndexResult::Range(r)) if l.shares_backing(r) => {
                IndexResult::Range(l.union(r))
            }
            _ => IndexResult::Common(self.as_common().union(&other.as_common())),
        }
    }
}

impl From<CommonIndexResult> for IndexResult {
    fn from(r: CommonIndexResult) -> Self {
        IndexResult::Common(r)
    }
}

impl From<HashIndexResult> for IndexResult {
    fn from(r: HashIndexResult) -> Self {
        IndexResult::Hash(r)
    }
}

impl From<RangeIndexResult> for IndexResult {
    fn from(r: RangeIndexResult) -> Self {
        IndexResult::Range(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn common(pairs: &[(u64, f32)]) -> IndexResult {
        CommonIndexResult::new("c", pairs.to_vec()).into()
    }

    #[test]
    fn test_left_weight_wins_both_orderings() {
        let a = common(&[(4, 1.0)]);
        let b = common(&[(4, 2.0)]);
        assert_eq!(a.intersection(&b).weights(), vec![1.0]);
        assert_eq!(b.intersection(&a).weights(), vec![2.0]);
        assert_eq!(a.union(&b).weights(), vec![1.0]);
        assert_eq!(b.union(&a).weights(), vec![2.0]);
    }

    #[test]
    fn test_empty_result() {
        let r = IndexResult::empty("x");
        assert!(r.is_empty());
        assert_eq!(r.sum_weight(), 0.0);
        assert!(r.sample(10).is_empty());
    }

    #[test]
    fn test_sampler_built_once_across_threads() {
        let r = Arc::new(common(&[(1, 1.0), (2, 3.0), (3, 6.0)]));
        assert!(!r.sampler_ready());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || r.sample(1_000))
            })
            .collect();
        for h in handles {
            let draws = h.join().unwrap();
            assert_eq!(draws.len(), 1_000);
            for (id, w) in draws {
                assert!(matches!((id, w), (1, 1.0) | (2, 3.0) | (3, 6.0)));
            }
        }
        assert!(r.sampler_ready());
    }

    #[test]
    fn test_weightless_result_samples_nothing() {
        let r = common(&[(1, 0.0), (2, 0.0)]);
        assert_eq!(r.len(), 2);
        assert!(r.sample(5).is_empty());
    }
}
