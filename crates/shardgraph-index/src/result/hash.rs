use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use shardgraph_core::WeightedCollection;

use super::{CommonIndexResult, SamplerCache};
use crate::value::IndexId;

/// Read-only view of a weighted id bucket, independent of the id width.
pub trait WeightedIds: Send + Sync + Debug {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn id_at(&self, i: usize) -> u64;

    fn weight_at(&self, i: usize) -> f32;

    fn sum_weight(&self) -> f32;
}

impl<Id: IndexId> WeightedIds for WeightedCollection<Id> {
    fn len(&self) -> usize {
        WeightedCollection::len(self)
    }

    fn id_at(&self, i: usize) -> u64 {
        self.ids()[i].to_u64()
    }

    fn weight_at(&self, i: usize) -> f32 {
        self.weights()[i]
    }

    fn sum_weight(&self) -> f32 {
        WeightedCollection::sum_weight(self)
    }
}

pub(crate) type Bucket = Arc<dyn WeightedIds>;

/// Buckets selected from one hash index, keyed by the categorical value's
/// label.
#[derive(Debug, Clone, Default)]
pub struct HashIndexResult {
    name: String,
    buckets: BTreeMap<Arc<str>, Bucket>,
    pub(super) sampler: SamplerCache,
}

impl HashIndexResult {
    pub(crate) fn new(name: &str, buckets: BTreeMap<Arc<str>, Bucket>) -> Self {
        Self {
            name: name.to_string(),
            buckets,
            sampler: SamplerCache::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Labels of the selected categorical values, in label order.
    pub fn keys(&self) -> Vec<String> {
        self.buckets.keys().map(|k| k.to_string()).collect()
    }

    fn pairs(&self) -> impl Iterator<Item = (u64, f32)> + '_ {
        self.buckets
            .values()
            .flat_map(|b| (0..b.len()).map(move |i| (b.id_at(i), b.weight_at(i))))
    }

    pub fn ids(&self) -> Vec<u64> {
        self.pairs().map(|(id, _)| id).collect()
    }

    pub fn weights(&self) -> Vec<f32> {
        self.pairs().map(|(_, w)| w).collect()
    }

    pub fn sum_weight(&self) -> f32 {
        self.buckets.values().map(|b| b.sum_weight()).sum()
    }

    pub fn len(&self) -> usize {
        self.buckets.values().map(|b| b.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample(&self, count: usize) -> Vec<(u64, f32)> {
        self.sampler.sample(count, || self.pairs().unzip())
    }

    pub fn to_common(&self) -> CommonIndexResult {
        CommonIndexResult::new(&self.name, self.pairs().collect())
    }

    /// Buckets present on both sides, taken from this side.
    pub fn intersection(&self, other: &HashIndexResult) -> HashIndexResult {
        let buckets = self
            .buckets
            .iter()
            .filter(|(k, _)| other.buckets.contains_key(*k))
            .map(|(k, b)| (Arc::clone(k), Arc::clone(b)))
            .collect();
        HashIndexResult::new(&self.name, buckets)
    }

    pub fn union(&self, other: &HashIndexResult) -> HashIndexResult {
        let mut buckets = self.buckets.clone();
        for (k, b) in &other.buckets {
            buckets
                .entry(Arc::clone(k))
                .or_insert_with(|| Arc::clone(b));
        }
        HashIndexResult::new(&self.name, buckets)
    }
}
