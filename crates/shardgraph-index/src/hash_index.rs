//! Hash sample index: one weighted id bucket per categorical value.
//!
//! Segment layout: `(value, ids[], weights[])` records repeated until the end
//! of the segment.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ahash::AHashMap;
use shardgraph_core::{slice_size, BytesReader, BytesWriter, CoreError, WeightedCollection};

use crate::error::{rejected, IndexError, Result};
use crate::meta::IndexKind;
use crate::result::{HashIndexResult, IndexResult, WeightedIds};
use crate::sample_index::{check_merge_names, unsupported, MergeableIndex, SampleIndex};
use crate::search::{split_list, SearchOp};
use crate::value::{IndexId, IndexValue};

#[derive(Debug, Clone)]
struct Bucket<Id> {
    label: Arc<str>,
    items: Arc<WeightedCollection<Id>>,
}

#[derive(Debug, Clone)]
pub struct HashSampleIndex<Id, V> {
    name: String,
    buckets: AHashMap<V, Bucket<Id>>,
}

impl<Id: IndexId, V: IndexValue> HashSampleIndex<Id, V> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            buckets: AHashMap::new(),
        }
    }

    /// Add the bucket for `value`. Fails if the value already has one.
    pub fn add_item(&mut self, value: V, ids: Vec<Id>, weights: Vec<f32>) -> Result<()> {
        if self.buckets.contains_key(&value) {
            return Err(IndexError::DuplicateKey {
                index: self.name.clone(),
                key: value.to_string(),
            });
        }
        let items = WeightedCollection::new(ids, weights)
            .map_err(|e| IndexError::invalid(&self.name, e.to_string()))?;
        self.insert_bucket(value, Arc::new(items));
        Ok(())
    }

    fn insert_bucket(&mut self, value: V, items: Arc<WeightedCollection<Id>>) {
        let label: Arc<str> = Arc::from(value.label());
        self.buckets.insert(value, Bucket { label, items });
    }

    /// Bucket for `value`, if any.
    pub fn get(&self, value: &V) -> Option<&WeightedCollection<Id>> {
        self.buckets.get(value).map(|b| b.items.as_ref())
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    fn sorted_buckets(&self) -> Vec<(&V, &Bucket<Id>)> {
        let mut buckets: Vec<(&V, &Bucket<Id>)> = self.buckets.iter().collect();
        buckets.sort_by(|a, b| a.0.cmp(b.0));
        buckets
    }

    fn select<'a>(&'a self, values: impl IntoIterator<Item = &'a V>) -> HashIndexResult {
        let buckets: BTreeMap<Arc<str>, Arc<dyn WeightedIds>> = values
            .into_iter()
            .filter_map(|v| self.buckets.get(v))
            .map(|b| {
                let items: Arc<dyn WeightedIds> = b.items.clone();
                (Arc::clone(&b.label), items)
            })
            .collect();
        HashIndexResult::new(&self.name, buckets)
    }

    fn parse(&self, value: &str) -> Result<V> {
        V::parse_value(value).ok_or_else(|| {
            rejected(IndexError::invalid(
                &self.name,
                format!("`{value}` is not a valid {}", V::DATA_TYPE),
            ))
        })
    }

    fn parse_list(&self, value: &str) -> Result<BTreeSet<V>> {
        split_list(value).map(|item| self.parse(item)).collect()
    }

    /// Typed search returning the bucket representation directly.
    pub fn search_hash(&self, op: SearchOp, value: &str) -> Result<HashIndexResult> {
        match op {
            SearchOp::Eq => {
                let v = self.parse(value)?;
                Ok(self.select([&v]))
            }
            SearchOp::NotEq => {
                let v = self.parse(value)?;
                Ok(self.select(self.buckets.keys().filter(|k| **k != v)))
            }
            SearchOp::In => {
                let wanted = self.parse_list(value)?;
                Ok(self.select(wanted.iter()))
            }
            SearchOp::NotIn => {
                let excluded = self.parse_list(value)?;
                Ok(self.select(self.buckets.keys().filter(|k| !excluded.contains(*k))))
            }
            SearchOp::Less | SearchOp::LessEq | SearchOp::Greater | SearchOp::GreaterEq => {
                Err(unsupported(&self.name, IndexKind::Hash, op))
            }
        }
    }

    /// Union two buckets' pairs, sort by id and keep the first pair per id.
    fn merge_bucket(
        left: &WeightedCollection<Id>,
        right: &WeightedCollection<Id>,
    ) -> shardgraph_core::Result<WeightedCollection<Id>> {
        let mut pairs: Vec<(Id, f32)> = left.iter().chain(right.iter()).collect();
        pairs.sort_by_key(|&(id, _)| id);
        pairs.dedup_by_key(|&mut (id, _)| id);
        WeightedCollection::from_pairs(pairs)
    }

    fn read_bucket(
        r: &mut BytesReader<'_>,
    ) -> shardgraph_core::Result<(V, WeightedCollection<Id>)> {
        let value = V::read_one(r)?;
        let ids = r.read_vec::<Id>()?;
        let weights = r.read_vec::<f32>()?;
        if ids.len() != weights.len() {
            return Err(CoreError::LengthMismatch {
                ids: ids.len(),
                weights: weights.len(),
            });
        }
        Ok((value, WeightedCollection::new(ids, weights)?))
    }

    fn absorb(
        &mut self,
        value: V,
        incoming: Arc<WeightedCollection<Id>>,
    ) -> shardgraph_core::Result<()> {
        match self.buckets.get_mut(&value) {
            Some(bucket) => {
                bucket.items = Arc::new(Self::merge_bucket(&bucket.items, &incoming)?);
            }
            None => self.insert_bucket(value, incoming),
        }
        Ok(())
    }
}

impl<Id: IndexId, V: IndexValue> SampleIndex for HashSampleIndex<Id, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Hash
    }

    fn search(&self, op: SearchOp, value: &str) -> Result<IndexResult> {
        self.search_hash(op, value).map(IndexResult::Hash)
    }

    fn search_all(&self) -> Result<IndexResult> {
        Ok(IndexResult::Hash(self.select(self.buckets.keys())))
    }

    fn keys(&self) -> Vec<String> {
        self.sorted_buckets()
            .into_iter()
            .map(|(_, b)| b.label.to_string())
            .collect()
    }

    fn row_count(&self) -> usize {
        self.buckets.values().map(|b| b.items.len()).sum()
    }

    fn serialized_size(&self) -> usize {
        self.buckets
            .iter()
            .map(|(v, b)| {
                v.encoded_len() + slice_size::<Id>(b.items.len()) + slice_size::<f32>(b.items.len())
            })
            .sum()
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = BytesWriter::with_capacity(self.serialized_size());
        for (v, bucket) in self.sorted_buckets() {
            let items = &bucket.items;
            v.write_one(&mut w)
                .and_then(|_| w.write_slice(items.ids()))
                .and_then(|_| w.write_slice(items.weights()))
                .map_err(|e| IndexError::corrupt(&self.name, e))?;
        }
        Ok(w.into_inner())
    }
}

impl<Id: IndexId, V: IndexValue> MergeableIndex for HashSampleIndex<Id, V> {
    fn empty(name: &str) -> Self {
        Self::new(name)
    }

    fn deserialize(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut index = Self::new(name);
        let mut r = BytesReader::new(bytes);
        while !r.is_exhausted() {
            let record = Self::read_bucket(&mut r);
            let (value, items) = record.map_err(|e| {
                tracing::error!(
                    index = name,
                    offset = r.position(),
                    error = %e,
                    "corrupt hash record"
                );
                IndexError::corrupt(name, e)
            })?;
            index
                .absorb(value, Arc::new(items))
                .map_err(|e| IndexError::corrupt(name, e))?;
        }
        Ok(index)
    }

    fn merge(&mut self, other: Self) -> Result<()> {
        check_merge_names(&self.name, &other.name, IndexKind::Hash)?;
        for (value, bucket) in other.buckets {
            self.absorb(value, bucket.items)
                .map_err(|e| IndexError::corrupt(&self.name, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::F32Value;

    fn index() -> HashSampleIndex<u32, String> {
        let mut h = HashSampleIndex::new("color");
        h.add_item("red".into(), vec![0, 1, 2], vec![2.0, 4.0, 8.0]).unwrap();
        h.add_item("blue".into(), vec![4, 5, 6], vec![1.0, 1.0, 2.0]).unwrap();
        h.add_item("green".into(), vec![7], vec![3.0]).unwrap();
        h
    }

    #[test]
    fn test_add_item_rejects_duplicate_key() {
        let mut h = index();
        let err = h.add_item("red".into(), vec![9], vec![1.0]).unwrap_err();
        assert!(matches!(err, IndexError::DuplicateKey { .. }));
        assert_eq!(h.bucket_count(), 3);
    }

    #[test]
    fn test_eq_and_not_eq() {
        let h = index();
        let eq = h.search(SearchOp::Eq, "red").unwrap();
        assert_eq!(eq.sorted_ids(), vec![0, 1, 2]);
        assert_eq!(eq.sum_weight(), 14.0);

        let ne = h.search(SearchOp::NotEq, "red").unwrap();
        assert_eq!(ne.sorted_ids(), vec![4, 5, 6, 7]);

        assert!(h.search(SearchOp::Eq, "purple").unwrap().is_empty());
    }

    #[test]
    fn test_in_matches_union_of_eq() {
        let h = index();
        let within = h.search(SearchOp::In, "red::green::purple").unwrap();
        let union = h
            .search(SearchOp::Eq, "red")
            .unwrap()
            .union(&h.search(SearchOp::Eq, "green").unwrap());
        assert_eq!(within.sorted_ids(), union.sorted_ids());
        assert_eq!(within.sorted_ids(), vec![0, 1, 2, 7]);
    }

    #[test]
    fn test_not_in_is_key_difference() {
        let h = index();
        let r = h.search(SearchOp::NotIn, "red::blue").unwrap();
        assert_eq!(r.sorted_ids(), vec![7]);
    }

    #[test]
    fn test_range_operators_unsupported() {
        let h = index();
        for op in [SearchOp::Less, SearchOp::LessEq, SearchOp::Greater, SearchOp::GreaterEq] {
            let err = h.search(op, "red").unwrap_err();
            assert!(matches!(err, IndexError::UnsupportedOperation { .. }));
        }
    }

    #[test]
    fn test_numeric_values_reject_bad_operand() {
        let mut h: HashSampleIndex<u64, i32> = HashSampleIndex::new("level");
        h.add_item(3, vec![1], vec![1.0]).unwrap();
        let err = h.search(SearchOp::Eq, "three").unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument { .. }));
        assert_eq!(h.search(SearchOp::Eq, "3").unwrap().ids(), vec![1]);
    }

    #[test]
    fn test_merge_dedups_by_id_keeping_first() {
        let mut a: HashSampleIndex<u32, String> = HashSampleIndex::new("h");
        a.add_item("k".into(), vec![3, 1], vec![3.0, 1.0]).unwrap();
        let mut b: HashSampleIndex<u32, String> = HashSampleIndex::new("h");
        b.add_item("k".into(), vec![1, 2], vec![9.0, 2.0]).unwrap();
        b.add_item("x".into(), vec![8], vec![8.0]).unwrap();

        a.merge(b).unwrap();
        let k = a.get(&"k".to_string()).unwrap();
        assert_eq!(k.ids(), &[1, 2, 3]);
        assert_eq!(k.weights(), &[1.0, 2.0, 3.0]);
        assert_eq!(a.keys(), vec!["k", "x"]);
    }

    #[test]
    fn test_serialize_size_and_reload() {
        let h = index();
        let bytes = h.serialize().unwrap();
        assert_eq!(bytes.len(), h.serialized_size());
        let back = HashSampleIndex::<u32, String>::deserialize("color", &bytes).unwrap();
        assert_eq!(back.keys(), h.keys());
        assert_eq!(back.row_count(), 7);
        assert_eq!(
            back.get(&"blue".to_string()).unwrap().weights(),
            &[1.0, 1.0, 2.0]
        );
    }

    #[test]
    fn test_distinct_nan_values_keep_separate_buckets() {
        let mut h: HashSampleIndex<u32, F32Value> = HashSampleIndex::new("score");
        h.add_item(F32Value(f32::NAN), vec![1], vec![1.0]).unwrap();
        h.add_item(F32Value(f32::from_bits(0x7fc0_0001)), vec![2], vec![2.0]).unwrap();
        h.add_item(F32Value(0.5), vec![3], vec![4.0]).unwrap();

        let all = h.search_all().unwrap();
        assert_eq!(all.sorted_ids(), vec![1, 2, 3]);
        assert_eq!(all.sum_weight(), 7.0);
        assert_eq!(h.keys().len(), 3);
        assert_eq!(h.search(SearchOp::NotEq, "0.5").unwrap().sorted_ids(), vec![1, 2]);
    }

    #[test]
    fn test_mismatched_record_is_corrupt() {
        let mut w = BytesWriter::new();
        "k".to_string().write_one(&mut w).unwrap();
        w.write_slice(&[1u32, 2]).unwrap();
        w.write_slice(&[1.0f32]).unwrap();
        let err = HashSampleIndex::<u32, String>::deserialize("h", w.as_slice()).unwrap_err();
        assert!(matches!(err, IndexError::CorruptData { .. }));
    }
}
