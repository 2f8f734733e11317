//! Range sample index: rows sorted by value with cumulative weights.
//!
//! Every relational operator resolves to one or two binary searches over the
//! sorted values and yields sections of the shared row array.
//!
//! Segment record: `ids[]`, `values[]`, `weights[]` with per-row weights. A
//! segment may hold several records back to back; they are concatenated and
//! re-sorted on load.

use std::sync::Arc;

use shardgraph_core::{cumulative, slice_size, weight_at, BytesReader, BytesWriter, CoreError};

use crate::error::{rejected, IndexError, Result};
use crate::meta::IndexKind;
use crate::result::{IndexResult, RangeColumns, RangeIndexResult};
use crate::sample_index::{check_merge_names, MergeableIndex, SampleIndex};
use crate::search::{split_list, SearchOp};
use crate::value::{IndexId, IndexValue};

/// Backing rows shared with every result cut from the index.
#[derive(Debug, Clone, Default)]
pub struct RangeRows<Id> {
    ids: Vec<Id>,
    cum_weights: Vec<f32>,
}

impl<Id: IndexId> RangeColumns for RangeRows<Id> {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn id_at(&self, i: usize) -> u64 {
        self.ids[i].to_u64()
    }

    fn cum_weight_at(&self, i: usize) -> f32 {
        self.cum_weights[i]
    }
}

type Triple<Id, V> = (Id, V, f32);

#[derive(Debug, Clone)]
pub struct RangeSampleIndex<Id, V> {
    name: String,
    rows: Arc<RangeRows<Id>>,
    values: Vec<V>,
}

impl<Id: IndexId, V: IndexValue> RangeSampleIndex<Id, V> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            rows: Arc::new(RangeRows {
                ids: Vec::new(),
                cum_weights: Vec::new(),
            }),
            values: Vec::new(),
        }
    }

    /// Build from parallel columns in any order. Rows are stably sorted by
    /// value.
    pub fn build(name: &str, ids: Vec<Id>, values: Vec<V>, weights: Vec<f32>) -> Result<Self> {
        if ids.len() != values.len() || ids.len() != weights.len() {
            return Err(IndexError::invalid(
                name,
                format!(
                    "column lengths differ: {} ids, {} values, {} weights",
                    ids.len(),
                    values.len(),
                    weights.len()
                ),
            ));
        }
        if let Some(w) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(IndexError::invalid(name, format!("bad weight {w}")));
        }
        let triples = ids
            .into_iter()
            .zip(values)
            .zip(weights)
            .map(|((id, v), w)| (id, v, w))
            .collect();
        Ok(Self::from_triples(name, triples))
    }

    fn from_triples(name: &str, mut triples: Vec<Triple<Id, V>>) -> Self {
        triples.sort_by(|a, b| a.1.cmp(&b.1));
        let mut ids = Vec::with_capacity(triples.len());
        let mut values = Vec::with_capacity(triples.len());
        let mut weights = Vec::with_capacity(triples.len());
        for (id, v, w) in triples {
            ids.push(id);
            values.push(v);
            weights.push(w);
        }
        Self {
            name: name.to_string(),
            rows: Arc::new(RangeRows {
                ids,
                cum_weights: cumulative(&weights),
            }),
            values,
        }
    }

    fn into_triples(self) -> Vec<Triple<Id, V>> {
        let weights = self.weights();
        let rows = Arc::try_unwrap(self.rows).unwrap_or_else(|shared| (*shared).clone());
        rows.ids
            .into_iter()
            .zip(self.values)
            .zip(weights)
            .map(|((id, v), w)| (id, v, w))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn ids(&self) -> &[Id] {
        &self.rows.ids
    }

    pub fn values(&self) -> &[V] {
        &self.values
    }

    pub fn cum_weights(&self) -> &[f32] {
        &self.rows.cum_weights
    }

    /// Per-row weights recovered from the cumulative array.
    pub fn weights(&self) -> Vec<f32> {
        let cum = &self.rows.cum_weights;
        (0..cum.len()).map(|i| weight_at(cum, i)).collect()
    }

    fn lower_bound(&self, v: &V) -> usize {
        self.values.partition_point(|x| x < v)
    }

    fn upper_bound(&self, v: &V) -> usize {
        self.values.partition_point(|x| x <= v)
    }

    fn cut(&self, sections: impl IntoIterator<Item = (usize, usize)>) -> RangeIndexResult {
        let rows: Arc<dyn RangeColumns> = self.rows.clone();
        RangeIndexResult::new(&self.name, rows, sections)
    }

    fn parse(&self, value: &str) -> Result<V> {
        V::parse_value(value).ok_or_else(|| {
            rejected(IndexError::invalid(
                &self.name,
                format!("`{value}` is not a valid {}", V::DATA_TYPE),
            ))
        })
    }

    fn search_one(&self, op: SearchOp, v: &V) -> RangeIndexResult {
        let n = self.len();
        match op {
            SearchOp::Less => self.cut([(0, self.lower_bound(v))]),
            SearchOp::LessEq => self.cut([(0, self.upper_bound(v))]),
            SearchOp::Greater => self.cut([(self.upper_bound(v), n)]),
            SearchOp::GreaterEq => self.cut([(self.lower_bound(v), n)]),
            SearchOp::NotEq => self.cut([(0, self.lower_bound(v)), (self.upper_bound(v), n)]),
            SearchOp::Eq | SearchOp::In | SearchOp::NotIn => {
                self.cut([(self.lower_bound(v), self.upper_bound(v))])
            }
        }
    }

    /// Typed search returning the section representation directly.
    pub fn search_range(&self, op: SearchOp, value: &str) -> Result<RangeIndexResult> {
        match op {
            SearchOp::In => {
                let mut acc = self.cut(std::iter::empty());
                for item in split_list(value) {
                    let v = self.parse(item)?;
                    acc = acc.union(&self.search_one(SearchOp::Eq, &v));
                }
                Ok(acc)
            }
            SearchOp::NotIn => {
                let mut acc = self.cut([(0, self.len())]);
                for item in split_list(value) {
                    let v = self.parse(item)?;
                    acc = acc.intersection(&self.search_one(SearchOp::NotEq, &v));
                }
                Ok(acc)
            }
            _ => {
                let v = self.parse(value)?;
                Ok(self.search_one(op, &v))
            }
        }
    }

    pub(crate) fn write_record(&self, w: &mut BytesWriter) -> shardgraph_core::Result<()> {
        w.write_slice(&self.rows.ids)?;
        V::write_many(&self.values, w)?;
        w.write_slice(&self.weights())
    }

    pub(crate) fn record_size(&self) -> usize {
        slice_size::<Id>(self.len())
            + V::encoded_many_len(&self.values)
            + slice_size::<f32>(self.len())
    }

    /// Read one `(ids, values, weights)` record.
    pub(crate) fn read_record(
        r: &mut BytesReader<'_>,
    ) -> shardgraph_core::Result<Vec<Triple<Id, V>>> {
        let ids = r.read_vec::<Id>()?;
        let values = V::read_many(r)?;
        let weights = r.read_vec::<f32>()?;
        if ids.len() != values.len() || ids.len() != weights.len() {
            return Err(CoreError::LengthMismatch {
                ids: ids.len(),
                weights: values.len().max(weights.len()),
            });
        }
        Ok(ids
            .into_iter()
            .zip(values)
            .zip(weights)
            .map(|((id, v), w)| (id, v, w))
            .collect())
    }

    pub(crate) fn from_record(
        name: &str,
        r: &mut BytesReader<'_>,
    ) -> shardgraph_core::Result<Self> {
        Ok(Self::from_triples(name, Self::read_record(r)?))
    }
}

impl<Id: IndexId, V: IndexValue> SampleIndex for RangeSampleIndex<Id, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::Range
    }

    fn search(&self, op: SearchOp, value: &str) -> Result<IndexResult> {
        self.search_range(op, value).map(IndexResult::Range)
    }

    fn search_all(&self) -> Result<IndexResult> {
        Ok(IndexResult::Range(self.cut([(0, self.len())])))
    }

    fn keys(&self) -> Vec<String> {
        Vec::new()
    }

    fn row_count(&self) -> usize {
        self.len()
    }

    fn serialized_size(&self) -> usize {
        self.record_size()
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = BytesWriter::with_capacity(self.record_size());
        self.write_record(&mut w)
            .map_err(|e| IndexError::corrupt(&self.name, e))?;
        Ok(w.into_inner())
    }
}

impl<Id: IndexId, V: IndexValue> MergeableIndex for RangeSampleIndex<Id, V> {
    fn empty(name: &str) -> Self {
        Self::new(name)
    }

    fn deserialize(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut r = BytesReader::new(bytes);
        let mut triples = Vec::new();
        while !r.is_exhausted() {
            let record = Self::read_record(&mut r).map_err(|e| {
                tracing::error!(
                    index = name,
                    offset = r.position(),
                    error = %e,
                    "corrupt range record"
                );
                IndexError::corrupt(name, e)
            })?;
            triples.extend(record);
        }
        Ok(Self::from_triples(name, triples))
    }

    fn merge(&mut self, other: Self) -> Result<()> {
        self.merge_all(vec![other])
    }

    /// Concatenate every partial's rows, stable-sort once by value and rebuild
    /// the cumulative weights.
    fn merge_all(&mut self, others: Vec<Self>) -> Result<()> {
        for other in &others {
            check_merge_names(&self.name, &other.name, IndexKind::Range)?;
        }
        let name = std::mem::take(&mut self.name);
        let mut triples = std::mem::replace(self, Self::new(&name)).into_triples();
        for other in others {
            triples.extend(other.into_triples());
        }
        *self = Self::from_triples(&name, triples);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::F32Value;

    fn scenario() -> RangeSampleIndex<u32, F32Value> {
        RangeSampleIndex::build(
            "price",
            vec![0, 1, 2, 3, 4],
            [1.0, 2.0, 2.0, 3.0, 4.0].into_iter().map(F32Value).collect(),
            vec![2.0, 4.0, 8.0, 8.0, 16.0],
        )
        .unwrap()
    }

    #[test]
    fn test_greater_and_eq_scenario() {
        let index = scenario();
        let gt = index.search(SearchOp::Greater, "2.0").unwrap();
        assert_eq!(gt.sorted_ids(), vec![3, 4]);

        let eq = index.search(SearchOp::Eq, "2.0").unwrap();
        assert_eq!(eq.sorted_ids(), vec![1, 2]);
        assert_eq!(eq.sum_weight(), 12.0);
    }

    #[test]
    fn test_relational_bounds() {
        let index = scenario();
        let ids = |op: SearchOp, v: &str| index.search(op, v).unwrap().sorted_ids();
        assert_eq!(ids(SearchOp::Less, "2"), vec![0]);
        assert_eq!(ids(SearchOp::LessEq, "2"), vec![0, 1, 2]);
        assert_eq!(ids(SearchOp::GreaterEq, "3"), vec![3, 4]);
        assert_eq!(ids(SearchOp::Less, "0.5"), Vec::<u64>::new());
        assert_eq!(ids(SearchOp::Greater, "9"), Vec::<u64>::new());
    }

    #[test]
    fn test_not_eq_yields_two_sections() {
        let index = scenario();
        let IndexResult::Range(r) = index.search(SearchOp::NotEq, "2").unwrap() else {
            panic!("expected range result");
        };
        assert_eq!(r.sections(), &[(0, 1), (3, 5)]);
        assert_eq!(r.sum_weight(), 26.0);
    }

    #[test]
    fn test_in_and_not_in() {
        let index = scenario();
        let r = index.search(SearchOp::In, "1::4").unwrap();
        assert_eq!(r.sorted_ids(), vec![0, 4]);
        let r = index.search(SearchOp::NotIn, "2::4").unwrap();
        assert_eq!(r.sorted_ids(), vec![0, 3]);
        assert!(index.search(SearchOp::In, "").unwrap().is_empty());
        assert_eq!(index.search(SearchOp::NotIn, "").unwrap().len(), 5);
    }

    #[test]
    fn test_bad_operand_is_invalid_argument() {
        let index = scenario();
        let err = index.search(SearchOp::Less, "cheap").unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument { .. }));
        assert!(err.is_query_rejection());
    }

    #[test]
    fn test_build_sorts_by_value() {
        let index: RangeSampleIndex<u64, i64> =
            RangeSampleIndex::build("age", vec![10, 11, 12], vec![30, -5, 7], vec![1.0, 2.0, 3.0])
                .unwrap();
        assert_eq!(index.values(), &[-5, 7, 30]);
        assert_eq!(index.ids(), &[11, 12, 10]);
        assert_eq!(index.cum_weights(), &[2.0, 5.0, 6.0]);
    }

    #[test]
    fn test_build_rejects_ragged_columns() {
        let err = RangeSampleIndex::<u32, u32>::build("x", vec![1, 2], vec![1], vec![1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument { .. }));
    }

    #[test]
    fn test_serialize_writes_per_row_weights() {
        let index = scenario();
        let bytes = index.serialize().unwrap();
        assert_eq!(bytes.len(), index.serialized_size());

        let back = RangeSampleIndex::<u32, F32Value>::deserialize("price", &bytes).unwrap();
        assert_eq!(back.ids(), index.ids());
        assert_eq!(back.values(), index.values());
        assert_eq!(back.cum_weights(), index.cum_weights());
    }

    #[test]
    fn test_deserialize_concatenates_records() {
        let a = RangeSampleIndex::<u32, u32>::build("n", vec![1, 2], vec![5, 1], vec![1.0, 1.0])
            .unwrap();
        let b = RangeSampleIndex::<u32, u32>::build("n", vec![3], vec![3], vec![2.0]).unwrap();
        let mut bytes = a.serialize().unwrap();
        bytes.extend(b.serialize().unwrap());

        let back = RangeSampleIndex::<u32, u32>::deserialize("n", &bytes).unwrap();
        assert_eq!(back.values(), &[1, 3, 5]);
        assert_eq!(back.ids(), &[2, 3, 1]);
        assert_eq!(back.cum_weights(), &[1.0, 3.0, 4.0]);
    }

    #[test]
    fn test_truncated_segment_is_corrupt() {
        let mut bytes = scenario().serialize().unwrap();
        bytes.pop();
        let err = RangeSampleIndex::<u32, F32Value>::deserialize("price", &bytes).unwrap_err();
        assert!(matches!(err, IndexError::CorruptData { .. }));
    }

    #[test]
    fn test_merge_is_stable_by_value() {
        let mut a =
            RangeSampleIndex::<u32, u32>::build("n", vec![1, 2], vec![2, 4], vec![1.0, 1.0])
                .unwrap();
        let b = RangeSampleIndex::<u32, u32>::build("n", vec![3, 4], vec![2, 1], vec![2.0, 3.0])
            .unwrap();
        a.merge(b).unwrap();
        assert_eq!(a.values(), &[1, 2, 2, 4]);
        assert_eq!(a.ids(), &[4, 1, 3, 2]);
        assert_eq!(a.cum_weights(), &[3.0, 4.0, 6.0, 7.0]);
    }

    #[test]
    fn test_merge_rejects_other_index() {
        let mut a = RangeSampleIndex::<u32, u32>::new("a");
        let b = RangeSampleIndex::<u32, u32>::new("b");
        assert!(matches!(a.merge(b), Err(IndexError::MergeMismatch { .. })));
    }
}
