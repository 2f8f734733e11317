//! Hash-of-range index: a range index per categorical key.
//!
//! Queries take the form `key::operand`. The key selects a per-key range
//! index and the operand (which may itself be a `::` list for `IN`/`NOT_IN`)
//! is evaluated against it.
//!
//! Segment layout: `(key, ids[], values[], weights[])` repeated until the end
//! of the segment.

use ahash::AHashMap;
use shardgraph_core::{BytesReader, BytesWriter, FixedWidth};

use crate::error::{rejected, IndexError, Result};
use crate::meta::IndexKind;
use crate::range_index::RangeSampleIndex;
use crate::result::IndexResult;
use crate::sample_index::{check_merge_names, unsupported, MergeableIndex, SampleIndex};
use crate::search::{SearchOp, LIST_DELIM};
use crate::value::{IndexId, IndexValue};

#[derive(Debug, Clone)]
pub struct HashRangeSampleIndex<Id, V> {
    name: String,
    ranges: AHashMap<Id, RangeSampleIndex<Id, V>>,
}

impl<Id: IndexId, V: IndexValue> HashRangeSampleIndex<Id, V> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ranges: AHashMap::new(),
        }
    }

    fn range_name(&self, key: Id) -> String {
        format!("{}_{}", self.name, key)
    }

    /// Add the range index for `key`. Fails if the key already has one.
    pub fn add_item(
        &mut self,
        key: Id,
        ids: Vec<Id>,
        values: Vec<V>,
        weights: Vec<f32>,
    ) -> Result<()> {
        if self.ranges.contains_key(&key) {
            return Err(IndexError::DuplicateKey {
                index: self.name.clone(),
                key: key.to_string(),
            });
        }
        let range = RangeSampleIndex::build(&self.range_name(key), ids, values, weights)?;
        self.ranges.insert(key, range);
        Ok(())
    }

    pub fn get(&self, key: &Id) -> Option<&RangeSampleIndex<Id, V>> {
        self.ranges.get(key)
    }

    fn sorted_keys(&self) -> Vec<Id> {
        let mut keys: Vec<Id> = self.ranges.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    /// Split `key::operand` and resolve the key.
    fn split_query<'v>(&self, value: &'v str) -> Result<(Id, &'v str)> {
        let Some((key, operand)) = value.split_once(LIST_DELIM) else {
            return Err(rejected(IndexError::format(
                &self.name,
                format!("`{value}` is missing the `{LIST_DELIM}` key separator"),
            )));
        };
        let key = key.trim().parse::<Id>().map_err(|_| {
            rejected(IndexError::invalid(
                &self.name,
                format!("`{key}` is not a valid {} key", Id::DATA_TYPE),
            ))
        })?;
        Ok((key, operand))
    }
}

impl<Id: IndexId, V: IndexValue> SampleIndex for HashRangeSampleIndex<Id, V> {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> IndexKind {
        IndexKind::HashRange
    }

    /// An absent key matches nothing.
    fn search(&self, op: SearchOp, value: &str) -> Result<IndexResult> {
        let (key, operand) = self.split_query(value)?;
        match self.ranges.get(&key) {
            Some(range) => range.search(op, operand),
            None => {
                tracing::debug!(index = %self.name, %key, "no range for key");
                Ok(IndexResult::empty(&self.range_name(key)))
            }
        }
    }

    fn search_all(&self) -> Result<IndexResult> {
        Err(unsupported(&self.name, IndexKind::HashRange, "search_all"))
    }

    fn keys(&self) -> Vec<String> {
        self.sorted_keys().into_iter().map(|k| k.to_string()).collect()
    }

    fn row_count(&self) -> usize {
        self.ranges.values().map(RangeSampleIndex::len).sum()
    }

    fn serialized_size(&self) -> usize {
        self.ranges
            .values()
            .map(|r| Id::WIDTH + r.record_size())
            .sum()
    }

    fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = BytesWriter::with_capacity(self.serialized_size());
        for key in self.sorted_keys() {
            let Some(range) = self.ranges.get(&key) else {
                continue;
            };
            w.write(key);
            range
                .write_record(&mut w)
                .map_err(|e| IndexError::corrupt(&self.name, e))?;
        }
        Ok(w.into_inner())
    }
}

impl<Id: IndexId, V: IndexValue> MergeableIndex for HashRangeSampleIndex<Id, V> {
    fn empty(name: &str) -> Self {
        Self::new(name)
    }

    fn deserialize(name: &str, bytes: &[u8]) -> Result<Self> {
        let mut index = Self::new(name);
        let mut r = BytesReader::new(bytes);
        while !r.is_exhausted() {
            let record = r.read::<Id>().and_then(|key| {
                RangeSampleIndex::from_record(&index.range_name(key), &mut r)
                    .map(|range| (key, range))
            });
            let (key, range) = record.map_err(|e| {
                tracing::error!(
                    index = name,
                    offset = r.position(),
                    error = %e,
                    "corrupt hash range record"
                );
                IndexError::corrupt(name, e)
            })?;
            if index.ranges.insert(key, range).is_some() {
                return Err(IndexError::DuplicateKey {
                    index: name.to_string(),
                    key: key.to_string(),
                });
            }
        }
        Ok(index)
    }

    /// Per-key range merge; keys only in `other` are moved over.
    fn merge(&mut self, other: Self) -> Result<()> {
        check_merge_names(&self.name, &other.name, IndexKind::HashRange)?;
        for (key, range) in other.ranges {
            match self.ranges.get_mut(&key) {
                Some(existing) => existing.merge(range)?,
                None => {
                    self.ranges.insert(key, range);
                }
            }
        }
        Ok(())
    }
}
