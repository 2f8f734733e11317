//! Dense per-node feature columns.
//!
//! A column keeps every feature's values back to back in one array, with
//! `idx[f]` holding the end offset of feature `f`.

use shardgraph_core::{bytes_size, slice_size, BytesReader, BytesWriter, CoreError};

use crate::error::{corrupt, GraphError};

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureColumn<T> {
    idx: Vec<i32>,
    values: Vec<T>,
}

impl<T> Default for FeatureColumn<T> {
    fn default() -> Self {
        Self {
            idx: Vec::new(),
            values: Vec::new(),
        }
    }
}

impl<T: Clone> FeatureColumn<T> {
    pub fn from_lists(features: Vec<Vec<T>>) -> Result<Self, CoreError> {
        let mut column = Self::default();
        for feature in features {
            column.values.extend(feature);
            let end = i32::try_from(column.values.len())
                .map_err(|_| CoreError::Oversized { len: column.values.len() })?;
            column.idx.push(end);
        }
        Ok(column)
    }

    /// Rebuild from persisted offsets, checking they cover `values` exactly.
    pub(crate) fn from_parts(idx: Vec<i32>, values: Vec<T>) -> Result<Self, String> {
        let mut prev = 0;
        for &end in &idx {
            if end < prev {
                return Err(format!("feature offset {end} after {prev}"));
            }
            prev = end;
        }
        if prev as usize != values.len() {
            return Err(format!("feature offsets end at {prev}, {} values", values.len()));
        }
        Ok(Self { idx, values })
    }

    pub fn feature_count(&self) -> usize {
        self.idx.len()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn offsets(&self) -> &[i32] {
        &self.idx
    }

    fn slot(&self, fid: i32) -> Option<&[T]> {
        let f = usize::try_from(fid).ok().filter(|&f| f < self.idx.len())?;
        let begin = if f == 0 { 0 } else { self.idx[f - 1] as usize };
        self.values.get(begin..self.idx[f] as usize)
    }

    /// Per-fid value counts and the concatenated values. An unknown fid counts
    /// zero values.
    pub fn get(&self, fids: &[i32]) -> (Vec<u32>, Vec<T>) {
        let mut nums = Vec::with_capacity(fids.len());
        let mut values = Vec::new();
        for &fid in fids {
            match self.slot(fid) {
                Some(slot) => {
                    nums.push(slot.len() as u32);
                    values.extend_from_slice(slot);
                }
                None => nums.push(0),
            }
        }
        (nums, values)
    }

    /// One vector per known fid. Unknown fids are skipped.
    pub fn get_vec(&self, fids: &[i32]) -> Vec<Vec<T>> {
        fids.iter()
            .filter_map(|&fid| self.slot(fid))
            .map(<[T]>::to_vec)
            .collect()
    }

    /// Largest value count of any feature, at least 1.
    pub fn max_value_num(&self) -> usize {
        let mut prev = 0;
        let mut max = 1;
        for &end in &self.idx {
            max = max.max((end - prev) as usize);
            prev = end;
        }
        max
    }
}

/// uint64, float32 and binary columns of one node.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NodeFeatures {
    pub uint64: FeatureColumn<u64>,
    pub float32: FeatureColumn<f32>,
    pub binary: FeatureColumn<u8>,
}

impl NodeFeatures {
    pub fn new(
        uint64: Vec<Vec<u64>>,
        float32: Vec<Vec<f32>>,
        binary: Vec<Vec<u8>>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            uint64: FeatureColumn::from_lists(uint64)?,
            float32: FeatureColumn::from_lists(float32)?,
            binary: FeatureColumn::from_lists(binary)?,
        })
    }

    pub(crate) fn write_to(&self, w: &mut BytesWriter) -> shardgraph_core::Result<()> {
        w.write_slice(&self.uint64.idx)?;
        w.write_slice(&self.uint64.values)?;
        w.write_slice(&self.float32.idx)?;
        w.write_slice(&self.float32.values)?;
        w.write_slice(&self.binary.idx)?;
        w.write_bytes(&self.binary.values)
    }

    pub(crate) fn encoded_len(&self) -> usize {
        slice_size::<i32>(self.uint64.idx.len())
            + slice_size::<u64>(self.uint64.values.len())
            + slice_size::<i32>(self.float32.idx.len())
            + slice_size::<f32>(self.float32.values.len())
            + slice_size::<i32>(self.binary.idx.len())
            + bytes_size(self.binary.values.len())
    }

    pub(crate) fn read_from(node: u64, r: &mut BytesReader<'_>) -> Result<Self, GraphError> {
        let u64_idx = r.read_vec::<i32>().map_err(corrupt(node, "u64_idx"))?;
        let u64_values = r.read_vec::<u64>().map_err(corrupt(node, "u64_values"))?;
        let f32_idx = r.read_vec::<i32>().map_err(corrupt(node, "f32_idx"))?;
        let f32_values = r.read_vec::<f32>().map_err(corrupt(node, "f32_values"))?;
        let bin_idx = r.read_vec::<i32>().map_err(corrupt(node, "bin_idx"))?;
        let bin_values = r.read_bytes().map_err(corrupt(node, "bin_values"))?.to_vec();

        let inconsistent = |message: String| GraphError::Inconsistent { node, message };
        Ok(Self {
            uint64: FeatureColumn::from_parts(u64_idx, u64_values).map_err(inconsistent)?,
            float32: FeatureColumn::from_parts(f32_idx, f32_values).map_err(inconsistent)?,
            binary: FeatureColumn::from_parts(bin_idx, bin_values).map_err(inconsistent)?,
        })
    }
}
