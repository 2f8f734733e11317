//! Per-node weighted neighbor lists, grouped by edge type.
//!
//! Neighbors of every group live in one flat array. Group `t` owns the slice
//! `group_end[t - 1]..group_end[t]`, sorted by neighbor id. The cumulative
//! weight array is parallel to it and restarts at each group boundary, so a
//! light group keeps its precision behind a heavy one. Edge types are
//! positional: type `t` names the `t`-th group.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};

use rand::Rng;
use shardgraph_core::{
    cumulative, random_select, slice_size, weight_at, BytesReader, BytesWriter, CoreError,
    WeightedCollection,
};

use crate::error::{corrupt, GraphError, Result};

/// Failed in-group draws tolerated per call before giving up with an empty
/// result.
const MAX_MISSED_DRAWS: usize = 64;

/// Relative slack allowed between a stored group total and its cumulative
/// array.
const TOTAL_TOLERANCE: f32 = 1e-4;

/// One neighbor as handed back to callers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedNeighbor {
    pub id: u64,
    pub weight: f32,
    pub edge_type: i32,
}

impl WeightedNeighbor {
    pub fn new(id: u64, weight: f32, edge_type: i32) -> Self {
        Self {
            id,
            weight,
            edge_type,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WeightedAdjacency {
    groups: WeightedCollection<i32>,
    group_end: Vec<u32>,
    neighbors: Vec<u64>,
    cum_weights: Vec<f32>,
}

impl WeightedAdjacency {
    /// Build from one `(neighbor, weight)` list per edge type.
    pub fn build(groups: Vec<Vec<(u64, f32)>>) -> Result<Self> {
        let mut group_end = Vec::with_capacity(groups.len());
        let mut group_weights = Vec::with_capacity(groups.len());
        let mut neighbors = Vec::new();
        let mut cum_weights = Vec::new();

        for (g, mut group) in groups.into_iter().enumerate() {
            if let Some(i) = group.iter().position(|(_, w)| !w.is_finite() || *w < 0.0) {
                return Err(GraphError::InvalidGroup {
                    group: g,
                    source: CoreError::InvalidWeight {
                        index: i,
                        weight: group[i].1,
                    },
                });
            }
            group.sort_by_key(|&(id, _)| id);
            let (ids, weights): (Vec<u64>, Vec<f32>) = group.into_iter().unzip();
            let cum = cumulative(&weights);
            group_weights.push(cum.last().copied().unwrap_or(0.0));
            neighbors.extend(ids);
            cum_weights.extend(cum);
            group_end.push(end_offset(neighbors.len())?);
        }

        let group_ids = (0..group_end.len() as i32).collect();
        let groups = WeightedCollection::new(group_ids, group_weights)
            .map_err(|source| GraphError::InvalidGroup { group: 0, source })?;
        Ok(Self {
            groups,
            group_end,
            neighbors,
            cum_weights,
        })
    }

    /// Build from parallel per-type id and weight lists.
    pub fn from_lists(ids: Vec<Vec<u64>>, weights: Vec<Vec<f32>>) -> Result<Self> {
        if ids.len() != weights.len() {
            return Err(GraphError::GroupMismatch {
                groups: ids.len(),
                weights: weights.len(),
            });
        }
        let mut groups = Vec::with_capacity(ids.len());
        for (g, (ids, weights)) in ids.into_iter().zip(weights).enumerate() {
            if ids.len() != weights.len() {
                return Err(GraphError::InvalidGroup {
                    group: g,
                    source: CoreError::LengthMismatch {
                        ids: ids.len(),
                        weights: weights.len(),
                    },
                });
            }
            groups.push(ids.into_iter().zip(weights).collect());
        }
        Self::build(groups)
    }

    pub fn group_count(&self) -> usize {
        self.group_end.len()
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    pub fn sum_weight(&self) -> f32 {
        self.groups.sum_weight()
    }

    /// Total weight of group `edge_type`, `None` when out of range.
    pub fn group_weight(&self, edge_type: i32) -> Option<f32> {
        let g = self.group_index(edge_type)?;
        self.groups.weights().get(g).copied()
    }

    fn group_index(&self, edge_type: i32) -> Option<usize> {
        usize::try_from(edge_type)
            .ok()
            .filter(|&g| g < self.group_count())
    }

    fn check_type(&self, edge_type: i32) -> Result<usize> {
        self.group_index(edge_type).ok_or_else(|| {
            tracing::warn!(edge_type, groups = self.group_count(), "invalid edge type");
            GraphError::InvalidEdgeType {
                edge_type,
                group_count: self.group_count(),
            }
        })
    }

    fn bounds(&self, g: usize) -> (usize, usize) {
        let begin = if g == 0 { 0 } else { self.group_end[g - 1] as usize };
        (begin, self.group_end[g] as usize)
    }

    /// Neighbor at flat position `pos` of the group starting at `begin`.
    fn neighbor_at(&self, begin: usize, pos: usize, edge_type: i32) -> WeightedNeighbor {
        let weight = weight_at(&self.cum_weights[begin..], pos - begin);
        WeightedNeighbor::new(self.neighbors[pos], weight, edge_type)
    }

    fn draw_in_group<R: Rng + ?Sized>(&self, rng: &mut R, g: usize) -> Option<WeightedNeighbor> {
        let (begin, end) = self.bounds(g);
        let cum = &self.cum_weights[begin..end];
        random_select(rng, cum, 0, cum.len())
            .map(|i| self.neighbor_at(begin, begin + i, g as i32))
    }

    /// Draw `count` neighbors, picking the group of each draw with `pick`.
    ///
    /// Gives up with an empty result once too many picked groups yield
    /// nothing, so a weightless group can never stall the caller.
    fn draw<R, F>(&self, rng: &mut R, count: usize, mut pick: F) -> Vec<WeightedNeighbor>
    where
        R: Rng + ?Sized,
        F: FnMut(&mut R) -> Option<usize>,
    {
        let mut out = Vec::with_capacity(count);
        let mut missed = 0;
        while out.len() < count {
            let Some(g) = pick(rng) else {
                return Vec::new();
            };
            match self.draw_in_group(rng, g) {
                Some(n) => out.push(n),
                None => {
                    missed += 1;
                    if missed > MAX_MISSED_DRAWS {
                        tracing::warn!(group = g, missed, "picked groups carry no weight");
                        return Vec::new();
                    }
                }
            }
        }
        out
    }

    /// `count` neighbors drawn with replacement, proportional to edge weight.
    ///
    /// An empty `edge_types` samples across every group. Returns `Ok(vec![])`
    /// when the selected groups hold no weight.
    pub fn sample_neighbor(
        &self,
        edge_types: &[i32],
        count: usize,
    ) -> Result<Vec<WeightedNeighbor>> {
        self.sample_neighbor_with(&mut rand::thread_rng(), edge_types, count)
    }

    pub fn sample_neighbor_with<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        edge_types: &[i32],
        count: usize,
    ) -> Result<Vec<WeightedNeighbor>> {
        let selected = edge_types
            .iter()
            .map(|&t| self.check_type(t))
            .collect::<Result<BTreeSet<usize>>>()?;
        if count == 0 || self.group_count() == 0 {
            return Ok(Vec::new());
        }

        if let (1, Some(&g)) = (selected.len(), selected.first()) {
            if self.groups.weights()[g] <= 0.0 {
                tracing::debug!(edge_type = g, "no weighted neighbors of this type");
                return Ok(Vec::new());
            }
            return Ok(self.draw(rng, count, |_| Some(g)));
        }

        let sub_groups;
        let groups = if selected.is_empty() || selected.len() == self.group_count() {
            &self.groups
        } else {
            let weights = selected.iter().map(|&g| self.groups.weights()[g]).collect();
            let ids = selected.iter().map(|&g| g as i32).collect();
            sub_groups = WeightedCollection::new(ids, weights)
                .map_err(|source| GraphError::InvalidGroup { group: 0, source })?;
            &sub_groups
        };
        if groups.sum_weight() <= 0.0 {
            return Ok(Vec::new());
        }
        Ok(self.draw(rng, count, |rng| groups.sample_with(rng).map(|(t, _)| t as usize)))
    }

    /// Distinct valid groups in request order. Out-of-range types are skipped.
    fn requested(&self, edge_types: &[i32]) -> Vec<usize> {
        let mut seen = BTreeSet::new();
        edge_types
            .iter()
            .filter_map(|&t| self.group_index(t))
            .filter(|&g| seen.insert(g))
            .collect()
    }

    /// Every neighbor of the requested groups, group by group.
    pub fn get_full_neighbor(&self, edge_types: &[i32]) -> Vec<WeightedNeighbor> {
        let mut out = Vec::new();
        for g in self.requested(edge_types) {
            let (begin, end) = self.bounds(g);
            out.extend((begin..end).map(|pos| self.neighbor_at(begin, pos, g as i32)));
        }
        out
    }

    /// Every neighbor of the requested groups in ascending id order.
    pub fn get_sorted_full_neighbor(&self, edge_types: &[i32]) -> Vec<WeightedNeighbor> {
        let groups = self.requested(edge_types);
        let starts: Vec<usize> = groups.iter().map(|&g| self.bounds(g).0).collect();
        let mut cursors: Vec<(usize, usize)> = groups.iter().map(|&g| self.bounds(g)).collect();
        let mut heap = BinaryHeap::with_capacity(groups.len());
        for (slot, &(begin, end)) in cursors.iter().enumerate() {
            if begin < end {
                heap.push(Reverse((self.neighbors[begin], slot)));
            }
        }

        let mut out = Vec::with_capacity(cursors.iter().map(|(b, e)| e - b).sum());
        while let Some(Reverse((_, slot))) = heap.pop() {
            let (pos, end) = &mut cursors[slot];
            out.push(self.neighbor_at(starts[slot], *pos, groups[slot] as i32));
            *pos += 1;
            if *pos < *end {
                heap.push(Reverse((self.neighbors[*pos], slot)));
            }
        }
        out
    }

    /// The `k` heaviest neighbors of the requested groups, heaviest first.
    pub fn get_top_k_neighbor(
        &self,
        edge_types: &[i32],
        k: usize,
    ) -> Result<Vec<WeightedNeighbor>> {
        let groups = edge_types
            .iter()
            .map(|&t| self.check_type(t))
            .collect::<Result<BTreeSet<usize>>>()?;
        if k == 0 {
            return Ok(Vec::new());
        }

        let mut heap: BinaryHeap<Reverse<ByWeight>> = BinaryHeap::with_capacity(k + 1);
        for g in groups {
            let (begin, end) = self.bounds(g);
            for pos in begin..end {
                let candidate = self.neighbor_at(begin, pos, g as i32);
                if heap.len() < k {
                    heap.push(Reverse(ByWeight(candidate)));
                } else if heap
                    .peek()
                    .is_some_and(|Reverse(min)| min.0.weight < candidate.weight)
                {
                    heap.pop();
                    heap.push(Reverse(ByWeight(candidate)));
                }
            }
        }

        let mut out: Vec<WeightedNeighbor> = heap.into_iter().map(|Reverse(n)| n.0).collect();
        out.sort_by(|a, b| b.weight.total_cmp(&a.weight));
        Ok(out)
    }

    pub(crate) fn write_to(&self, w: &mut BytesWriter) -> shardgraph_core::Result<()> {
        w.write_slice(self.groups.ids())?;
        w.write_slice(self.groups.weights())?;
        w.write_slice(&self.group_end)?;
        w.write_slice(&self.neighbors)?;
        w.write_slice(&self.cum_weights)
    }

    pub(crate) fn encoded_len(&self) -> usize {
        slice_size::<i32>(self.group_count()) * 2
            + slice_size::<u32>(self.group_count())
            + slice_size::<u64>(self.neighbor_count())
            + slice_size::<f32>(self.neighbor_count())
    }

    /// Read the five adjacency arrays and check they describe one layout.
    pub(crate) fn read_from(node: u64, r: &mut BytesReader<'_>) -> Result<Self> {
        let group_ids = r.read_vec::<i32>().map_err(corrupt(node, "group_ids"))?;
        let group_weights = r.read_vec::<f32>().map_err(corrupt(node, "group_weights"))?;
        let group_end = r.read_vec::<u32>().map_err(corrupt(node, "group_end_idx"))?;
        let neighbors = r.read_vec::<u64>().map_err(corrupt(node, "neighbors"))?;
        let cum_weights = r.read_vec::<f32>().map_err(corrupt(node, "cum_weights"))?;

        let groups = WeightedCollection::new(group_ids, group_weights)
            .map_err(corrupt(node, "group_weights"))?;
        let inconsistent = |message: String| GraphError::Inconsistent { node, message };
        if group_end.len() != groups.len() {
            return Err(inconsistent(format!(
                "{} group offsets for {} groups",
                group_end.len(),
                groups.len()
            )));
        }
        let misplaced = groups
            .ids()
            .iter()
            .enumerate()
            .find(|&(i, &t)| t != i as i32);
        if let Some((i, t)) = misplaced {
            return Err(inconsistent(format!("group {i} has edge type {t}")));
        }
        if group_end.windows(2).any(|w| w[0] > w[1]) {
            return Err(inconsistent("group offsets decrease".to_string()));
        }
        let last = group_end.last().map_or(0, |&e| e as usize);
        if last != neighbors.len() || neighbors.len() != cum_weights.len() {
            return Err(inconsistent(format!(
                "groups end at {last}, {} neighbors, {} cumulative weights",
                neighbors.len(),
                cum_weights.len()
            )));
        }

        let adjacency = Self {
            groups,
            group_end,
            neighbors,
            cum_weights,
        };
        for g in 0..adjacency.group_count() {
            let (begin, end) = adjacency.bounds(g);
            let cum = &adjacency.cum_weights[begin..end];
            let decreasing = (0..cum.len()).find(|&i| {
                let prev = if i == 0 { 0.0 } else { cum[i - 1] };
                !cum[i].is_finite() || cum[i] < prev
            });
            if let Some(i) = decreasing {
                return Err(inconsistent(format!(
                    "group {g} cumulative weights decrease at {}",
                    begin + i
                )));
            }
            let stored = adjacency.groups.weights()[g];
            let summed = cum.last().copied().unwrap_or(0.0);
            if !totals_agree(stored, summed) {
                return Err(inconsistent(format!(
                    "group {g} total {stored} but cumulative weights sum to {summed}"
                )));
            }
        }
        Ok(adjacency)
    }
}

fn totals_agree(stored: f32, summed: f32) -> bool {
    (stored > 0.0) == (summed > 0.0)
        && (stored - summed).abs() <= TOTAL_TOLERANCE * stored.abs().max(summed.abs())
}

fn end_offset(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| GraphError::InvalidGroup {
        group: 0,
        source: CoreError::Oversized { len },
    })
}

/// Heap entry ordered by weight alone.
#[derive(Debug, Clone, Copy)]
struct ByWeight(WeightedNeighbor);

impl PartialEq for ByWeight {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ByWeight {}

impl PartialOrd for ByWeight {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByWeight {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.weight.total_cmp(&other.0.weight)
    }
}
