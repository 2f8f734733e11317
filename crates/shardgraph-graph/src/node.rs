//! A graph node with its out/in adjacency and features, plus its persisted
//! record.
//!
//! Record layout, all native order:
//!
//! ```text
//! id u64 | type i32 | weight f32
//! out: group_ids[i32] group_weights[f32] group_end_idx[u32] neighbors[u64] cum_weights[f32]
//!      (cum_weights restarts at each group)
//! in:  (same five arrays)
//! u64_idx[i32] u64_values[u64] f32_idx[i32] f32_values[f32] bin_idx[i32] bin_values(bytes)
//! ```

use std::fmt;

use shardgraph_core::{BytesReader, BytesWriter};

use crate::adjacency::{WeightedAdjacency, WeightedNeighbor};
use crate::error::{GraphError, Result};
use crate::features::NodeFeatures;

/// Which adjacency of a node a query reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Out,
    In,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Out => "out",
            Direction::In => "in",
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct Node {
    id: u64,
    node_type: i32,
    weight: f32,
    out_neighbors: WeightedAdjacency,
    in_neighbors: WeightedAdjacency,
    features: NodeFeatures,
}

impl Node {
    pub fn new(id: u64, node_type: i32, weight: f32) -> Self {
        Self {
            id,
            node_type,
            weight,
            ..Self::default()
        }
    }

    pub fn with_out_neighbors(mut self, adjacency: WeightedAdjacency) -> Self {
        self.out_neighbors = adjacency;
        self
    }

    pub fn with_in_neighbors(mut self, adjacency: WeightedAdjacency) -> Self {
        self.in_neighbors = adjacency;
        self
    }

    pub fn with_features(mut self, features: NodeFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn node_type(&self) -> i32 {
        self.node_type
    }

    pub fn weight(&self) -> f32 {
        self.weight
    }

    pub fn out_neighbors(&self) -> &WeightedAdjacency {
        &self.out_neighbors
    }

    pub fn in_neighbors(&self) -> &WeightedAdjacency {
        &self.in_neighbors
    }

    pub fn neighbors(&self, direction: Direction) -> &WeightedAdjacency {
        match direction {
            Direction::Out => &self.out_neighbors,
            Direction::In => &self.in_neighbors,
        }
    }

    pub fn features(&self) -> &NodeFeatures {
        &self.features
    }

    pub fn sample_neighbor(
        &self,
        direction: Direction,
        edge_types: &[i32],
        count: usize,
    ) -> Result<Vec<WeightedNeighbor>> {
        self.neighbors(direction).sample_neighbor(edge_types, count)
    }

    pub fn get_full_neighbor(
        &self,
        direction: Direction,
        edge_types: &[i32],
    ) -> Vec<WeightedNeighbor> {
        self.neighbors(direction).get_full_neighbor(edge_types)
    }

    pub fn get_sorted_full_neighbor(
        &self,
        direction: Direction,
        edge_types: &[i32],
    ) -> Vec<WeightedNeighbor> {
        self.neighbors(direction).get_sorted_full_neighbor(edge_types)
    }

    pub fn get_top_k_neighbor(
        &self,
        direction: Direction,
        edge_types: &[i32],
        k: usize,
    ) -> Result<Vec<WeightedNeighbor>> {
        self.neighbors(direction).get_top_k_neighbor(edge_types, k)
    }

    pub fn serialized_size(&self) -> usize {
        8 + 4 + 4
            + self.out_neighbors.encoded_len()
            + self.in_neighbors.encoded_len()
            + self.features.encoded_len()
    }

    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut w = BytesWriter::with_capacity(self.serialized_size());
        w.write(self.id);
        w.write(self.node_type);
        w.write(self.weight);
        self.out_neighbors
            .write_to(&mut w)
            .and_then(|_| self.in_neighbors.write_to(&mut w))
            .and_then(|_| self.features.write_to(&mut w))
            .map_err(|source| GraphError::CorruptData {
                node: Some(self.id),
                field: "record",
                source,
            })?;
        Ok(w.into_inner())
    }

    /// Decode one node record. Trailing bytes are left for the caller.
    pub fn read_from(r: &mut BytesReader<'_>) -> Result<Self> {
        let header = |source| GraphError::CorruptData {
            node: None,
            field: "header",
            source,
        };
        let id = r.read::<u64>().map_err(header)?;
        let node_type = r.read::<i32>().map_err(header)?;
        let weight = r.read::<f32>().map_err(header)?;

        let out_neighbors = WeightedAdjacency::read_from(id, r)?;
        let in_neighbors = WeightedAdjacency::read_from(id, r)?;
        let features = NodeFeatures::read_from(id, r)?;
        Ok(Self {
            id,
            node_type,
            weight,
            out_neighbors,
            in_neighbors,
            features,
        })
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut r = BytesReader::new(bytes);
        let node = Self::read_from(&mut r).map_err(|e| {
            tracing::error!(offset = r.position(), error = %e, "corrupt node record");
            e
        })?;
        if !r.is_exhausted() {
            return Err(GraphError::Inconsistent {
                node: node.id,
                message: format!("{} trailing bytes", r.remaining()),
            });
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node() -> Node {
        let out =
            WeightedAdjacency::build(vec![vec![(2, 21.0), (4, 11.0)], vec![(6, 33.0)]]).unwrap();
        let inn = WeightedAdjacency::build(vec![vec![(9, 1.0)]]).unwrap();
        let features = NodeFeatures::new(
            vec![vec![7, 8], vec![9]],
            vec![vec![0.5]],
            vec![b"ab".to_vec(), b"".to_vec(), b"xyz".to_vec()],
        )
        .unwrap();
        Node::new(42, 3, 1.5)
            .with_out_neighbors(out)
            .with_in_neighbors(inn)
            .with_features(features)
    }

    #[test]
    fn test_direction_selects_adjacency() {
        let n = node();
        assert_eq!(n.get_full_neighbor(Direction::Out, &[0, 1]).len(), 3);
        let inn = n.get_full_neighbor(Direction::In, &[0]);
        assert_eq!(inn, vec![WeightedNeighbor::new(9, 1.0, 0)]);
        assert!(n.get_top_k_neighbor(Direction::In, &[1], 1).is_err());
    }

    #[test]
    fn test_round_trip() {
        let n = node();
        let bytes = n.serialize().unwrap();
        assert_eq!(bytes.len(), n.serialized_size());

        let back = Node::deserialize(&bytes).unwrap();
        assert_eq!((back.id(), back.node_type(), back.weight()), (42, 3, 1.5));
        assert_eq!(
            back.get_sorted_full_neighbor(Direction::Out, &[0, 1]),
            n.get_sorted_full_neighbor(Direction::Out, &[0, 1])
        );
        assert_eq!(back.features(), n.features());
        assert_eq!(back.features().binary.get_vec(&[2, 0]), vec![b"xyz".to_vec(), b"ab".to_vec()]);
        assert_eq!(back.features().uint64.max_value_num(), 2);
    }

    #[test]
    fn test_truncated_record_is_corrupt() {
        let bytes = node().serialize().unwrap();
        let err = Node::deserialize(&bytes[..bytes.len() - 2]).unwrap_err();
        assert!(matches!(err, GraphError::CorruptData { node: Some(42), .. }));
        let err = Node::deserialize(&bytes[..5]).unwrap_err();
        assert!(matches!(err, GraphError::CorruptData { node: None, .. }));
    }

    #[test]
    fn test_zeroed_cumulative_weights_rejected() {
        let out = WeightedAdjacency::build(vec![vec![(10, 1.0)], vec![(11, 1.0)]]).unwrap();
        let mut bytes = Node::new(7, 0, 1.0).with_out_neighbors(out).serialize().unwrap();
        // header, then four prefixed arrays, then the cum_weights prefix
        let cum = 16 + 12 + 12 + 12 + 20 + 4;
        bytes[cum..cum + 8].copy_from_slice(&[0u8; 8]);
        assert!(matches!(
            Node::deserialize(&bytes),
            Err(GraphError::Inconsistent { node: 7, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes_rejected() {
        let mut bytes = node().serialize().unwrap();
        bytes.push(0);
        assert!(matches!(
            Node::deserialize(&bytes),
            Err(GraphError::Inconsistent { node: 42, .. })
        ));
    }
}
