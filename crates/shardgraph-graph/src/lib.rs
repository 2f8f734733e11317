//! Shardgraph graph: per-node neighbor sampling and the node record.
//!
//! A [`Node`] carries an out- and an in-[`WeightedAdjacency`]. Each adjacency
//! answers weighted neighbor sampling, full and id-sorted enumeration, and
//! top-k by weight over a set of edge types.

pub mod adjacency;
pub mod error;
pub mod features;
pub mod node;

pub use adjacency::{WeightedAdjacency, WeightedNeighbor};
pub use error::{GraphError, Result};
pub use features::{FeatureColumn, NodeFeatures};
pub use node::{Direction, Node};
