use shardgraph_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GraphError {
    /// The edge type does not name a group of this node.
    #[error("edge type {edge_type} out of range for {group_count} groups")]
    InvalidEdgeType { edge_type: i32, group_count: usize },

    #[error("neighbor lists for {groups} groups but weights for {weights}")]
    GroupMismatch { groups: usize, weights: usize },

    #[error("invalid neighbor group {group}: {source}")]
    InvalidGroup {
        group: usize,
        #[source]
        source: CoreError,
    },

    #[error("corrupt node record (node {node:?}) in {field}: {source}")]
    CorruptData {
        node: Option<u64>,
        field: &'static str,
        #[source]
        source: CoreError,
    },

    #[error("inconsistent node record (node {node}): {message}")]
    Inconsistent { node: u64, message: String },
}

pub type Result<T> = std::result::Result<T, GraphError>;

/// Tag a decode failure with the node and field being read.
pub(crate) fn corrupt(node: u64, field: &'static str) -> impl Fn(CoreError) -> GraphError {
    move |source| GraphError::CorruptData {
        node: Some(node),
        field,
        source,
    }
}
