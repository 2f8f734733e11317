//! Shardgraph index: persisted attribute indexes for candidate filtering.
//!
//! Three index kinds answer [`SearchOp`] queries over a node attribute:
//!
//! - [`HashSampleIndex`]: value to weighted id bucket, for categorical keys.
//! - [`RangeSampleIndex`]: rows sorted by value with a cumulative weight
//!   column, for ordered attributes.
//! - [`HashRangeSampleIndex`]: one range index per categorical key, queried
//!   as `key::operand`.
//!
//! Queries return an [`IndexResult`]. Results combine with `intersection` and
//! `union` and can be sampled proportionally to weight. The
//! [`IndexManager`] loads every index under a root for one shard.

pub mod config;
pub mod error;
pub mod hash_index;
pub mod hash_range_index;
pub mod manager;
pub mod meta;
pub mod range_index;
pub mod result;
pub mod sample_index;
pub mod search;
pub mod value;

pub use config::LoaderConfig;
pub use error::{IndexError, Result};
pub use hash_index::HashSampleIndex;
pub use hash_range_index::HashRangeSampleIndex;
pub use manager::{IndexManager, LoadedIndex};
pub use meta::{IndexKind, IndexMeta};
pub use range_index::RangeSampleIndex;
pub use result::{CommonIndexResult, HashIndexResult, IndexResult, RangeIndexResult};
pub use sample_index::{MergeableIndex, SampleIndex};
pub use search::{SearchOp, LIST_DELIM};
pub use value::{DataType, F32Value, IndexId, IndexValue};
