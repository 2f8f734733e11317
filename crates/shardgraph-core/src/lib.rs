//! Shardgraph core: weighted sampling primitives and the segment codec.
//!
//! - [`AliasTable`]: Walker/Vose alias table, O(n) build and O(1) draws.
//! - [`WeightedCollection`]: ids with weights and an alias sampler. This is
//!   the weighted bag reused by categorical index buckets, edge-type groups
//!   and ad-hoc sub-distributions.
//! - [`random_select`]: weighted draw inside an interval of a cumulative
//!   weight array.
//! - [`BytesReader`] / [`BytesWriter`]: length-prefixed native-order records
//!   shared by every persisted structure.
//!
//! All randomness comes from the thread-local generator, so draws on the
//! query path never contend.

pub mod alias;
pub mod bytes_io;
pub mod error;
pub mod weighted;

pub use alias::AliasTable;
pub use bytes_io::{bytes_size, slice_size, BytesReader, BytesWriter, FixedWidth};
pub use error::{CoreError, Result};
pub use weighted::{cumulative, interval_weight, random_select, weight_at, WeightedCollection};
