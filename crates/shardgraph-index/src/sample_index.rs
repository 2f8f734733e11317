//! The query surface shared by every index kind.

use std::fmt::Debug;

use crate::error::{rejected, IndexError, Result};
use crate::meta::IndexKind;
use crate::result::IndexResult;
use crate::search::SearchOp;

/// A loaded, read-only attribute index.
pub trait SampleIndex: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn kind(&self) -> IndexKind;

    /// Evaluate `op` against `value` and return the matching candidates.
    fn search(&self, op: SearchOp, value: &str) -> Result<IndexResult>;

    /// Like [`SampleIndex::search`], with the operator given as a name
    /// (`GREATER_EQ`) or mnemonic (`ge`).
    fn search_str(&self, op: &str, value: &str) -> Result<IndexResult> {
        let op: SearchOp = op.parse().map_err(|e: crate::search::UnknownSearchOp| {
            rejected(IndexError::format(self.name(), e.to_string()))
        })?;
        self.search(op, value)
    }

    /// Every row of the index.
    fn search_all(&self) -> Result<IndexResult>;

    /// Categorical keys, rendered as text.
    fn keys(&self) -> Vec<String>;

    /// Total number of `(id, weight)` rows.
    fn row_count(&self) -> usize;

    /// Exact length of [`SampleIndex::serialize`] output.
    fn serialized_size(&self) -> usize;

    fn serialize(&self) -> Result<Vec<u8>>;
}

/// Concrete index types that can be decoded from shard segments and merged.
pub trait MergeableIndex: SampleIndex + Sized + 'static {
    fn empty(name: &str) -> Self;

    fn deserialize(name: &str, bytes: &[u8]) -> Result<Self>;

    fn merge(&mut self, other: Self) -> Result<()>;

    fn merge_all(&mut self, others: Vec<Self>) -> Result<()> {
        for other in others {
            self.merge(other)?;
        }
        Ok(())
    }
}

pub(crate) fn check_merge_names(left: &str, right: &str, kind: IndexKind) -> Result<()> {
    if left != right {
        tracing::error!(left, right, %kind, "merge across different indexes");
        return Err(IndexError::MergeMismatch {
            left: format!("{kind} index `{left}`"),
            right: format!("{kind} index `{right}`"),
        });
    }
    Ok(())
}

pub(crate) fn unsupported(index: &str, kind: IndexKind, op: impl std::fmt::Display) -> IndexError {
    rejected(IndexError::UnsupportedOperation {
        index: index.to_string(),
        kind,
        op: op.to_string(),
    })
}
