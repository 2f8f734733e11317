use std::path::PathBuf;

use shardgraph_core::CoreError;
use thiserror::Error;

use crate::meta::IndexKind;

/// Index build, load and query failures.
///
/// `Format`, `InvalidArgument` and `UnsupportedOperation` reject a single
/// query and leave the index untouched. `CorruptData` aborts the segment being
/// decoded. `MergeMismatch` means partial shards were wired to the wrong index.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("malformed query on index `{index}`: {message}")]
    Format { index: String, message: String },

    #[error("invalid argument for index `{index}`: {message}")]
    InvalidArgument { index: String, message: String },

    #[error("{op} is not supported by {kind} index `{index}`")]
    UnsupportedOperation {
        index: String,
        kind: IndexKind,
        op: String,
    },

    #[error("corrupt segment for index `{index}`: {source}")]
    CorruptData {
        index: String,
        #[source]
        source: CoreError,
    },

    #[error("cannot merge {right} into {left}")]
    MergeMismatch { left: String, right: String },

    #[error("duplicate key `{key}` in index `{index}`")]
    DuplicateKey { index: String, key: String },

    #[error("bad meta for index `{index}`: {message}")]
    Meta { index: String, message: String },

    #[error("bad loader config: {message}")]
    Config { message: String },

    #[error("i/o error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn corrupt(index: &str, source: CoreError) -> Self {
        IndexError::CorruptData {
            index: index.to_string(),
            source,
        }
    }

    pub(crate) fn invalid(index: &str, message: impl Into<String>) -> Self {
        IndexError::InvalidArgument {
            index: index.to_string(),
            message: message.into(),
        }
    }

    pub(crate) fn format(index: &str, message: impl Into<String>) -> Self {
        IndexError::Format {
            index: index.to_string(),
            message: message.into(),
        }
    }

    /// True for errors that reject one query without affecting the index.
    pub fn is_query_rejection(&self) -> bool {
        matches!(
            self,
            IndexError::Format { .. }
                | IndexError::InvalidArgument { .. }
                | IndexError::UnsupportedOperation { .. }
        )
    }
}

/// Log a rejected query and hand the error back.
pub(crate) fn rejected(err: IndexError) -> IndexError {
    tracing::warn!(error = %err, "query rejected");
    err
}
