use thiserror::Error;

/// Errors raised while building weighted collections or decoding segments.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CoreError {
    #[error("ids and weights differ in length ({ids} vs {weights})")]
    LengthMismatch { ids: usize, weights: usize },

    #[error("weight {weight} at position {index} is negative or not finite")]
    InvalidWeight { index: usize, weight: f32 },

    #[error("corrupt segment at offset {offset}: needed {needed} bytes, {available} available")]
    CorruptData {
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("corrupt segment at offset {offset}: string is not valid utf-8")]
    InvalidUtf8 { offset: usize },

    #[error("array of {len} elements does not fit a u32 length prefix")]
    Oversized { len: usize },
}

pub type Result<T> = std::result::Result<T, CoreError>;
