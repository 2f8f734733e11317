//! Relational search operators.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Separator for list operands (`IN`/`NOT_IN`) and hash-range keys.
pub const LIST_DELIM: &str = "::";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchOp {
    Less,
    LessEq,
    Eq,
    Greater,
    GreaterEq,
    NotEq,
    In,
    NotIn,
}

impl SearchOp {
    pub const ALL: [SearchOp; 8] = [
        SearchOp::Less,
        SearchOp::LessEq,
        SearchOp::Eq,
        SearchOp::Greater,
        SearchOp::GreaterEq,
        SearchOp::NotEq,
        SearchOp::In,
        SearchOp::NotIn,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SearchOp::Less => "LESS",
            SearchOp::LessEq => "LESS_EQ",
            SearchOp::Eq => "EQ",
            SearchOp::Greater => "GREATER",
            SearchOp::GreaterEq => "GREATER_EQ",
            SearchOp::NotEq => "NOT_EQ",
            SearchOp::In => "IN",
            SearchOp::NotIn => "NOT_IN",
        }
    }

    /// Short form. List operators have none.
    pub fn mnemonic(self) -> Option<&'static str> {
        match self {
            SearchOp::Less => Some("lt"),
            SearchOp::LessEq => Some("le"),
            SearchOp::Eq => Some("eq"),
            SearchOp::Greater => Some("gt"),
            SearchOp::GreaterEq => Some("ge"),
            SearchOp::NotEq => Some("ne"),
            SearchOp::In | SearchOp::NotIn => None,
        }
    }

    /// Operators whose operand is a `::`-delimited list.
    pub fn is_list(self) -> bool {
        matches!(self, SearchOp::In | SearchOp::NotIn)
    }
}

impl fmt::Display for SearchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSearchOp(pub String);

impl fmt::Display for UnknownSearchOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown search operator `{}`", self.0)
    }
}

impl std::error::Error for UnknownSearchOp {}

impl FromStr for SearchOp {
    type Err = UnknownSearchOp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        SearchOp::ALL
            .into_iter()
            .find(|op| op.as_str() == s || op.mnemonic() == Some(s))
            .ok_or_else(|| UnknownSearchOp(s.to_string()))
    }
}

/// Split a list operand. Empty items are dropped.
pub fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(LIST_DELIM).filter(|s| !s.is_empty())
}
