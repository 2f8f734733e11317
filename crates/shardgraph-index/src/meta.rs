//! Per-index meta records.
//!
//! Each index directory holds a `meta` file of three native-order `i32`
//! codes: index kind, id type, value type.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use shardgraph_core::{BytesReader, BytesWriter};

use crate::error::{IndexError, Result};
use crate::value::DataType;

pub const META_FILE_NAME: &str = "meta";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum IndexKind {
    Hash = 0,
    Range = 1,
    HashRange = 2,
}

impl IndexKind {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(IndexKind::Hash),
            1 => Some(IndexKind::Range),
            2 => Some(IndexKind::HashRange),
            _ => None,
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            IndexKind::Hash => "hash",
            IndexKind::Range => "range",
            IndexKind::HashRange => "hash_range",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexMeta {
    pub kind: IndexKind,
    pub id_type: DataType,
    pub value_type: DataType,
}

impl IndexMeta {
    pub fn new(kind: IndexKind, id_type: DataType, value_type: DataType) -> Self {
        Self {
            kind,
            id_type,
            value_type,
        }
    }

    pub fn decode(index: &str, bytes: &[u8]) -> Result<Self> {
        let mut r = BytesReader::new(bytes);
        let mut code = || r.read::<i32>().map_err(|e| IndexError::corrupt(index, e));
        let (kind, id_type, value_type) = (code()?, code()?, code()?);

        let meta_err = |message: String| IndexError::Meta {
            index: index.to_string(),
            message,
        };
        Ok(Self {
            kind: IndexKind::from_code(kind)
                .ok_or_else(|| meta_err(format!("unknown index kind {kind}")))?,
            id_type: DataType::from_code(id_type)
                .ok_or_else(|| meta_err(format!("unknown id type {id_type}")))?,
            value_type: DataType::from_code(value_type)
                .ok_or_else(|| meta_err(format!("unknown value type {value_type}")))?,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = BytesWriter::with_capacity(12);
        w.write(self.kind as i32);
        w.write(self.id_type.code());
        w.write(self.value_type.code());
        w.into_inner()
    }

    /// Read `<dir>/meta`.
    pub fn read(index: &str, dir: &Path) -> Result<Self> {
        let path = dir.join(META_FILE_NAME);
        let bytes = fs::read(&path).map_err(|source| IndexError::Io { path, source })?;
        Self::decode(index, &bytes)
    }

    /// Write `<dir>/meta`, creating `dir` if needed.
    pub fn write(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir).map_err(|source| IndexError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(META_FILE_NAME);
        fs::write(&path, self.encode()).map_err(|source| IndexError::Io { path, source })
    }
}
