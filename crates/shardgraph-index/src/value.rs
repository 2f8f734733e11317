//! Id and value types an index can be instantiated over.
//!
//! Ids are `u32` or `u64` and surface as `u64` in results. Values are the
//! attribute domain: integers, strings, and `f32` through [`F32Value`], which
//! gives floats a total order and a hash so one value trait serves hash and
//! range indexes alike.

use std::cmp::Ordering;
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use shardgraph_core::{bytes_size, BytesReader, BytesWriter, FixedWidth};

/// Persisted type codes for meta records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum DataType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    UInt8 = 4,
    UInt16 = 5,
    UInt32 = 6,
    UInt64 = 7,
    Float = 8,
    Double = 9,
    Bool = 10,
    String = 11,
}

impl DataType {
    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            0 => Self::Int8,
            1 => Self::Int16,
            2 => Self::Int32,
            3 => Self::Int64,
            4 => Self::UInt8,
            5 => Self::UInt16,
            6 => Self::UInt32,
            7 => Self::UInt64,
            8 => Self::Float,
            9 => Self::Double,
            10 => Self::Bool,
            11 => Self::String,
            _ => return None,
        })
    }

    pub fn code(self) -> i32 {
        self as i32
    }
}

impl Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int8 => "int8",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt8 => "uint8",
            Self::UInt16 => "uint16",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
        };
        f.write_str(s)
    }
}

// ============================================================================
// Ids
// ============================================================================

pub trait IndexId:
    FixedWidth + Ord + Hash + Debug + Display + FromStr + Send + Sync + 'static
{
    const DATA_TYPE: DataType;

    fn to_u64(self) -> u64;
}

impl IndexId for u32 {
    const DATA_TYPE: DataType = DataType::UInt32;

    fn to_u64(self) -> u64 {
        u64::from(self)
    }
}

impl IndexId for u64 {
    const DATA_TYPE: DataType = DataType::UInt64;

    fn to_u64(self) -> u64 {
        self
    }
}

// ============================================================================
// Values
// ============================================================================

pub trait IndexValue: Clone + Ord + Hash + Debug + Display + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    /// Parse a predicate operand. `None` when the text is outside the domain.
    fn parse_value(s: &str) -> Option<Self>;

    fn read_one(reader: &mut BytesReader<'_>) -> shardgraph_core::Result<Self>;

    fn write_one(&self, writer: &mut BytesWriter) -> shardgraph_core::Result<()>;

    fn encoded_len(&self) -> usize;

    /// Text naming this value in results. Distinct values get distinct labels.
    fn label(&self) -> String {
        self.to_string()
    }

    fn read_many(reader: &mut BytesReader<'_>) -> shardgraph_core::Result<Vec<Self>> {
        let len = reader.read::<u32>()? as usize;
        // a corrupt count must not drive a huge allocation
        let mut out = Vec::with_capacity(len.min(reader.remaining()));
        for _ in 0..len {
            out.push(Self::read_one(reader)?);
        }
        Ok(out)
    }

    fn write_many(values: &[Self], writer: &mut BytesWriter) -> shardgraph_core::Result<()> {
        let len = u32::try_from(values.len())
            .map_err(|_| shardgraph_core::CoreError::Oversized { len: values.len() })?;
        writer.write(len);
        for v in values {
            v.write_one(writer)?;
        }
        Ok(())
    }

    fn encoded_many_len(values: &[Self]) -> usize {
        4 + values.iter().map(Self::encoded_len).sum::<usize>()
    }
}

macro_rules! integer_value {
    ($ty:ty, $code:expr) => {
        impl IndexValue for $ty {
            const DATA_TYPE: DataType = $code;

            fn parse_value(s: &str) -> Option<Self> {
                s.trim().parse().ok()
            }

            fn read_one(reader: &mut BytesReader<'_>) -> shardgraph_core::Result<Self> {
                reader.read::<$ty>()
            }

            fn write_one(&self, writer: &mut BytesWriter) -> shardgraph_core::Result<()> {
                writer.write(*self);
                Ok(())
            }

            fn encoded_len(&self) -> usize {
                <$ty as FixedWidth>::WIDTH
            }
        }
    };
}

integer_value!(u32, DataType::UInt32);
integer_value!(i32, DataType::Int32);
integer_value!(u64, DataType::UInt64);
integer_value!(i64, DataType::Int64);

impl IndexValue for String {
    const DATA_TYPE: DataType = DataType::String;

    fn parse_value(s: &str) -> Option<Self> {
        Some(s.to_string())
    }

    fn read_one(reader: &mut BytesReader<'_>) -> shardgraph_core::Result<Self> {
        reader.read_string()
    }

    fn write_one(&self, writer: &mut BytesWriter) -> shardgraph_core::Result<()> {
        writer.write_str(self)
    }

    fn encoded_len(&self) -> usize {
        bytes_size(self.len())
    }
}

/// `f32` attribute value under IEEE total ordering.
///
/// Equality and hashing follow the bit pattern, so `-0.0 != 0.0` and a NaN
/// equals itself.
#[derive(Clone, Copy, Default)]
pub struct F32Value(pub f32);

impl PartialEq for F32Value {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for F32Value {}

impl PartialOrd for F32Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for F32Value {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for F32Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl Debug for F32Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

impl Display for F32Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl From<f32> for F32Value {
    fn from(v: f32) -> Self {
        Self(v)
    }
}

impl IndexValue for F32Value {
    const DATA_TYPE: DataType = DataType::Float;

    fn parse_value(s: &str) -> Option<Self> {
        s.trim().parse::<f32>().ok().map(Self)
    }

    fn read_one(reader: &mut BytesReader<'_>) -> shardgraph_core::Result<Self> {
        reader.read::<f32>().map(Self)
    }

    fn write_one(&self, writer: &mut BytesWriter) -> shardgraph_core::Result<()> {
        writer.write(self.0);
        Ok(())
    }

    fn encoded_len(&self) -> usize {
        <f32 as FixedWidth>::WIDTH
    }

    /// Every NaN prints as `NaN`, so NaNs carry their bit pattern.
    fn label(&self) -> String {
        if self.0.is_nan() {
            format!("NaN:{:#010x}", self.0.to_bits())
        } else {
            self.to_string()
        }
    }
}
