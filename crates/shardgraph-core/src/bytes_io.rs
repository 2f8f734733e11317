//! Native-order segment codec.
//!
//! Layout: numeric arrays are a `u32` element count followed by fixed-width
//! elements; strings and byte blobs are a `u32` byte length followed by raw
//! bytes. Everything is host byte order, so segments are not portable across
//! hosts of differing endianness.

use byteorder::{ByteOrder, NativeEndian};

use crate::error::{CoreError, Result};

/// A fixed-width scalar that can be copied in and out of a segment.
pub trait FixedWidth: Copy {
    const WIDTH: usize;

    fn decode(bytes: &[u8]) -> Self;

    fn encode(self, out: &mut Vec<u8>);
}

macro_rules! fixed_width {
    ($ty:ty, $width:expr, $read:ident, $write:ident) => {
        impl FixedWidth for $ty {
            const WIDTH: usize = $width;

            #[inline]
            fn decode(bytes: &[u8]) -> Self {
                NativeEndian::$read(bytes)
            }

            #[inline]
            fn encode(self, out: &mut Vec<u8>) {
                let mut buf = [0u8; $width];
                NativeEndian::$write(&mut buf, self);
                out.extend_from_slice(&buf);
            }
        }
    };
}

fixed_width!(u32, 4, read_u32, write_u32);
fixed_width!(i32, 4, read_i32, write_i32);
fixed_width!(u64, 8, read_u64, write_u64);
fixed_width!(i64, 8, read_i64, write_i64);
fixed_width!(f32, 4, read_f32, write_f32);

/// Encoded size of an array of `len` elements of `T`.
pub fn slice_size<T: FixedWidth>(len: usize) -> usize {
    4 + len * T::WIDTH
}

/// Encoded size of a string or blob of `len` bytes.
pub fn bytes_size(len: usize) -> usize {
    4 + len
}

/// Cursor over a borrowed segment.
#[derive(Debug, Clone)]
pub struct BytesReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BytesReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn take(&mut self, needed: usize) -> Result<&'a [u8]> {
        if self.remaining() < needed {
            return Err(CoreError::CorruptData {
                offset: self.pos,
                needed,
                available: self.remaining(),
            });
        }
        let buf: &'a [u8] = self.buf;
        let slice = &buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(slice)
    }

    pub fn read<T: FixedWidth>(&mut self) -> Result<T> {
        self.take(T::WIDTH).map(T::decode)
    }

    fn read_len(&mut self) -> Result<usize> {
        Ok(self.read::<u32>()? as usize)
    }

    pub fn read_vec<T: FixedWidth>(&mut self) -> Result<Vec<T>> {
        let len = self.read_len()?;
        let needed = len.checked_mul(T::WIDTH).ok_or(CoreError::CorruptData {
            offset: self.pos,
            needed: usize::MAX,
            available: self.remaining(),
        })?;
        let bytes = self.take(needed)?;
        Ok(bytes.chunks_exact(T::WIDTH).map(T::decode).collect())
    }

    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_len()?;
        self.take(len)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let offset = self.pos;
        let bytes = self.read_bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CoreError::InvalidUtf8 { offset })
    }
}

/// Append-only segment builder.
#[derive(Debug, Default, Clone)]
pub struct BytesWriter {
    buf: Vec<u8>,
}

impl BytesWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write<T: FixedWidth>(&mut self, value: T) {
        value.encode(&mut self.buf);
    }

    fn write_len(&mut self, len: usize) -> Result<()> {
        let len = u32::try_from(len).map_err(|_| CoreError::Oversized { len })?;
        self.write(len);
        Ok(())
    }

    pub fn write_slice<T: FixedWidth>(&mut self, values: &[T]) -> Result<()> {
        self.write_len(values.len())?;
        self.buf.reserve(values.len() * T::WIDTH);
        for &v in values {
            v.encode(&mut self.buf);
        }
        Ok(())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_len(bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn write_str(&mut self, s: &str) -> Result<()> {
        self.write_bytes(s.as_bytes())
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
