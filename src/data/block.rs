use bytes::{Bytes, BytesMut};

use crate::data::{ByteArray, DataError};

enum Repr {
    /// Writable storage owned by this block.
    Owned(BytesMut),
    /// Read-only storage, possibly shared with other views of the same bytes.
    Shared(Bytes),
}

/// Owned byte buffer satisfying the [`ByteArray`] contract.
///
/// A block is either writable (owned storage) or read-only (shared storage,
/// typically a zero-copy view of received wire data). Writes against a
/// read-only block fail with [`DataError::NonModifiable`].
pub struct Block {
    repr: Repr,
}

impl Block {
    /// A writable, zero-filled block of `size` bytes.
    pub fn new(size: usize) -> Self {
        Self {
            repr: Repr::Owned(BytesMut::zeroed(size)),
        }
    }

    /// A writable block taking ownership of `data`.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            repr: Repr::Owned(BytesMut::from(&data[..])),
        }
    }

    /// A read-only block over shared storage. `set` will fail on it.
    pub fn from_shared(data: impl Into<Bytes>) -> Self {
        Self {
            repr: Repr::Shared(data.into()),
        }
    }

    /// A writable copy of `count` bytes of `source` starting at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at + count` exceeds the source array's size.
    pub fn copy_of(source: &dyn ByteArray, at: usize, count: usize) -> Self {
        let mut data = vec![0u8; count];
        source.get(at, &mut data);
        Self::from_vec(data)
    }

    pub fn is_writable(&self) -> bool {
        matches!(self.repr, Repr::Owned(_))
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.repr {
            Repr::Owned(buf) => buf,
            Repr::Shared(bytes) => bytes,
        }
    }

    /// Grows or shrinks the block. New bytes are zero.
    ///
    /// Resizing a read-only block copies it into owned storage first.
    pub fn resize(&mut self, new_size: usize) {
        match &mut self.repr {
            Repr::Owned(buf) => buf.resize(new_size, 0),
            Repr::Shared(bytes) => {
                let mut buf = BytesMut::from(&bytes[..]);
                buf.resize(new_size, 0);
                self.repr = Repr::Owned(buf);
            }
        }
    }

    /// A read-only view of `count` bytes starting at `at`.
    ///
    /// Zero-copy when this block is itself read-only; copies otherwise.
    ///
    /// # Panics
    ///
    /// Panics if `at + count > self.size()`.
    pub fn slice(&self, at: usize, count: usize) -> Block {
        check_range(self.size(), at, count);
        match &self.repr {
            Repr::Owned(buf) => Block::from_shared(Bytes::copy_from_slice(&buf[at..at + count])),
            Repr::Shared(bytes) => Block::from_shared(bytes.slice(at..at + count)),
        }
    }

    pub fn into_bytes(self) -> Bytes {
        match self.repr {
            Repr::Owned(buf) => buf.freeze(),
            Repr::Shared(bytes) => bytes,
        }
    }
}

impl ByteArray for Block {
    fn size(&self) -> usize {
        self.as_slice().len()
    }

    fn get(&self, at: usize, dst: &mut [u8]) {
        check_range(self.size(), at, dst.len());
        dst.copy_from_slice(&self.as_slice()[at..at + dst.len()]);
    }

    fn set(&mut self, at: usize, src: &[u8]) -> Result<(), DataError> {
        check_range(self.size(), at, src.len());
        match &mut self.repr {
            Repr::Owned(buf) => {
                buf[at..at + src.len()].copy_from_slice(src);
                Ok(())
            }
            Repr::Shared(_) => Err(DataError::NonModifiable { op: "set" }),
        }
    }
}

impl Clone for Block {
    fn clone(&self) -> Self {
        match &self.repr {
            Repr::Owned(buf) => Block::from_vec(buf.to_vec()),
            Repr::Shared(bytes) => Block::from_shared(bytes.clone()),
        }
    }
}

impl std::fmt::Debug for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Block")
            .field("size", &self.size())
            .field("writable", &self.is_writable())
            .finish()
    }
}

pub(crate) fn check_range(size: usize, at: usize, count: usize) {
    assert!(
        at.checked_add(count).is_some_and(|end| end <= size),
        "byte array access out of range: at {at} count {count} size {size}"
    );
}
