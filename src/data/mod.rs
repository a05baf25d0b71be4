//! Byte-array substrate for everything that travels over a link.
//!
//! `ByteArray` is the minimal readable/writable byte-range contract; `Block`
//! is the owned buffer implementing it. `AddressedBlock` and `Consignment`
//! layer routing identity (address, channel) on top without changing the
//! byte semantics. `Enumerator` issues the process-wide ids used to tag
//! sessions and parties.

mod block;
mod consignment;
mod enumerator;

pub use block::Block;
pub use consignment::{AddressedBlock, Consignment};
pub use enumerator::{Enumerator, Id};

use thiserror::Error;

/// Errors from byte-array write attempts.
///
/// Out-of-range offsets are a caller defect and panic instead; this type
/// only covers conditions a correct caller can run into.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DataError {
    /// The array was constructed from a read-only source and cannot be written.
    #[error("Non-modifiable byte array, operation: {op}")]
    NonModifiable { op: &'static str },
}

/// A readable, optionally writable range of bytes.
///
/// Offsets and counts are validated against `size()`; violating the bound is
/// a contract error and panics. Writability is a property of the concrete
/// instance, not the type: `set` on an instance built from a read-only
/// source reports [`DataError::NonModifiable`].
pub trait ByteArray {
    /// Current length in bytes.
    fn size(&self) -> usize;

    /// Copies `dst.len()` bytes starting at `at` into `dst`.
    ///
    /// # Panics
    ///
    /// Panics if `at + dst.len() > self.size()`.
    fn get(&self, at: usize, dst: &mut [u8]);

    /// Overwrites `src.len()` bytes starting at `at`.
    ///
    /// Fails with [`DataError::NonModifiable`] on read-only instances.
    ///
    /// # Panics
    ///
    /// Panics if `at + src.len() > self.size()`.
    fn set(&mut self, at: usize, src: &[u8]) -> Result<(), DataError>;
}
