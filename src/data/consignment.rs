use crate::data::{Block, ByteArray, DataError};
use crate::protocol::types::{Address, Channel};

/// A [`Block`] tagged with the network address it came from or is bound for.
///
/// The address is fixed at construction; there is no way to re-address a
/// block once built, so a partially processed payload cannot be misrouted.
#[derive(Debug, Clone)]
pub struct AddressedBlock {
    address: Address,
    block: Block,
}

impl AddressedBlock {
    pub fn new(address: Address, block: Block) -> Self {
        Self { address, block }
    }

    /// Copies the whole of `source` into a new writable block.
    pub fn from_array(address: Address, source: &dyn ByteArray) -> Self {
        Self::from_array_range(address, source, 0, source.size())
    }

    /// Copies `count` bytes of `source` starting at `at`.
    ///
    /// # Panics
    ///
    /// Panics if `at + count` exceeds the **source** array's size.
    pub fn from_array_range(address: Address, source: &dyn ByteArray, at: usize, count: usize) -> Self {
        Self {
            address,
            block: Block::copy_of(source, at, count),
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn block_mut(&mut self) -> &mut Block {
        &mut self.block
    }

    pub fn into_block(self) -> Block {
        self.block
    }
}

impl ByteArray for AddressedBlock {
    fn size(&self) -> usize {
        self.block.size()
    }

    fn get(&self, at: usize, dst: &mut [u8]) {
        self.block.get(at, dst);
    }

    fn set(&mut self, at: usize, src: &[u8]) -> Result<(), DataError> {
        self.block.set(at, src)
    }
}

/// The unit of multiplexed transmission: an [`AddressedBlock`] plus the
/// channel it rides on. Consignments are the only thing ever placed on or
/// taken off a link's wire representation.
///
/// Channel and address are assigned once at construction and never change.
#[derive(Debug, Clone)]
pub struct Consignment {
    channel: Channel,
    inner: AddressedBlock,
}

impl Consignment {
    pub fn new(channel: Channel, inner: AddressedBlock) -> Self {
        Self { channel, inner }
    }

    pub fn from_block(channel: Channel, address: Address, block: Block) -> Self {
        Self::new(channel, AddressedBlock::new(address, block))
    }

    /// Copies a sub-range of `source`, bounds-checked against the source size.
    ///
    /// # Panics
    ///
    /// Panics if `at + count` exceeds the source array's size.
    pub fn from_array_range(
        channel: Channel,
        address: Address,
        source: &dyn ByteArray,
        at: usize,
        count: usize,
    ) -> Self {
        Self::new(channel, AddressedBlock::from_array_range(address, source, at, count))
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn address(&self) -> &Address {
        self.inner.address()
    }

    pub fn block(&self) -> &Block {
        self.inner.block()
    }

    pub fn into_block(self) -> Block {
        self.inner.into_block()
    }
}

impl ByteArray for Consignment {
    fn size(&self) -> usize {
        self.inner.size()
    }

    fn get(&self, at: usize, dst: &mut [u8]) {
        self.inner.get(at, dst);
    }

    fn set(&mut self, at: usize, src: &[u8]) -> Result<(), DataError> {
        self.inner.set(at, src)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, SocketAddr};

    fn addr() -> Address {
        Address::from(SocketAddr::from((Ipv4Addr::LOCALHOST, 4000)))
    }

    #[test]
    fn range_construction_copies_the_window() {
        let source = Block::from_vec(vec![0, 1, 2, 3, 4, 5]);
        let ab = AddressedBlock::from_array_range(addr(), &source, 2, 3);
        assert_eq!(ab.block().as_slice(), &[2, 3, 4]);
        assert_eq!(ab.address(), &addr());
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn range_is_checked_against_source_size() {
        let source = Block::from_vec(vec![0u8; 4]);
        // The window itself is small, but it starts past what the source holds.
        Consignment::from_array_range(Channel::STATE, addr(), &source, 3, 2);
    }

    #[test]
    fn consignment_keeps_its_tags() {
        let c = Consignment::from_block(Channel::CONTROL, addr(), Block::from_vec(vec![9]));
        assert_eq!(c.channel(), Channel::CONTROL);
        assert_eq!(c.address(), &addr());
        assert_eq!(c.size(), 1);
    }

    #[test]
    fn consignment_over_shared_block_rejects_writes() {
        let mut c = Consignment::from_block(Channel::STATE, addr(), Block::from_shared(vec![1u8, 2]));
        assert!(c.set(0, &[3]).is_err());
    }
}
