use std::ops::Range;

use tracing::debug;

use crate::memory::{
    allocators::{AllocatorError, MAX_CAPACITY},
    chunk::ChunkHeader,
};

/// The fixed backing region every chunk is carved from.
///
/// The bytes start zeroed, which reads as a lone sentinel at offset 0: an empty
/// arena with its frontier at the very start.
pub struct Arena
{
    bytes: Box<[u8]>,
}

impl Arena
{
    /// # Errors
    ///
    /// [`AllocatorError::BadConstraints`] when `capacity` is 0 or larger than
    /// [`MAX_CAPACITY`].
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocatorError>
    {
        crate::guard!((1..=MAX_CAPACITY).contains(&capacity), AllocatorError::BadConstraints);

        debug!(capacity, "arena created");
        Ok(Self {
            bytes: vec![0; capacity].into_boxed_slice(),
        })
    }

    pub fn capacity(&self) -> usize
    {
        self.bytes.len()
    }

    pub fn header_at(&self, offset: usize) -> ChunkHeader
    {
        ChunkHeader::decode(self.bytes.get(offset..).unwrap_or_default())
    }

    pub fn write_header(&mut self, offset: usize, header: ChunkHeader)
    {
        header.encode(&mut self.bytes[offset..]);
    }

    pub fn bytes(&self, range: Range<usize>) -> &[u8]
    {
        &self.bytes[range]
    }

    pub fn bytes_mut(&mut self, range: Range<usize>) -> &mut [u8]
    {
        &mut self.bytes[range]
    }

    /// Forgets every chunk at once by zeroing the region.
    pub fn release_all(&mut self)
    {
        self.bytes.fill(0);
        debug!(capacity = self.capacity(), "arena released");
    }
}
