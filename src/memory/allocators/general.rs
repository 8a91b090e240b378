// A header based first fit allocator over a single fixed arena.
//
// There is no free list. Every operation walks the chunk headers from offset 0,
// so the arena bytes are the only state and first fit always means lowest
// address first.

use tracing::trace;

use crate::memory::{
    allocators::{AllocatorError, Pointer, arena::Arena},
    chunk::{ChunkHeader, ChunkView, Chunks, HeaderWidth},
};

pub struct GeneralAllocator
{
    arena: Arena,
}

impl GeneralAllocator
{
    /// # Errors
    ///
    /// [`AllocatorError::BadConstraints`] for capacities an arena cannot have.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocatorError>
    {
        Ok(Self::from_existing_arena(Arena::with_capacity(capacity)?))
    }

    /// Takes over an arena. Whatever chunks it already holds stay valid.
    pub const fn from_existing_arena(arena: Arena) -> Self
    {
        Self { arena }
    }

    pub fn capacity(&self) -> usize
    {
        self.arena.capacity()
    }

    /// Reserves `size` contiguous bytes in the first chunk, by address, that can
    /// hold them.
    ///
    /// A free chunk larger than needed is split and the tail stays free. When no
    /// free chunk fits, the chunk is carved off the frontier instead.
    ///
    /// # Errors
    ///
    /// [`AllocatorError::InvalidArgument`] for a zero size request and
    /// [`AllocatorError::OutOfMemory`] when neither a free chunk nor the frontier
    /// has room. The arena is untouched on failure.
    pub fn allocate(&mut self, size: usize) -> Result<Pointer, AllocatorError>
    {
        crate::guard!(size > 0, AllocatorError::InvalidArgument);

        let needed = size
            .checked_add(HeaderWidth::for_payload(size).bytes())
            .filter(|x| *x <= self.capacity())
            .and_then(|x| u16::try_from(x).ok())
            .ok_or(AllocatorError::OutOfMemory)?;

        let capacity = self.capacity();
        let mut offset = 0;
        while offset < capacity
        {
            let header = self.arena.header_at(offset);

            if header.is_sentinel()
            {
                // The sentinel is always the last chunk
                return self.carve_frontier(offset, needed);
            }

            if !header.in_use() && needed <= header.total_size()
            {
                return Ok(self.split(offset, header, needed));
            }

            offset += header.total_len();
        }

        Err(AllocatorError::OutOfMemory)
    }

    fn carve_frontier(&mut self, offset: usize, needed: u16) -> Result<Pointer, AllocatorError>
    {
        let end = offset + usize::from(needed);
        crate::guard!(end <= self.capacity(), AllocatorError::OutOfMemory);

        let header = ChunkHeader::used(needed);
        self.arena.write_header(offset, header);
        if end < self.capacity()
        {
            self.arena.write_header(end, ChunkHeader::SENTINEL);
        }

        trace!(offset, size = needed, frontier = end, "carved chunk from frontier");
        Ok(Pointer::from_offset(header.payload_offset(offset)))
    }

    fn split(&mut self, offset: usize, free: ChunkHeader, needed: u16) -> Pointer
    {
        let header = ChunkHeader::used(needed);
        self.arena.write_header(offset, header);

        let remainder = free.total_size() - needed;
        if remainder > 0
        {
            self.arena.write_header(offset + usize::from(needed), ChunkHeader::free(remainder));
        }

        trace!(offset, size = needed, remainder, "split free chunk");
        Pointer::from_offset(header.payload_offset(offset))
    }

    /// Releases the chunk whose payload starts at `ptr` and merges every run of
    /// adjacent free chunks. A run that reaches the frontier is handed back to it.
    ///
    /// `ptr` is checked against every chunk boundary before anything is written.
    ///
    /// # Errors
    ///
    /// [`AllocatorError::InvalidArgument`] for the null pointer,
    /// [`AllocatorError::DoubleFree`] when `ptr` is the payload of a free chunk,
    /// and [`AllocatorError::InvalidFree`] when it is no payload at all. The arena
    /// is untouched on failure.
    pub fn deallocate(&mut self, ptr: Pointer) -> Result<(), AllocatorError>
    {
        let released = self.locate(ptr)?;
        self.coalesce(released.offset());

        Ok(())
    }

    /// Finds the live chunk `ptr` refers to.
    fn locate(&self, ptr: Pointer) -> Result<ChunkView, AllocatorError>
    {
        crate::guard!(!ptr.is_null(), AllocatorError::InvalidArgument);

        let chunk = self
            .chunks()
            .find(|x| x.payload_offset() == ptr.offset())
            .ok_or(AllocatorError::InvalidFree)?;

        crate::guard!(chunk.header().in_use(), AllocatorError::DoubleFree);
        Ok(chunk)
    }

    fn coalesce(&mut self, released: usize)
    {
        // (start, merged size) of the free run being collected
        let mut run: Option<(usize, u16)> = None;

        let capacity = self.capacity();
        let mut offset = 0;
        while offset < capacity
        {
            let header = self.arena.header_at(offset);
            if header.is_sentinel()
            {
                break;
            }

            if header.in_use() && offset != released
            {
                if let Some((start, size)) = run.take()
                {
                    self.arena.write_header(start, ChunkHeader::free(size));
                    trace!(offset = start, size, "coalesced free run");
                }
            }
            else
            {
                run = Some(run.map_or((offset, header.total_size()), |(start, size)| {
                    (start, size + header.total_size())
                }));
            }

            offset += header.total_len();
        }

        if let Some((start, size)) = run
        {
            self.arena.write_header(start, ChunkHeader::SENTINEL);
            trace!(frontier = start, reclaimed = size, "free run returned to frontier");
        }
    }

    /// The payload of a live chunk.
    ///
    /// # Errors
    ///
    /// The same conditions [`Self::deallocate`] rejects `ptr` for.
    pub fn payload(&self, ptr: Pointer) -> Result<&[u8], AllocatorError>
    {
        let chunk = self.locate(ptr)?;
        Ok(self.arena.bytes(chunk.payload_range()))
    }

    /// # Errors
    ///
    /// The same conditions [`Self::deallocate`] rejects `ptr` for.
    pub fn payload_mut(&mut self, ptr: Pointer) -> Result<&mut [u8], AllocatorError>
    {
        let chunk = self.locate(ptr)?;
        Ok(self.arena.bytes_mut(chunk.payload_range()))
    }

    pub const fn chunks(&self) -> Chunks<'_>
    {
        Chunks::new(&self.arena)
    }

    /// Offset of the sentinel, or the capacity once the frontier has reached
    /// the end of the arena.
    pub fn frontier(&self) -> usize
    {
        self.chunks().last().map_or(0, |x| x.end())
    }

    pub fn release_all(&mut self)
    {
        self.arena.release_all();
    }
}
