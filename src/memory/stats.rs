//! Read only views over an arena's chunk layout.

use std::fmt::{self, Display, Formatter};

use crate::memory::chunk::{ChunkView, Chunks};

/// A snapshot of how an arena is carved up.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeapStats
{
    /// Size of the backing region
    pub capacity: usize,
    /// Offset of the sentinel, or `capacity` when there is none
    pub frontier: usize,
    /// Chunks currently handed out
    pub used_chunks: usize,
    /// Free chunks below the frontier
    pub free_chunks: usize,
    /// Bytes held by used chunks, headers included
    pub used_bytes: usize,
    /// Bytes held by free chunks, headers included
    pub free_bytes: usize,
    /// Bytes callers can actually use
    pub payload_bytes: usize,
    /// Total size of the biggest free chunk below the frontier
    pub largest_free: usize,
}

impl HeapStats
{
    pub fn collect(chunks: Chunks<'_>, capacity: usize) -> Self
    {
        chunks.fold(
            Self {
                capacity,
                ..Self::default()
            },
            |mut stats, chunk| {
                let size = chunk.header().total_len();
                stats.frontier = chunk.end();

                if chunk.header().in_use()
                {
                    stats.used_chunks += 1;
                    stats.used_bytes += size;
                    stats.payload_bytes += chunk.header().payload_len();
                }
                else
                {
                    stats.free_chunks += 1;
                    stats.free_bytes += size;
                    stats.largest_free = stats.largest_free.max(size);
                }

                stats
            },
        )
    }

    /// Bytes past the frontier that have never been claimed.
    pub const fn unclaimed_bytes(&self) -> usize
    {
        self.capacity - self.frontier
    }

    pub const fn is_empty(&self) -> bool
    {
        self.used_chunks == 0
    }
}

impl Display for HeapStats
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        writeln!(f, "capacity: {}", self.capacity)?;
        writeln!(f, "frontier: {}", self.frontier)?;
        writeln!(f, "used: {} chunks, {} bytes ({} payload)", self.used_chunks, self.used_bytes, self.payload_bytes)?;
        writeln!(f, "free: {} chunks, {} bytes (largest {})", self.free_chunks, self.free_bytes, self.largest_free)?;
        write!(f, "unclaimed: {}", self.unclaimed_bytes())
    }
}

/// Renders one line per chunk followed by the frontier.
pub struct LayoutDump<'a>
{
    chunks: Chunks<'a>,
    capacity: usize,
}

impl<'a> LayoutDump<'a>
{
    pub const fn new(chunks: Chunks<'a>, capacity: usize) -> Self
    {
        Self { chunks, capacity }
    }
}

impl Display for LayoutDump<'_>
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        let mut frontier = 0;
        for chunk in self.chunks.clone()
        {
            write_chunk(f, &chunk)?;
            frontier = chunk.end();
        }

        if frontier < self.capacity
        {
            write!(f, "{frontier}..{} frontier", self.capacity)
        }
        else
        {
            write!(f, "{frontier} saturated")
        }
    }
}

fn write_chunk(f: &mut Formatter<'_>, chunk: &ChunkView) -> fmt::Result
{
    let state = if chunk.header().in_use() { "used" } else { "free" };
    writeln!(f, "{}..{} {state} size={}", chunk.offset(), chunk.end(), chunk.header().total_size())
}

#[cfg(test)]
mod stats_tests
{
    use crate::memory::allocators::general::GeneralAllocator;

    use super::*;

    #[test]
    fn empty_arena()
    {
        let allocator = GeneralAllocator::with_capacity(64).unwrap();
        let stats = HeapStats::collect(allocator.chunks(), allocator.capacity());

        assert!(stats.is_empty(), "nothing allocated");
        assert_eq!(stats.unclaimed_bytes(), 64, "everything is past the frontier");
        assert_eq!(
            LayoutDump::new(allocator.chunks(), 64).to_string(),
            "0..64 frontier",
            "empty layout is just the frontier"
        );
    }

    #[test]
    fn mixed_layout()
    {
        let mut allocator = GeneralAllocator::with_capacity(128).unwrap();
        let first = allocator.allocate(4).unwrap();
        let _second = allocator.allocate(70).unwrap();
        allocator.deallocate(first).unwrap();

        let stats = HeapStats::collect(allocator.chunks(), allocator.capacity());
        assert_eq!(
            stats,
            HeapStats {
                capacity: 128,
                frontier: 77,
                used_chunks: 1,
                free_chunks: 1,
                used_bytes: 72,
                free_bytes: 5,
                payload_bytes: 70,
                largest_free: 5,
            },
            "one free hole then one wide chunk"
        );
        assert_eq!(
            LayoutDump::new(allocator.chunks(), 128).to_string(),
            "0..5 free size=5\n5..77 used size=72\n77..128 frontier",
            "layout lists every chunk"
        );
    }

    #[test]
    fn saturated_layout()
    {
        let mut allocator = GeneralAllocator::with_capacity(4).unwrap();
        let _first = allocator.allocate(3).unwrap();

        assert_eq!(
            LayoutDump::new(allocator.chunks(), 4).to_string(),
            "0..4 used size=4\n4 saturated",
            "no sentinel once the frontier hits the end"
        );
    }
}
