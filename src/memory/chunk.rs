// Chunk headers live inline in the arena, directly in front of each payload.
//
// Header layout (a wide header is read as a little endian u16):
//
//   bit 0      in use
//   bit 1      width selector (0 = 1 byte, 1 = 2 bytes)
//   bits 2..   total chunk size, header included
//
// A free chunk with a total size of 0 is the sentinel marking the frontier.

use std::ops::Range;

use crate::memory::allocators::arena::Arena;

/// Largest total size that fits a single byte header.
pub const MAX_NARROW_SIZE: u16 = 63;

/// Largest total size that fits a two byte header.
pub const MAX_CHUNK_SIZE: u16 = 0x3FFF;

const IN_USE_BIT: u16 = 0b01;
const WIDE_BIT: u16 = 0b10;
const SIZE_SHIFT: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderWidth
{
    Narrow,
    Wide,
}

impl HeaderWidth
{
    /// Width of the header an in use chunk carrying `payload` bytes needs.
    pub const fn for_payload(payload: usize) -> Self
    {
        if payload < MAX_NARROW_SIZE as usize { Self::Narrow } else { Self::Wide }
    }

    /// Width `encode` picks for a chunk of `total_size` bytes.
    pub const fn for_size(total_size: u16) -> Self
    {
        if total_size <= MAX_NARROW_SIZE { Self::Narrow } else { Self::Wide }
    }

    pub const fn bytes(self) -> usize
    {
        match self
        {
            Self::Narrow => 1,
            Self::Wide => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkHeader
{
    in_use: bool,
    width: HeaderWidth,
    total_size: u16,
}

impl ChunkHeader
{
    pub const SENTINEL: Self = Self {
        in_use: false,
        width: HeaderWidth::Narrow,
        total_size: 0,
    };

    /// Sizes above [`MAX_CHUNK_SIZE`] lose their top bits when encoded. The arena
    /// capacity is capped so no chunk can reach that size.
    pub const fn new(in_use: bool, total_size: u16) -> Self
    {
        Self {
            in_use,
            width: HeaderWidth::for_size(total_size),
            total_size,
        }
    }

    pub const fn used(total_size: u16) -> Self
    {
        Self::new(true, total_size)
    }

    pub const fn free(total_size: u16) -> Self
    {
        Self::new(false, total_size)
    }

    /// Decodes the header starting at the first byte of `bytes`.
    ///
    /// Reading past the end of the slice yields zero bits, so an empty slice
    /// decodes as the sentinel.
    pub fn decode(bytes: &[u8]) -> Self
    {
        let low = bytes.first().copied().unwrap_or_default();
        let narrow = u16::from(low);

        if narrow & WIDE_BIT == 0
        {
            return Self {
                in_use: narrow & IN_USE_BIT != 0,
                width: HeaderWidth::Narrow,
                total_size: narrow >> SIZE_SHIFT,
            };
        }

        let unit = u16::from_le_bytes([low, bytes.get(1).copied().unwrap_or_default()]);
        Self {
            in_use: unit & IN_USE_BIT != 0,
            width: HeaderWidth::Wide,
            total_size: unit >> SIZE_SHIFT,
        }
    }

    /// Writes the header into the start of `target`, one or two bytes depending
    /// on its width.
    pub fn encode(self, target: &mut [u8])
    {
        let flags = match self.width
        {
            HeaderWidth::Narrow => u16::from(self.in_use),
            HeaderWidth::Wide => u16::from(self.in_use) | WIDE_BIT,
        };
        let [low, high] = ((self.total_size << SIZE_SHIFT) | flags).to_le_bytes();

        match self.width
        {
            HeaderWidth::Narrow => target[0] = low,
            HeaderWidth::Wide =>
            {
                target[0] = low;
                target[1] = high;
            }
        }
    }

    pub const fn in_use(self) -> bool
    {
        self.in_use
    }

    pub const fn width(self) -> HeaderWidth
    {
        self.width
    }

    pub const fn total_size(self) -> u16
    {
        self.total_size
    }

    pub const fn total_len(self) -> usize
    {
        self.total_size as usize
    }

    /// Zero sized chunks terminate every scan, whatever their in use bit says.
    pub const fn is_sentinel(self) -> bool
    {
        self.total_size == 0
    }

    pub const fn payload_offset(self, offset: usize) -> usize
    {
        offset + self.width.bytes()
    }

    pub const fn payload_len(self) -> usize
    {
        self.total_len().saturating_sub(self.width.bytes())
    }
}

/// A chunk header together with the arena offset it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkView
{
    offset: usize,
    header: ChunkHeader,
}

impl ChunkView
{
    pub const fn new(offset: usize, header: ChunkHeader) -> Self
    {
        Self { offset, header }
    }

    pub const fn offset(&self) -> usize
    {
        self.offset
    }

    pub const fn header(&self) -> ChunkHeader
    {
        self.header
    }

    pub const fn end(&self) -> usize
    {
        self.offset + self.header.total_len()
    }

    pub const fn payload_offset(&self) -> usize
    {
        self.header.payload_offset(self.offset)
    }

    pub const fn payload_range(&self) -> Range<usize>
    {
        self.payload_offset()..self.end()
    }
}

/// Walks the chunks of an arena in address order, stopping at the frontier.
#[derive(Clone)]
pub struct Chunks<'a>
{
    arena: &'a Arena,
    offset: usize,
}

impl<'a> Chunks<'a>
{
    pub const fn new(arena: &'a Arena) -> Self
    {
        Self { arena, offset: 0 }
    }
}

impl Iterator for Chunks<'_>
{
    type Item = ChunkView;

    fn next(&mut self) -> Option<Self::Item>
    {
        crate::guard!(self.offset < self.arena.capacity());

        let header = self.arena.header_at(self.offset);
        crate::guard!(!header.is_sentinel());

        let view = ChunkView::new(self.offset, header);
        self.offset = view.end();
        Some(view)
    }
}
