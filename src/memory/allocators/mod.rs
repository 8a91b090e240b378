use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use crate::memory::chunk::MAX_CHUNK_SIZE;

pub mod arena;
pub mod general;

/// Largest arena a header can describe in one free chunk.
pub const MAX_CAPACITY: usize = MAX_CHUNK_SIZE as usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocatorError
{
    #[error("invalid argument")]
    InvalidArgument,
    #[error("out of memory")]
    OutOfMemory,
    #[error("double free")]
    DoubleFree,
    #[error("invalid/unrecognized pointer")]
    InvalidFree,
    #[error("arena capacity must be between 1 and {} bytes", MAX_CAPACITY)]
    BadConstraints,
}

/// An offset into an arena that addresses the first byte of a payload.
///
/// Pointers carry no provenance: any offset can be turned into one, and the
/// allocator validates it against the chunk headers before use. Offset 0 always
/// holds a header, so it doubles as the null pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pointer(usize);

impl Pointer
{
    pub const fn null() -> Self
    {
        Self(0)
    }

    pub const fn from_offset(offset: usize) -> Self
    {
        Self(offset)
    }

    pub const fn offset(self) -> usize
    {
        self.0
    }

    pub const fn is_null(self) -> bool
    {
        self.0 == 0
    }

    #[must_use]
    pub const fn byte_add(self, count: usize) -> Self
    {
        Self(self.0 + count)
    }
}

impl Display for Pointer
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        if self.is_null() { write!(f, "null") } else { write!(f, "@{}", self.0) }
    }
}
