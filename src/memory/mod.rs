pub mod allocators;
pub mod chunk;
pub mod heap;
pub mod stats;

/// Capacity of the arena when none is configured.
pub const DEFAULT_CAPACITY: usize = 4096;
