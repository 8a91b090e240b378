//! # tinyheap
//!
//! A fixed capacity allocator that keeps all of its bookkeeping inline, in one
//! or two header bytes in front of every chunk.
//!
//! ```text
//!   offset 0                                                  capacity
//!   ┌───┬────────┬───┬──────────────┬───┬──────┬───┬───────────────────┐
//!   │ h │  used  │ h │     free     │ h │ used │ 0 │     unclaimed     │
//!   └───┴────────┴───┴──────────────┴───┴──────┴───┴───────────────────┘
//!                                                  ▲
//!                                          sentinel / frontier
//!
//!   narrow header (total size <= 63)     wide header (total size <= 16383)
//!   ┌──────────────────┬─────┬─────┐    ┌──────────────────────┬─────┬─────┐
//!   │ total size (6)   │  0  │ use │    │ total size (14)      │  1  │ use │
//!   └──────────────────┴─────┴─────┘    └──────────────────────┴─────┴─────┘
//! ```
//!
//! There is no free list: allocation walks the headers from offset 0 and takes
//! the first free chunk big enough, splitting off whatever is left, or carves a
//! new chunk off the frontier. Freeing walks the headers too, merging every run
//! of neighbouring free chunks and handing a run that touches the frontier
//! back to it.
//!
//! ## Crate Structure
//!
//! ```text
//!   tinyheap
//!   ├── memory
//!   │   ├── chunk        - header codec and chunk walking
//!   │   ├── allocators   - the arena and the first fit allocator
//!   │   ├── heap         - malloc/free with call site diagnostics
//!   │   └── stats        - statistics and layout dumps
//!   ├── script           - allocation scripts run against a heap
//!   └── grind            - timed allocation workloads
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tinyheap::memory::heap::Heap;
//!
//! let mut heap = Heap::with_capacity(4096).unwrap();
//!
//! let ptr = heap.malloc(5).unwrap();
//! let _neighbour = heap.malloc(1).unwrap();
//! heap.payload_mut(ptr).unwrap().copy_from_slice(b"hello");
//! assert_eq!(heap.payload(ptr).unwrap(), b"hello");
//!
//! heap.free(ptr);
//! heap.free(ptr);
//! assert_eq!(heap.diagnostics()[0].reason(), "double free");
//! ```
//!
//! ## Limitations
//!
//! - **Single threaded**: a heap is plain mutable state with no locking
//! - **Fixed size**: the arena never grows, and is at most 16383 bytes
//! - **Byte aligned**: payloads carry no alignment guarantee
//! - **Linear**: every operation scans the arena

mod common;

pub mod grind;
pub mod memory;
pub mod script;
