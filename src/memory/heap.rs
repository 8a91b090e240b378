use std::{
    fmt::{self, Display, Formatter},
    mem,
    panic::Location,
};

use tracing::warn;

use crate::memory::{
    allocators::{AllocatorError, Pointer, general::GeneralAllocator},
    chunk::Chunks,
    stats::{HeapStats, LayoutDump},
};

/// Where a `malloc` or `free` call came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite
{
    file: String,
    line: u32,
}

impl CallSite
{
    pub fn new<F>(file: F, line: u32) -> Self
    where
        F: Into<String>,
    {
        Self {
            file: file.into(),
            line,
        }
    }

    #[track_caller]
    pub fn caller() -> Self
    {
        let location = Location::caller();
        Self::new(location.file(), location.line())
    }

    pub fn file(&self) -> &str
    {
        &self.file
    }

    pub const fn line(&self) -> u32
    {
        self.line
    }
}

impl Display for CallSite
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation
{
    Malloc,
    Free,
}

impl Display for Operation
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        match *self
        {
            Self::Malloc => write!(f, "malloc"),
            Self::Free => write!(f, "free"),
        }
    }
}

/// A failed `malloc` or `free`, attributed to its call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic
{
    operation: Operation,
    error: AllocatorError,
    site: CallSite,
}

impl Diagnostic
{
    pub const fn operation(&self) -> Operation
    {
        self.operation
    }

    pub const fn error(&self) -> AllocatorError
    {
        self.error
    }

    pub const fn site(&self) -> &CallSite
    {
        &self.site
    }

    pub const fn reason(&self) -> &'static str
    {
        match (self.operation, self.error)
        {
            (Operation::Malloc, AllocatorError::InvalidArgument) => "zero-size request",
            (Operation::Free, AllocatorError::InvalidArgument) => "null pointer",
            (_, AllocatorError::OutOfMemory) => "out of memory",
            (_, AllocatorError::DoubleFree) => "double free",
            (_, AllocatorError::InvalidFree) => "invalid/unrecognized pointer",
            (_, AllocatorError::BadConstraints) => "bad arena constraints",
        }
    }
}

impl Display for Diagnostic
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        write!(f, "{} ({})", self.reason(), self.site)
    }
}

/// The caller facing allocator.
///
/// Failures never reach the caller as errors: `malloc` hands back `None`,
/// `free` leaves the arena alone, and both record a [`Diagnostic`] and emit a
/// warning naming the call site.
///
/// Not synchronised. Callers sharing a heap across threads must serialise
/// access themselves.
pub struct Heap
{
    allocator: GeneralAllocator,
    diagnostics: Vec<Diagnostic>,
}

impl Heap
{
    /// # Errors
    ///
    /// [`AllocatorError::BadConstraints`] for capacities an arena cannot have.
    pub fn with_capacity(capacity: usize) -> Result<Self, AllocatorError>
    {
        Ok(Self::from_allocator(GeneralAllocator::with_capacity(capacity)?))
    }

    pub const fn from_allocator(allocator: GeneralAllocator) -> Self
    {
        Self {
            allocator,
            diagnostics: vec![],
        }
    }

    #[track_caller]
    pub fn malloc(&mut self, size: usize) -> Option<Pointer>
    {
        self.malloc_at(size, CallSite::caller())
    }

    pub fn malloc_at(&mut self, size: usize, site: CallSite) -> Option<Pointer>
    {
        self.allocator
            .allocate(size)
            .map_err(|x| self.report(Operation::Malloc, x, site))
            .ok()
    }

    #[track_caller]
    pub fn free(&mut self, ptr: Pointer)
    {
        self.free_at(ptr, CallSite::caller());
    }

    pub fn free_at(&mut self, ptr: Pointer, site: CallSite)
    {
        if let Err(error) = self.allocator.deallocate(ptr)
        {
            self.report(Operation::Free, error, site);
        }
    }

    fn report(&mut self, operation: Operation, error: AllocatorError, site: CallSite)
    {
        let diagnostic = Diagnostic { operation, error, site };
        warn!(
            file = diagnostic.site.file(),
            line = diagnostic.site.line(),
            reason = diagnostic.reason(),
            "{operation} failed"
        );

        self.diagnostics.push(diagnostic);
    }

    /// Diagnostics recorded since the last [`Self::take_diagnostics`].
    pub fn diagnostics(&self) -> &[Diagnostic]
    {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic>
    {
        mem::take(&mut self.diagnostics)
    }

    /// # Errors
    ///
    /// The [`AllocatorError`] a `free` of `ptr` would fail with.
    pub fn payload(&self, ptr: Pointer) -> Result<&[u8], AllocatorError>
    {
        self.allocator.payload(ptr)
    }

    /// # Errors
    ///
    /// The [`AllocatorError`] a `free` of `ptr` would fail with.
    pub fn payload_mut(&mut self, ptr: Pointer) -> Result<&mut [u8], AllocatorError>
    {
        self.allocator.payload_mut(ptr)
    }

    pub fn capacity(&self) -> usize
    {
        self.allocator.capacity()
    }

    pub const fn chunks(&self) -> Chunks<'_>
    {
        self.allocator.chunks()
    }

    pub fn frontier(&self) -> usize
    {
        self.allocator.frontier()
    }

    pub fn stats(&self) -> HeapStats
    {
        HeapStats::collect(self.chunks(), self.capacity())
    }

    pub fn layout(&self) -> LayoutDump<'_>
    {
        LayoutDump::new(self.chunks(), self.capacity())
    }

    /// Frees every chunk at once and drops recorded diagnostics.
    pub fn reset(&mut self)
    {
        self.allocator.release_all();
        self.diagnostics.clear();
    }
}

#[cfg(test)]
mod heap_tests
{
    use super::*;

    #[test]
    fn malloc_and_free()
    {
        let mut heap = Heap::with_capacity(64).unwrap();
        let ptr = heap.malloc(10).unwrap();

        heap.payload_mut(ptr).unwrap().fill(3);
        assert_eq!(heap.payload(ptr).unwrap(), &[3; 10], "payload should read back");

        heap.free(ptr);
        assert!(heap.diagnostics().is_empty(), "nothing went wrong");
        assert!(heap.stats().is_empty(), "heap is empty again");
    }

    #[test]
    fn failures_name_the_caller()
    {
        let mut heap = Heap::with_capacity(16).unwrap();

        let line = line!() + 1;
        assert_eq!(heap.malloc(0), None, "zero size request returns null");

        let diagnostics = heap.take_diagnostics();
        assert_eq!(diagnostics.len(), 1, "one failure recorded");
        assert_eq!(diagnostics[0].site().file(), file!(), "file of the caller");
        assert_eq!(diagnostics[0].site().line(), line, "line of the caller");
        assert_eq!(diagnostics[0].reason(), "zero-size request", "reason for malloc(0)");
        assert!(heap.diagnostics().is_empty(), "take drains the record");
    }

    #[test]
    fn every_reason()
    {
        let mut heap = Heap::with_capacity(16).unwrap();
        let ptr = heap.malloc(4).unwrap();
        let _guard = heap.malloc(1).unwrap();

        assert_eq!(heap.malloc(100), None, "request larger than the arena");
        heap.free(Pointer::null());
        heap.free(ptr);
        heap.free(ptr);
        heap.free(ptr.byte_add(2));

        let reasons: Vec<_> = heap.diagnostics().iter().map(Diagnostic::reason).collect();
        assert_eq!(
            reasons,
            ["out of memory", "null pointer", "double free", "invalid/unrecognized pointer"],
            "each misuse gets its own reason"
        );
    }

    #[test]
    fn explicit_call_sites()
    {
        let mut heap = Heap::with_capacity(16).unwrap();
        heap.free_at(Pointer::from_offset(5), CallSite::new("script.heap", 7));

        assert_eq!(
            heap.diagnostics()[0].to_string(),
            "invalid/unrecognized pointer (script.heap:7)",
            "diagnostic renders reason and site"
        );
        assert_eq!(heap.diagnostics()[0].operation(), Operation::Free, "operation recorded");
        assert_eq!(heap.diagnostics()[0].error(), AllocatorError::InvalidFree, "error recorded");
    }

    #[test]
    fn failed_free_leaves_the_arena_alone()
    {
        let mut heap = Heap::with_capacity(32).unwrap();
        let first = heap.malloc(3).unwrap();
        let _second = heap.malloc(3).unwrap();
        heap.free(first);

        let before = heap.layout().to_string();
        heap.free(first);
        heap.free(first.byte_add(1));
        assert_eq!(heap.layout().to_string(), before, "rejected frees do not write");
    }

    #[test]
    fn independent_heaps()
    {
        let mut left = Heap::with_capacity(16).unwrap();
        let mut right = Heap::with_capacity(16).unwrap();

        let ptr = left.malloc(2).unwrap();
        right.free(ptr);

        assert_eq!(right.diagnostics().len(), 1, "pointers do not cross heaps");
        assert!(left.payload(ptr).is_ok(), "left heap is untouched");
    }

    #[test]
    fn reset_empties_the_heap()
    {
        let mut heap = Heap::with_capacity(16).unwrap();
        let _ptr = heap.malloc(5).unwrap();
        heap.malloc(0);

        heap.reset();
        assert!(heap.stats().is_empty(), "no chunks after reset");
        assert!(heap.diagnostics().is_empty(), "diagnostics cleared");
        assert_eq!(heap.malloc(14), Some(Pointer::from_offset(1)), "full capacity is usable");
    }
}
