//! Timed allocation workloads.
//!
//! Each workload is a fixed access pattern of 1 and 10 byte requests that
//! leaves the heap empty when it finishes. [`grind`] runs all of them many
//! times and reports the mean duration of one run.

use std::{
    fmt::{self, Display, Formatter},
    time::{Duration, Instant},
};

use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::{debug, info};

use crate::memory::{
    allocators::{AllocatorError, Pointer},
    heap::{Diagnostic, Heap},
};

/// Live chunks each workload builds up to.
const REPETITIONS: usize = 120;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkloadError
{
    #[error(transparent)]
    Heap(#[from] AllocatorError),
    #[error("workload {workload}: {diagnostic}")]
    Failed
    {
        workload: Workload,
        diagnostic: Diagnostic,
    },
    #[error("workload {workload} left {chunks} chunks allocated")]
    Leaked
    {
        workload: Workload,
        chunks: usize,
    },
    #[error("rounds and iterations must be at least 1")]
    NothingToRun,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Workload
{
    /// Allocate one byte and free it straight away
    A,
    /// Allocate every byte, then free them in order
    B,
    /// Randomly allocate or free the newest byte until all are live
    C,
    /// Punch a hole in the middle and refill it with larger requests
    D,
    /// Free the upper half, then the lower half
    E,
}

impl Workload
{
    pub const ALL: [Self; 5] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// How many runs one iteration of the workload counts for.
    const fn weight(self) -> u32
    {
        match self
        {
            Self::C => 2,
            Self::A | Self::B | Self::D | Self::E => 1,
        }
    }

    /// Runs the pattern once against `heap`, which must start empty.
    ///
    /// # Errors
    ///
    /// The first failed `malloc` or `free`, or chunks left behind.
    pub fn run(self, heap: &mut Heap, rng: &mut StdRng) -> Result<(), WorkloadError>
    {
        match self
        {
            Self::A => Self::single_bytes(heap),
            Self::B => Self::in_order(heap),
            Self::C => Self::random_walk(heap, rng),
            Self::D => Self::refill_hole(heap),
            Self::E => Self::halves(heap),
        }

        if let Some(diagnostic) = heap.take_diagnostics().into_iter().next()
        {
            return Err(WorkloadError::Failed { workload: self, diagnostic });
        }

        let chunks = heap.stats().used_chunks;
        crate::guard!(chunks == 0, WorkloadError::Leaked { workload: self, chunks });
        Ok(())
    }

    fn single_bytes(heap: &mut Heap)
    {
        for _ in 0..REPETITIONS
        {
            let ptr = heap.malloc(1).unwrap_or_default();
            heap.free(ptr);
        }
    }

    fn fill(heap: &mut Heap, size: usize) -> Vec<Pointer>
    {
        (0..REPETITIONS).map(|_| heap.malloc(size).unwrap_or_default()).collect()
    }

    fn in_order(heap: &mut Heap)
    {
        for ptr in Self::fill(heap, 1)
        {
            heap.free(ptr);
        }
    }

    fn random_walk(heap: &mut Heap, rng: &mut StdRng)
    {
        let mut live = Vec::with_capacity(REPETITIONS);

        while live.len() < REPETITIONS
        {
            if rng.gen_bool(0.5)
            {
                live.push(heap.malloc(1).unwrap_or_default());
            }
            else if let Some(ptr) = live.pop()
            {
                heap.free(ptr);
            }
        }

        for ptr in live
        {
            heap.free(ptr);
        }
    }

    fn refill_hole(heap: &mut Heap)
    {
        let mut storage = Self::fill(heap, 1);
        let hole = REPETITIONS / 4..REPETITIONS / 2;

        for ptr in &storage[hole.clone()]
        {
            heap.free(*ptr);
        }
        for slot in &mut storage[hole]
        {
            *slot = heap.malloc(10).unwrap_or_default();
        }

        for ptr in storage
        {
            heap.free(ptr);
        }
    }

    fn halves(heap: &mut Heap)
    {
        let storage = Self::fill(heap, 1);
        let (lower, upper) = storage.split_at(REPETITIONS / 2);

        for ptr in upper.iter().chain(lower)
        {
            heap.free(*ptr);
        }
    }
}

impl Display for Workload
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        let name = match *self
        {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        };
        write!(f, "{name}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrindSettings
{
    pub capacity: usize,
    pub rounds: u32,
    pub iterations: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrindReport
{
    means: Vec<(Workload, Duration)>,
}

impl GrindReport
{
    pub fn means(&self) -> &[(Workload, Duration)]
    {
        &self.means
    }
}

impl Display for GrindReport
{
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result
    {
        for &(workload, mean) in &self.means
        {
            writeln!(f, "workload {workload} average: {} microseconds", mean.as_micros())?;
        }

        Ok(())
    }
}

/// Runs every workload `iterations` times per round for `rounds` rounds on a
/// single heap.
///
/// # Errors
///
/// An unusable capacity, zero rounds or iterations, or the first workload that
/// fails.
pub fn grind(settings: GrindSettings) -> Result<GrindReport, WorkloadError>
{
    crate::guard!(settings.rounds > 0 && settings.iterations > 0, WorkloadError::NothingToRun);

    let mut heap = Heap::with_capacity(settings.capacity)?;
    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut means = vec![];

    for workload in Workload::ALL
    {
        let runs = settings.iterations * workload.weight();
        let mut total = Duration::ZERO;

        for round in 0..settings.rounds
        {
            let start = Instant::now();
            for _ in 0..runs
            {
                workload.run(&mut heap, &mut rng)?;
            }
            total += start.elapsed();

            debug!(%workload, round, "round finished");
        }

        let mean = total / (runs * settings.rounds);
        info!(%workload, mean_us = mean.as_micros(), "workload finished");
        means.push((workload, mean));
    }

    Ok(GrindReport { means })
}
