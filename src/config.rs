use std::{
    fs,
    io::{self, IsTerminal, Write},
    path::{Path, PathBuf},
};

use clap::{ArgAction, Parser, Subcommand};
use thiserror::Error;
use tinyheap::{
    grind::{GrindSettings, WorkloadError, grind},
    memory::{DEFAULT_CAPACITY, allocators::AllocatorError, heap::Heap},
    script::{Runner, ScriptError},
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
pub enum ConfigError
{
    #[error("failed to read `{}`", path.display())]
    FileReadError
    {
        path: PathBuf,
        source: io::Error,
    },
    #[error("failed to install logging: {0}")]
    Logging(String),
    #[error(transparent)]
    Heap(#[from] AllocatorError),
    #[error(transparent)]
    Script(#[from] ScriptError),
    #[error(transparent)]
    Workload(#[from] WorkloadError),
    #[error("failed to write output")]
    Output(#[from] io::Error),
}

/// A fixed capacity, header based allocator and its workloads.
#[derive(Debug, Parser)]
#[command(name = "tinyheap", version, about)]
pub struct Config
{
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Arena capacity in bytes
    #[arg(short, long, default_value_t = DEFAULT_CAPACITY, global = true)]
    capacity: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command
{
    /// Run an allocation script and print its transcript
    Run
    {
        /// Path to the script
        script: PathBuf,
    },

    /// Time the allocation workloads
    Grind
    {
        /// Rounds to average over
        #[arg(short, long, default_value_t = Flags::DEFAULT_ROUNDS)]
        rounds: u32,

        /// Runs of each workload per round
        #[arg(short, long, default_value_t = Flags::DEFAULT_ITERATIONS)]
        iterations: u32,

        /// Seed for the randomised workload
        #[arg(short, long, default_value_t = 0)]
        seed: u64,
    },
}

struct Flags;

impl Flags
{
    const DEFAULT_ROUNDS: u32 = 5;
    const DEFAULT_ITERATIONS: u32 = 120;
}

impl Config
{
    pub fn new() -> Self
    {
        Self::parse()
    }

    pub fn execute(&self) -> Result<(), ConfigError>
    {
        self.init_logging()?;

        match self.command
        {
            Command::Run { ref script } => self.run_script(script),
            Command::Grind {
                rounds,
                iterations,
                seed,
            } =>
            {
                let report = grind(GrindSettings {
                    capacity: self.capacity,
                    rounds,
                    iterations,
                    seed,
                })?;

                write!(io::stdout().lock(), "{report}")?;
                Ok(())
            }
        }
    }

    fn run_script(&self, path: &Path) -> Result<(), ConfigError>
    {
        let source = fs::read_to_string(path).map_err(|x| ConfigError::FileReadError {
            path: path.to_owned(),
            source: x,
        })?;

        // Diagnostics name the script the way a C caller would name its file
        let file = path.file_name().unwrap_or(path.as_os_str()).to_string_lossy();

        let mut heap = Heap::with_capacity(self.capacity)?;
        Runner::new(&mut heap, &file, io::stdout().lock()).run(&source)?;
        Ok(())
    }

    fn init_logging(&self) -> Result<(), ConfigError>
    {
        let level = match self.verbose
        {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_target(false)
            .try_init()
            .map_err(|x| ConfigError::Logging(x.to_string()))
    }
}
