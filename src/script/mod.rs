// Allocation scripts: a line per command, run against a heap, with a line of
// transcript written per command. Failures of malloc and free are part of the
// transcript; only a broken script stops the run.

use std::{collections::HashMap, io::Write};

use thiserror::Error;

use crate::{
    memory::{
        allocators::{AllocatorError, Pointer},
        heap::{CallSite, Diagnostic, Heap},
    },
    script::parser::{Command, Line},
};

pub mod parser;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScriptError
{
    #[error("line {line}: unknown command `{command}`")]
    UnknownCommand
    {
        line: u32,
        command: String,
    },
    #[error("line {line}: expected `{usage}`")]
    Operands
    {
        line: u32,
        usage: &'static str,
    },
    #[error("line {line}: `{operand}` is not a valid number")]
    InvalidNumber
    {
        line: u32,
        operand: String,
    },
    #[error("line {line}: `{name}` was never allocated")]
    UnknownName
    {
        line: u32,
        name: String,
    },
    #[error("line {line}: cannot access `{name}`")]
    Access
    {
        line: u32,
        name: String,
        source: AllocatorError,
    },
    #[error("line {line}: `{name}` holds {found} at byte {index}, expected {expected}")]
    Mismatch
    {
        line: u32,
        name: String,
        index: usize,
        expected: u8,
        found: u8,
    },
    #[error("failed to write transcript")]
    WriteError,
}

/// Executes scripts against a heap, attributing heap failures to script lines.
pub struct Runner<'a, W>
{
    heap: &'a mut Heap,
    file: String,
    names: HashMap<String, Pointer>,
    target: W,
}

impl<'a, W> Runner<'a, W>
where
    W: Write,
{
    /// `file` is the name diagnostics report as their call site.
    pub fn new(heap: &'a mut Heap, file: &str, target: W) -> Self
    {
        Self {
            heap,
            file: file.to_owned(),
            names: HashMap::new(),
            target,
        }
    }

    /// Parses all of `source` before running any of it.
    ///
    /// # Errors
    ///
    /// Parse errors, accesses through names that do not refer to a live chunk,
    /// failed `expect` checks and transcript write failures.
    pub fn run(&mut self, source: &str) -> Result<(), ScriptError>
    {
        for line in parser::parse(source)?
        {
            self.execute(&line)?;
        }

        self.target.flush().map_err(|_| ScriptError::WriteError)
    }

    fn execute(&mut self, line: &Line) -> Result<(), ScriptError>
    {
        let site = CallSite::new(self.file.as_str(), line.number);

        match line.command
        {
            Command::Alloc { ref name, size } =>
            {
                let ptr = self.heap.malloc_at(size, site).unwrap_or_default();
                self.names.insert(name.clone(), ptr);

                let outcome = self.outcome(ptr.to_string());
                self.emit(&line.text, &outcome)
            }
            Command::Free { ref name } =>
            {
                let ptr = self.lookup(line.number, name)?;
                self.heap.free_at(ptr, site);

                let outcome = self.outcome("ok".to_owned());
                self.emit(&line.text, &outcome)
            }
            Command::FreeAt { offset } =>
            {
                self.heap.free_at(Pointer::from_offset(offset), site);

                let outcome = self.outcome("ok".to_owned());
                self.emit(&line.text, &outcome)
            }
            Command::Fill { ref name, byte } =>
            {
                self.payload_mut(line.number, name)?.fill(byte);
                self.emit(&line.text, "ok")
            }
            Command::Expect { ref name, byte } =>
            {
                let payload = self.payload(line.number, name)?;
                if let Some((index, found)) = payload.iter().enumerate().find(|&(_, x)| *x != byte)
                {
                    return Err(ScriptError::Mismatch {
                        line: line.number,
                        name: name.clone(),
                        index,
                        expected: byte,
                        found: *found,
                    });
                }

                let outcome = format!("ok ({} bytes)", payload.len());
                self.emit(&line.text, &outcome)
            }
            Command::Stats =>
            {
                let report = self.heap.stats().to_string();
                self.emit_block(&line.text, &report)
            }
            Command::Dump =>
            {
                let report = self.heap.layout().to_string();
                self.emit_block(&line.text, &report)
            }
        }
    }

    /// `success`, unless the heap reported a failure for the last operation.
    fn outcome(&mut self, success: String) -> String
    {
        self.heap
            .take_diagnostics()
            .pop()
            .as_ref()
            .map_or(success, |x: &Diagnostic| format!("error: {x}"))
    }

    fn lookup(&self, line: u32, name: &str) -> Result<Pointer, ScriptError>
    {
        self.names.get(name).copied().ok_or_else(|| ScriptError::UnknownName {
            line,
            name: name.to_owned(),
        })
    }

    fn payload(&self, line: u32, name: &str) -> Result<&[u8], ScriptError>
    {
        let ptr = self.lookup(line, name)?;
        self.heap.payload(ptr).map_err(|x| ScriptError::Access {
            line,
            name: name.to_owned(),
            source: x,
        })
    }

    fn payload_mut(&mut self, line: u32, name: &str) -> Result<&mut [u8], ScriptError>
    {
        let ptr = self.lookup(line, name)?;
        self.heap.payload_mut(ptr).map_err(|x| ScriptError::Access {
            line,
            name: name.to_owned(),
            source: x,
        })
    }

    fn emit(&mut self, text: &str, outcome: &str) -> Result<(), ScriptError>
    {
        writeln!(self.target, "{text} -> {outcome}").map_err(|_| ScriptError::WriteError)
    }

    fn emit_block(&mut self, text: &str, report: &str) -> Result<(), ScriptError>
    {
        writeln!(self.target, "{text}").map_err(|_| ScriptError::WriteError)?;
        for row in report.lines()
        {
            writeln!(self.target, "  {row}").map_err(|_| ScriptError::WriteError)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod runner_tests
{
    use super::*;

    fn transcript(capacity: usize, source: &str) -> (Result<(), ScriptError>, String)
    {
        let mut heap = Heap::with_capacity(capacity).unwrap();
        let mut output = vec![];
        let result = Runner::new(&mut heap, "test.heap", &mut output).run(source);

        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn allocate_fill_and_free()
    {
        let (result, output) = transcript(16, "alloc a 3\nfill a 7\nexpect a 7\nfree a\n");

        assert_eq!(result, Ok(()), "script is valid");
        assert_eq!(
            output,
            "alloc a 3 -> @1\nfill a 7 -> ok\nexpect a 7 -> ok (3 bytes)\nfree a -> ok\n",
            "one line per command"
        );
    }

    #[test]
    fn failures_are_reported_with_script_lines()
    {
        let (result, output) = transcript(16, "alloc a 0\n\nfree a\nalloc b 1\nfree b\nfree b\nfree-at 9\n");

        assert_eq!(result, Ok(()), "heap failures do not stop the script");
        assert_eq!(
            output,
            "alloc a 0 -> error: zero-size request (test.heap:1)\n\
             free a -> error: null pointer (test.heap:3)\n\
             alloc b 1 -> @1\n\
             free b -> ok\n\
             free b -> error: invalid/unrecognized pointer (test.heap:6)\n\
             free-at 9 -> error: invalid/unrecognized pointer (test.heap:7)\n",
            "failures carry the script line"
        );
    }

    #[test]
    fn expectation_mismatch_stops_the_script()
    {
        let (result, output) = transcript(16, "alloc a 4\nfill a 1\nexpect a 2\nfree a\n");

        assert_eq!(
            result,
            Err(ScriptError::Mismatch {
                line: 3,
                name: "a".to_owned(),
                index: 0,
                expected: 2,
                found: 1,
            }),
            "mismatch names the first differing byte"
        );
        assert_eq!(output, "alloc a 4 -> @1\nfill a 1 -> ok\n", "nothing runs after the failure");
    }

    #[test]
    fn names_must_exist_and_be_live()
    {
        let (unknown, _) = transcript(16, "free nobody");
        assert_eq!(
            unknown,
            Err(ScriptError::UnknownName {
                line: 1,
                name: "nobody".to_owned()
            }),
            "names must be bound first"
        );

        let (freed, _) = transcript(16, "alloc a 1\nalloc b 1\nfree a\nfill a 3");
        assert!(
            matches!(freed, Err(ScriptError::Access { line: 4, source: AllocatorError::DoubleFree, .. })),
            "freed payloads cannot be filled"
        );
    }

    #[test]
    fn parse_errors_run_nothing()
    {
        let (result, output) = transcript(16, "alloc a 1\nbogus\n");

        assert!(matches!(result, Err(ScriptError::UnknownCommand { line: 2, .. })), "bad line is reported");
        assert!(output.is_empty(), "the valid first line never ran");
    }

    #[test]
    fn stats_and_dump_blocks()
    {
        let (result, output) = transcript(8, "alloc a 1\ndump\n");

        assert_eq!(result, Ok(()), "script is valid");
        assert_eq!(output, "alloc a 1 -> @1\ndump\n  0..2 used size=2\n  2..8 frontier\n", "dump is indented");
    }
}
