use constcat::concat;

use crate::script::ScriptError;

const ALLOC: &str = "alloc";
const FREE: &str = "free";
const FREE_AT: &str = "free-at";
const FILL: &str = "fill";
const EXPECT: &str = "expect";
const STATS: &str = "stats";
const DUMP: &str = "dump";

const COMMENT: char = '#';

const ALLOC_USAGE: &str = concat!(ALLOC, " NAME SIZE");
const FREE_USAGE: &str = concat!(FREE, " NAME");
const FREE_AT_USAGE: &str = concat!(FREE_AT, " OFFSET");
const FILL_USAGE: &str = concat!(FILL, " NAME BYTE");
const EXPECT_USAGE: &str = concat!(EXPECT, " NAME BYTE");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command
{
    Alloc
    {
        name: String,
        size: usize,
    },
    Free
    {
        name: String,
    },
    FreeAt
    {
        offset: usize,
    },
    Fill
    {
        name: String,
        byte: u8,
    },
    Expect
    {
        name: String,
        byte: u8,
    },
    Stats,
    Dump,
}

/// One executable line of a script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line
{
    /// 1 based line number in the source
    pub number: u32,
    /// The command as written, comments stripped
    pub text: String,
    pub command: Command,
}

/// Parses a whole script, skipping blank lines and comments.
///
/// # Errors
///
/// The first line that is not a valid command.
pub fn parse(source: &str) -> Result<Vec<Line>, ScriptError>
{
    let mut lines = vec![];

    for (number, raw) in (1..).zip(source.lines())
    {
        let text = raw.split_once(COMMENT).map_or(raw, |(x, _)| x).trim();
        if text.is_empty()
        {
            continue;
        }

        lines.push(Line {
            number,
            text: text.to_owned(),
            command: parse_command(number, text)?,
        });
    }

    Ok(lines)
}

fn parse_command(line: u32, text: &str) -> Result<Command, ScriptError>
{
    let mut words = text.split_whitespace();
    let keyword = words.next().unwrap_or_default();
    let operands: Vec<&str> = words.collect();

    let command = match keyword
    {
        ALLOC =>
        {
            let [name, size] = operands_for(line, &operands, ALLOC_USAGE)?;
            Command::Alloc {
                name: name.to_owned(),
                size: parse_number(line, size)?,
            }
        }
        FREE =>
        {
            let [name] = operands_for(line, &operands, FREE_USAGE)?;
            Command::Free { name: name.to_owned() }
        }
        FREE_AT =>
        {
            let [offset] = operands_for(line, &operands, FREE_AT_USAGE)?;
            Command::FreeAt {
                offset: parse_number(line, offset)?,
            }
        }
        FILL =>
        {
            let [name, byte] = operands_for(line, &operands, FILL_USAGE)?;
            Command::Fill {
                name: name.to_owned(),
                byte: parse_number(line, byte)?,
            }
        }
        EXPECT =>
        {
            let [name, byte] = operands_for(line, &operands, EXPECT_USAGE)?;
            Command::Expect {
                name: name.to_owned(),
                byte: parse_number(line, byte)?,
            }
        }
        STATS =>
        {
            operands_for::<0>(line, &operands, STATS)?;
            Command::Stats
        }
        DUMP =>
        {
            operands_for::<0>(line, &operands, DUMP)?;
            Command::Dump
        }
        unknown =>
        {
            return Err(ScriptError::UnknownCommand {
                line,
                command: unknown.to_owned(),
            });
        }
    };

    Ok(command)
}

fn operands_for<'a, const N: usize>(
    line: u32,
    operands: &[&'a str],
    usage: &'static str,
) -> Result<[&'a str; N], ScriptError>
{
    <[&str; N]>::try_from(operands).map_err(|_| ScriptError::Operands { line, usage })
}

/// Decimal, or hexadecimal with a `0x` prefix.
fn parse_number<T>(line: u32, operand: &str) -> Result<T, ScriptError>
where
    T: TryFrom<u64>,
{
    operand
        .strip_prefix("0x")
        .map_or_else(|| operand.parse::<u64>().ok(), |x| u64::from_str_radix(x, 16).ok())
        .and_then(|x| T::try_from(x).ok())
        .ok_or_else(|| ScriptError::InvalidNumber {
            line,
            operand: operand.to_owned(),
        })
}
