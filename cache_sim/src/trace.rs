use std::fmt::Display;

use nom::{
    branch::alt,
    bytes::complete::{tag_no_case, take_till},
    character::complete::{char, digit1, hex_digit1, multispace1},
    combinator::{map_res, value},
    multi::many0,
    sequence::{pair, preceded, terminated},
    IResult,
};
use thiserror::Error;

use crate::memory::Addr;

/// the sequence replayed when no other trace is supplied
pub const ACCESS_SEQUENCE: [usize; 15] = [5, 10, 5, 15, 20, 5, 25, 10, 30, 5, 15, 35, 5, 40, 10];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TraceParseError {
    #[error("expected an address at line {line}, column {column}, found `{found}`")]
    Unexpected {
        line: usize,
        column: usize,
        found: String,
    },
}

/// Ordered, immutable list of addresses to replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessTrace {
    seq: Vec<Addr>,
}

impl AccessTrace {
    pub fn new(seq: Vec<Addr>) -> Self {
        Self { seq }
    }
    pub fn len(&self) -> usize {
        self.seq.len()
    }
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }
    pub fn get(&self, index: usize) -> Option<Addr> {
        self.seq.get(index).copied()
    }
    pub fn as_slice(&self) -> &[Addr] {
        &self.seq
    }
    pub fn iter(&self) -> impl Iterator<Item = Addr> + '_ {
        self.seq.iter().copied()
    }

    /// Parses addresses separated by whitespace and/or commas.
    ///
    /// Both decimal and `0x`-prefixed hexadecimal are accepted; `#` starts a
    /// comment running to the end of the line.
    pub fn parse(input: &str) -> Result<Self, TraceParseError> {
        let (rest, seq) = read_trace(input).map_err(|_| unexpected(input, input))?;
        if !rest.is_empty() {
            return Err(unexpected(input, rest));
        }
        Ok(Self { seq })
    }
}

impl Default for AccessTrace {
    fn default() -> Self {
        ACCESS_SEQUENCE.into_iter().collect()
    }
}

impl FromIterator<usize> for AccessTrace {
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        Self::new(iter.into_iter().map(Addr::new).collect())
    }
}

impl FromIterator<Addr> for AccessTrace {
    fn from_iter<T: IntoIterator<Item = Addr>>(iter: T) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl Display for AccessTrace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, a) in self.seq.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, "]")
    }
}

fn unexpected(whole: &str, rest: &str) -> TraceParseError {
    let consumed = &whole[..whole.len() - rest.len()];
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.len() - consumed.rfind('\n').map(|i| i + 1).unwrap_or(0) + 1;
    let found = rest
        .split(|c: char| c.is_whitespace() || c == ',')
        .next()
        .unwrap_or_default()
        .to_string();
    TraceParseError::Unexpected {
        line,
        column,
        found,
    }
}

fn comment(input: &str) -> IResult<&str, ()> {
    value((), pair(char('#'), take_till(|c| c == '\n')))(input)
}

fn skip(input: &str) -> IResult<&str, ()> {
    value((), many0(alt((value((), multispace1), value((), char(',')), comment))))(input)
}

fn read_addr(input: &str) -> IResult<&str, Addr> {
    alt((
        map_res(preceded(tag_no_case("0x"), hex_digit1), |s| {
            usize::from_str_radix(s, 16).map(Addr::new)
        }),
        map_res(digit1, |s: &str| s.parse().map(Addr::new)),
    ))(input)
}

fn read_trace(input: &str) -> IResult<&str, Vec<Addr>> {
    preceded(skip, many0(terminated(read_addr, skip)))(input)
}
