//! Token-level access to tape files.
//!
//! A tape file is whitespace-separated ASCII decimal integers, optionally
//! terminated by a trailing space and/or newline. [`TokenReader`] tolerates
//! any whitespace between tokens; writers elsewhere in the crate emit each
//! cell followed by a single space.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use crate::Cell;

/// Error raised while scanning cells out of a tape file.
#[derive(Debug)]
pub enum TokenError {
    /// Underlying I/O failure.
    Io(io::Error),
    /// A token that does not parse as a cell value.
    Parse(String),
}

impl Error for TokenError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TokenError::Io(err) => Some(err),
            TokenError::Parse(_) => None,
        }
    }
}

impl fmt::Display for TokenError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenError::Io(err) => write!(f, "I/O operation failed: {}", err),
            TokenError::Parse(token) => write!(f, "not an integer cell: {:?}", token),
        }
    }
}

impl From<io::Error> for TokenError {
    fn from(err: io::Error) -> Self {
        TokenError::Io(err)
    }
}

/// Buffered forward scanner over a tape file.
///
/// The reader keeps its position between calls, which is what makes
/// sequential chunk loads cheap; [`TokenReader::rewind`] returns to the
/// start of the medium.
pub struct TokenReader {
    inner: io::BufReader<fs::File>,
}

impl TokenReader {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = fs::File::open(path)?;
        Ok(TokenReader {
            inner: io::BufReader::new(file),
        })
    }

    pub fn rewind(&mut self) -> io::Result<()> {
        self.inner.rewind()
    }

    /// Reads the next cell. Returns `None` at end of file.
    pub fn read_cell(&mut self) -> Result<Option<Cell>, TokenError> {
        let mut token = Vec::new();
        loop {
            match self.next_byte()? {
                None if token.is_empty() => return Ok(None),
                None => break,
                Some(b) if b.is_ascii_whitespace() => {
                    if !token.is_empty() {
                        break;
                    }
                }
                Some(b) => token.push(b),
            }
        }

        let token = String::from_utf8_lossy(&token).into_owned();
        match token.parse::<Cell>() {
            Ok(cell) => Ok(Some(cell)),
            Err(_) => Err(TokenError::Parse(token)),
        }
    }

    /// Consumes `count` cells, validating each token.
    pub fn skip_cells(&mut self, count: usize) -> Result<(), TokenError> {
        for _ in 0..count {
            self.read_cell()?;
        }
        Ok(())
    }

    fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let buf = self.inner.fill_buf()?;
        if buf.is_empty() {
            return Ok(None);
        }
        let byte = buf[0];
        self.inner.consume(1);
        Ok(Some(byte))
    }
}
