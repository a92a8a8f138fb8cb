//! Tape device emulation.
//!
//! A tape is an ordered sequence of cells persisted in a text file, with a
//! single read/write head. The head is stationary; the medium moves. Only
//! one fixed-size window of cells (the resident [`Chunk`]) is ever held in
//! RAM, so the tape honors its memory budget regardless of length.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::{Path, PathBuf};

use crate::chunk::Chunk;
use crate::delays::Delays;
use crate::stream::{TokenError, TokenReader};
use crate::Cell;

/// Fixed divisor K applied to the memory budget when deriving the chunk
/// width: `W = min(M / K, N)`.
pub const MEMORY_DIVISOR: usize = 16;

/// Tape error. Always fatal; the tape has no recovery story.
#[derive(Debug)]
pub enum TapeError {
    /// Backing or scratch file I/O failure.
    Io { path: PathBuf, source: io::Error },
    /// Non-integer token found while reading a cell.
    Format { path: PathBuf, token: String },
}

impl Error for TapeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TapeError::Io { source, .. } => Some(source),
            TapeError::Format { .. } => None,
        }
    }
}

impl fmt::Display for TapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TapeError::Io { path, source } => {
                write!(f, "tape file I/O failed: {}: {}", path.display(), source)
            }
            TapeError::Format { path, token } => {
                write!(f, "bad cell in tape file {}: {:?}", path.display(), token)
            }
        }
    }
}

/// Chunk geometry of a tape: how many windows cover it and how wide they
/// are. The widths of all chunks sum to the tape size; every chunk has the
/// maximum width except possibly the last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunksInfo {
    pub chunks_number: usize,
    pub max_chunk_size: usize,
    pub last_chunk_size: usize,
}

impl ChunksInfo {
    pub fn new(chunk_width: usize, tape_size: usize) -> Self {
        if chunk_width == 0 || tape_size == 0 {
            return ChunksInfo {
                chunks_number: 0,
                max_chunk_size: 0,
                last_chunk_size: 0,
            };
        }
        ChunksInfo {
            chunks_number: (tape_size - 1) / chunk_width + 1,
            max_chunk_size: chunk_width,
            last_chunk_size: if tape_size % chunk_width == 0 {
                chunk_width
            } else {
                tape_size % chunk_width
            },
        }
    }
}

/// A tape device backed by a text file.
///
/// The tape is a state machine over its resident chunk: it starts unused
/// (no window materialized) and loads chunk 0 on the first access; head
/// motion across a window boundary swaps the resident chunk. Every device
/// primitive charges its latency through the tape's [`Delays`] profile.
///
/// A tape exclusively owns its backing file and is move-only; duplicating
/// one is explicit via [`Tape::copy_to`].
pub struct Tape {
    path: PathBuf,
    size: usize,
    delays: Delays,
    info: ChunksInfo,
    chunk: Chunk,
    reader: TokenReader,
    unused: bool,
}

impl Tape {
    /// Opens a tape over an existing file, deriving the chunk width from
    /// the memory budget: `W = min(memory / MEMORY_DIVISOR, size)`.
    pub fn open(path: &Path, size: usize, memory: usize, delays: Delays) -> Result<Self, TapeError> {
        let width = (memory / MEMORY_DIVISOR).min(size);
        Self::from_parts(path.to_path_buf(), size, ChunksInfo::new(width, size), delays)
    }

    /// Opens a tape over an existing file with an explicitly chosen chunk
    /// width. Used by the sorter for run tapes, whose geometry is dictated
    /// by the merge tree rather than by a memory budget.
    ///
    /// The width is kept as given even when it exceeds the tape size, so
    /// short run tapes still report the shared width; such a tape has a
    /// single chunk of `size` cells.
    pub fn with_chunk_width(
        path: &Path,
        size: usize,
        chunk_width: usize,
        delays: Delays,
    ) -> Result<Self, TapeError> {
        Self::from_parts(
            path.to_path_buf(),
            size,
            ChunksInfo::new(chunk_width, size),
            delays,
        )
    }

    /// Creates a tape of declared `size` over a fresh (empty) backing
    /// file, truncating any existing file at `path`. Cells not yet
    /// written read as zero.
    pub fn create(
        path: &Path,
        size: usize,
        chunk_width: usize,
        delays: Delays,
    ) -> Result<Self, TapeError> {
        fs::File::create(path).map_err(|source| TapeError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::with_chunk_width(path, size, chunk_width, delays)
    }

    fn from_parts(
        path: PathBuf,
        size: usize,
        info: ChunksInfo,
        delays: Delays,
    ) -> Result<Self, TapeError> {
        let reader = TokenReader::open(&path).map_err(|source| TapeError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(Tape {
            reader,
            chunk: Chunk::new(delays),
            path,
            size,
            delays,
            info,
            unused: true,
        })
    }

    /// Duplicates this tape's backing file to `new_path` and returns a
    /// fresh (unused) tape with the same geometry over the copy.
    pub fn copy_to(&self, new_path: &Path) -> Result<Tape, TapeError> {
        fs::copy(&self.path, new_path).map_err(|source| TapeError::Io {
            path: new_path.to_path_buf(),
            source,
        })?;
        Self::from_parts(new_path.to_path_buf(), self.size, self.info, self.delays)
    }

    /// Re-parents the backing file to `new_path` (no byte copy) and
    /// returns a fresh (unused) tape over it.
    pub fn into_renamed(self, new_path: &Path) -> Result<Tape, TapeError> {
        let Tape {
            path: old_path,
            size,
            delays,
            info,
            reader,
            ..
        } = self;
        drop(reader);
        fs::rename(&old_path, new_path).map_err(|source| TapeError::Io {
            path: new_path.to_path_buf(),
            source,
        })?;
        Self::from_parts(new_path.to_path_buf(), size, info, delays)
    }

    /// Returns the cell under the head, charging one read. Forces the
    /// first-access initialization on an unused tape.
    ///
    /// Undefined on an empty tape (aborts); callers must guard.
    pub fn read_cell(&mut self) -> Result<Cell, TapeError> {
        if self.init_first_chunk()? {
            self.chunk.move_to_left_edge();
        }
        Ok(self.chunk.current())
    }

    /// Replaces the cell under the head with `value`.
    ///
    /// The on-disk representation is variable-width text, so a single-cell
    /// update cannot seek-and-overwrite; the whole file is rewritten
    /// through a scratch file in a private temporary directory, with the
    /// head's chunk re-emitted with `value` substituted. Chunk loads in
    /// both rewrite passes charge shift+read per cell and the substitution
    /// charges one write; afterwards the head and chunk index are restored
    /// to their pre-call values by re-shifting, so those shifts are
    /// charged faithfully too.
    pub fn write_cell(&mut self, value: Cell) -> Result<(), TapeError> {
        let head = self.chunk.head();
        let index = self.chunk.index();
        if self.init_first_chunk()? {
            self.chunk.step_toward_left_edge();
        }

        let scratch_dir = tempfile::tempdir().map_err(|source| TapeError::Io {
            path: self.path.clone(),
            source,
        })?;
        let scratch_path = scratch_dir.path().join("rewrite.txt");

        // Pass 1: backing -> scratch, substituting at the head.
        self.reader.rewind().map_err(|e| self.io_error(e))?;
        {
            let file = fs::File::create(&scratch_path).map_err(|e| self.io_error(e))?;
            let mut sink = io::BufWriter::new(file);
            for i in 0..self.info.chunks_number {
                let width = self.width_of(i);
                if let Err(err) = self.chunk.load(&mut self.reader, i, width) {
                    return Err(self.cell_error(err));
                }
                if i == index {
                    self.chunk.write_at(value, head);
                }
                self.chunk.emit(&mut sink).map_err(|e| self.io_error(e))?;
            }
            sink.flush().map_err(|e| self.io_error(e))?;
        }

        // Pass 2: scratch -> backing, preserving chunk structure.
        {
            let mut source = TokenReader::open(&scratch_path).map_err(|e| self.io_error(e))?;
            let file = fs::File::create(&self.path).map_err(|e| self.io_error(e))?;
            let mut sink = io::BufWriter::new(file);
            for i in 0..self.info.chunks_number {
                let width = self.width_of(i);
                if let Err(err) = self.chunk.load(&mut source, i, width) {
                    return Err(self.cell_error(err));
                }
                self.chunk.emit(&mut sink).map_err(|e| self.io_error(e))?;
            }
            sink.flush().map_err(|e| self.io_error(e))?;
        }
        drop(scratch_dir);

        self.reader = TokenReader::open(&self.path).map_err(|e| self.io_error(e))?;
        while !self.chunk.matches(head, index) {
            self.move_right()?;
        }
        Ok(())
    }

    /// Shifts the medium one cell right, so the head refers to what was
    /// the cell to its left. Reloads the previous chunk when the head
    /// crosses the window boundary. Returns `Ok(false)` at the global
    /// leftmost cell; that refusal is the normal end-of-tape signal.
    pub fn move_right(&mut self) -> Result<bool, TapeError> {
        if self.init_first_chunk()? {
            self.chunk.move_to_left_edge();
        }
        if !self.chunk.can_step_right() {
            return Ok(false);
        }
        if !self.chunk.step_toward_left_edge() {
            self.read_chunk_left()?;
        }
        Ok(true)
    }

    /// Shifts the medium one cell left. Symmetric to [`Tape::move_right`];
    /// returns `Ok(false)` at the global rightmost cell.
    pub fn move_left(&mut self) -> Result<bool, TapeError> {
        if self.init_first_chunk()? {
            self.chunk.move_to_left_edge();
        }
        if !self.chunk.can_step_left(self.info.chunks_number) {
            return Ok(false);
        }
        if !self.chunk.step_toward_right_edge() {
            self.read_chunk_right()?;
        }
        Ok(true)
    }

    /// Advances the resident window to the next chunk and places the head
    /// at its left edge. On an unused tape this materializes chunk 0
    /// instead. Used by the sorter's split pass to walk the input
    /// chunk by chunk.
    pub fn read_chunk_right(&mut self) -> Result<(), TapeError> {
        if self.init_first_chunk()? {
            return Ok(());
        }
        let next = self.chunk.index() + 1;
        let width = self.width_of(next);
        if let Err(err) = self.chunk.load(&mut self.reader, next, width) {
            return Err(self.cell_error(err));
        }
        self.chunk.move_to_left_edge();
        Ok(())
    }

    /// Reloads the previous chunk and places the head at its right edge.
    /// The reader is rewound and skipped forward, which also restores the
    /// sequential-read position to just past the reloaded chunk.
    fn read_chunk_left(&mut self) -> Result<(), TapeError> {
        let prev = self.chunk.index() - 1;
        self.reader.rewind().map_err(|e| self.io_error(e))?;
        if let Err(err) = self.reader.skip_cells(prev * self.info.max_chunk_size) {
            return Err(self.cell_error(err));
        }
        if let Err(err) = self.chunk.load(&mut self.reader, prev, self.info.max_chunk_size) {
            return Err(self.cell_error(err));
        }
        self.chunk.move_to_right_edge();
        Ok(())
    }

    /// Snapshot of the resident chunk's cells. No latency charged.
    pub fn chunk_cells(&self) -> &[Cell] {
        self.chunk.cells()
    }

    /// Releases the resident window.
    pub fn clear_chunk(&mut self) {
        self.chunk.clear();
    }

    /// Returns the tape to the unused state with the reader at the start
    /// of the medium; the next access materializes chunk 0 again.
    pub fn rewind(&mut self) -> Result<(), TapeError> {
        self.reader.rewind().map_err(|e| self.io_error(e))?;
        self.chunk.clear();
        self.unused = true;
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn chunks_number(&self) -> usize {
        self.info.chunks_number
    }

    pub fn max_chunk_size(&self) -> usize {
        self.info.max_chunk_size
    }

    pub fn min_chunk_size(&self) -> usize {
        self.info.last_chunk_size
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delays(&self) -> Delays {
        self.delays
    }

    fn init_first_chunk(&mut self) -> Result<bool, TapeError> {
        if !self.unused {
            return Ok(false);
        }
        // chunk 0 is the last chunk too on a tape shorter than its width
        let width = self.width_of(0);
        if let Err(err) = self.chunk.load(&mut self.reader, 0, width) {
            return Err(self.cell_error(err));
        }
        self.unused = false;
        Ok(true)
    }

    fn width_of(&self, index: usize) -> usize {
        if index + 1 == self.info.chunks_number {
            self.info.last_chunk_size
        } else {
            self.info.max_chunk_size
        }
    }

    fn io_error(&self, source: io::Error) -> TapeError {
        TapeError::Io {
            path: self.path.clone(),
            source,
        }
    }

    fn cell_error(&self, err: TokenError) -> TapeError {
        match err {
            TokenError::Io(source) => TapeError::Io {
                path: self.path.clone(),
                source,
            },
            TokenError::Parse(token) => TapeError::Format {
                path: self.path.clone(),
                token,
            },
        }
    }
}
