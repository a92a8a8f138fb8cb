//! RAM-resident window of a tape.

use std::io;
use std::io::prelude::*;

use crate::delays::{DelayKind, Delays};
use crate::stream::{TokenError, TokenReader};
use crate::Cell;

/// A bounded window of tape cells held in memory, with the head position
/// tracked as an offset inside the window.
///
/// The chunk is the only place cells ever live in RAM; the owning tape
/// swaps its contents as the head crosses window boundaries. Every
/// operation that models a physical action charges the matching latency.
pub struct Chunk {
    delays: Delays,
    index: usize,
    capacity: usize,
    head: usize,
    cells: Vec<Cell>,
}

impl Chunk {
    /// Creates an empty window. Nothing is addressable until [`Chunk::load`].
    pub fn new(delays: Delays) -> Self {
        Chunk {
            delays,
            index: 0,
            capacity: 0,
            head: 0,
            cells: Vec::new(),
        }
    }

    /// Reads a window of `new_capacity` cells from `source`, charging one
    /// shift and one read per cell (the head traverses cells while reading).
    ///
    /// The head lands on the rightmost cell when the window was entered
    /// from the left (`new_index >= old_index`) and on the leftmost cell
    /// otherwise, so that continued motion in the original direction
    /// advances into the newly loaded region. Cells missing from the
    /// source (end of file) read as zero.
    pub fn load(
        &mut self,
        source: &mut TokenReader,
        new_index: usize,
        new_capacity: usize,
    ) -> Result<(), TokenError> {
        self.head = if new_index >= self.index {
            new_capacity.saturating_sub(1)
        } else {
            0
        };
        self.index = new_index;
        self.capacity = new_capacity;

        self.cells.clear();
        self.cells.reserve(new_capacity);
        for _ in 0..new_capacity {
            self.delays.sleep_for(DelayKind::Shift);
            self.delays.sleep_for(DelayKind::Read);
            self.cells.push(source.read_cell()?.unwrap_or(0));
        }
        Ok(())
    }

    /// Stores `value` at offset `pos`, charging one write.
    ///
    /// `pos` must be inside the window; violating that is a programmer
    /// error and aborts.
    pub fn write_at(&mut self, value: Cell, pos: usize) {
        self.delays.sleep_for(DelayKind::Write);
        self.cells[pos] = value;
    }

    /// Writes the window's cells to `sink`, each followed by a single
    /// space. Bookkeeping only; no latency charged.
    pub fn emit<W: Write>(&self, sink: &mut W) -> io::Result<()> {
        for cell in &self.cells {
            write!(sink, "{} ", cell)?;
        }
        Ok(())
    }

    /// Returns the cell under the head, charging one read.
    pub fn current(&self) -> Cell {
        self.delays.sleep_for(DelayKind::Read);
        self.cells[self.head]
    }

    /// Whether the medium may move right, i.e. the head is not at the
    /// global leftmost cell of the owning tape.
    pub fn can_step_right(&self) -> bool {
        !(self.index == 0 && self.head == 0)
    }

    /// Whether the medium may move left, i.e. the head is not at the
    /// global rightmost cell of the owning tape.
    pub fn can_step_left(&self, chunks_number: usize) -> bool {
        !(self.index + 1 == chunks_number && self.head + 1 == self.capacity)
    }

    /// Moves the head one cell toward the left edge of the window,
    /// charging one shift. Returns false at the edge.
    pub fn step_toward_left_edge(&mut self) -> bool {
        if self.head == 0 {
            return false;
        }
        self.delays.sleep_for(DelayKind::Shift);
        self.head -= 1;
        true
    }

    /// Moves the head one cell toward the right edge of the window,
    /// charging one shift. Returns false at the edge.
    pub fn step_toward_right_edge(&mut self) -> bool {
        if self.head + 1 >= self.capacity {
            return false;
        }
        self.delays.sleep_for(DelayKind::Shift);
        self.head += 1;
        true
    }

    /// Shifts until the head is on the leftmost cell of the window, one
    /// shift charged per cell traversed.
    pub fn move_to_left_edge(&mut self) {
        while self.step_toward_left_edge() {}
    }

    /// Shifts until the head is on the rightmost cell of the window, one
    /// shift charged per cell traversed.
    pub fn move_to_right_edge(&mut self) {
        while self.step_toward_right_edge() {}
    }

    /// Structural equality of the head position, used to restore state
    /// after a rewrite cycle.
    pub fn matches(&self, head: usize, index: usize) -> bool {
        self.head == head && self.index == index
    }

    /// Drops the window contents.
    pub fn clear(&mut self) {
        self.index = 0;
        self.capacity = 0;
        self.head = 0;
        self.cells.clear();
    }

    pub fn head(&self) -> usize {
        self.head
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
}
