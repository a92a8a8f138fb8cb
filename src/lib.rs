//! `tape-sort` is an external merge sort over simulated tape devices.
//!
//! A tape is a linear file of integer cells with a single read/write head;
//! the device exposes only four primitives (read the cell under the head,
//! write it, shift the medium one cell left or right), each charged an
//! artificial latency that models physical tape mechanics. Only one
//! fixed-size window of cells is ever resident in RAM per tape, so sorting
//! happens under a strict memory budget: the input is split into per-window
//! sorted runs, and runs are then pairwise-merged in passes until a single
//! sorted output tape remains.
//!
//! # Overview
//!
//! `tape-sort` provides:
//!
//! * **A tape device emulation:**
//!   [`Tape`] pages fixed-size windows ([`Chunk`]) of a text-file-backed
//!   cell sequence in and out, charging per-operation latencies from a
//!   [`Delays`] profile.
//! * **An external merge sort:**
//!   [`TapeSorter`] drives the split and merge passes using only the tape
//!   device primitives, so the whole sort is billed in tape time.
//! * **A sort job runner:**
//!   the `tape-sort` binary reads a key/value [`Config`] file and sorts
//!   one tape into another.
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use tape_sort::{Delays, Tape, TapeSorterBuilder};
//!
//! fn main() {
//!     let delays = Delays::from_millis(1, 1, 1);
//!     let mut input = Tape::open(Path::new("input.txt"), 1000, 1024, delays).unwrap();
//!
//!     let sorter = TapeSorterBuilder::new().with_tmp_dir(Path::new("./")).build();
//!     sorter.sort(&mut input, Path::new("output.txt")).unwrap();
//! }
//! ```

pub mod chunk;
pub mod config;
pub mod delays;
pub mod sorter;
pub mod stream;
pub mod tape;

/// One addressable integer on a tape.
pub type Cell = i32;

pub use chunk::Chunk;
pub use config::{Config, ConfigError};
pub use delays::{DelayKind, Delays};
pub use sorter::{SortError, TapeSorter, TapeSorterBuilder};
pub use stream::{TokenError, TokenReader};
pub use tape::{ChunksInfo, Tape, TapeError, MEMORY_DIVISOR};
