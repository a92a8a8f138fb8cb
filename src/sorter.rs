//! External merge sort over tape devices.

use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::io::prelude::*;
use std::path::Path;

use crate::tape::{Tape, TapeError};
use crate::Cell;
use crate::Delays;

/// Sorting error.
#[derive(Debug)]
pub enum SortError {
    /// Temporary directory creation error.
    TempDir(io::Error),
    /// Common I/O error on run files or pass directories.
    Io(io::Error),
    /// A tape device operation failed.
    Tape(TapeError),
    /// The input tape has cells but no chunk window (memory budget below
    /// one cell per window); such a tape cannot be paged at all.
    DegenerateGeometry { size: usize },
}

impl Error for SortError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SortError::TempDir(err) => Some(err),
            SortError::Io(err) => Some(err),
            SortError::Tape(err) => Some(err),
            SortError::DegenerateGeometry { .. } => None,
        }
    }
}

impl fmt::Display for SortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortError::TempDir(err) => write!(f, "temporary directory not created: {}", err),
            SortError::Io(err) => write!(f, "I/O operation failed: {}", err),
            SortError::Tape(err) => write!(f, "tape operation failed: {}", err),
            SortError::DegenerateGeometry { size } => write!(
                f,
                "tape of {} cells has no chunk window; increase the memory budget",
                size
            ),
        }
    }
}

impl From<TapeError> for SortError {
    fn from(err: TapeError) -> Self {
        SortError::Tape(err)
    }
}

impl From<io::Error> for SortError {
    fn from(err: io::Error) -> Self {
        SortError::Io(err)
    }
}

/// Tape sorter builder. Provides methods for [`TapeSorter`] initialization.
#[derive(Clone, Default)]
pub struct TapeSorterBuilder {
    /// Directory to be used to store temporary run tapes.
    tmp_dir: Option<Box<Path>>,
}

impl TapeSorterBuilder {
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        TapeSorterBuilder::default()
    }

    /// Sets directory to be used to store temporary run tapes. Each sort
    /// creates one unique root inside it, so parallel invocations do not
    /// collide.
    pub fn with_tmp_dir(mut self, path: &Path) -> TapeSorterBuilder {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Builds a [`TapeSorter`] instance using the provided configuration.
    pub fn build(self) -> TapeSorter {
        return TapeSorter {
            tmp_dir: self.tmp_dir,
        };
    }
}

/// External merge sorter for tapes.
///
/// Splits the input tape into per-chunk sorted runs, then merges run pairs
/// in ceiling-halving passes until the final pair is merged into the output
/// tape. Every cell moved goes through the tape device primitives, so the
/// whole sort is charged tape latencies; nothing bypasses the accounting.
pub struct TapeSorter {
    /// Parent directory for per-sort temporary roots.
    tmp_dir: Option<Box<Path>>,
}

impl TapeSorter {
    /// Sorts `input` into a new tape created at `output_path`.
    ///
    /// The output tape inherits the input's delay profile and chunk width.
    /// The input tape is consumed chunk by chunk and is left wound to its
    /// end; the backing file is not modified.
    pub fn sort(&self, input: &mut Tape, output_path: &Path) -> Result<Tape, SortError> {
        let delays = input.delays();

        if input.size() == 0 {
            log::debug!("empty input, producing an empty output tape");
            return Ok(Tape::create(output_path, 0, 0, delays)?);
        }
        let chunks_number = input.chunks_number();
        if chunks_number == 0 {
            return Err(SortError::DegenerateGeometry { size: input.size() });
        }

        let root = self.init_tmp_root()?;
        let width = input.max_chunk_size();

        let runs = self.split(input, root.path(), width)?;

        let output = if chunks_number == 1 {
            let mut only = runs;
            let run = only.swap_remove(0);
            run.copy_to(output_path)?
        } else {
            let mut runs = runs;
            let mut pass = 1usize;
            while runs.len() != 2 {
                runs = self.assemble_pass(root.path(), pass, runs, delays)?;
                let prev = root.path().join((pass - 1).to_string());
                fs::remove_dir_all(&prev)?;
                log::debug!("merge pass {}: {} runs remain", pass, runs.len());
                pass += 1;
            }
            let mut second = runs.swap_remove(1);
            let mut first = runs.swap_remove(0);
            merge(&mut first, &mut second, output_path, delays)?
        };

        log::debug!("sort finished, output at {}", output_path.display());
        // dropping the root removes the temp tree
        Ok(output)
    }

    fn init_tmp_root(&self) -> Result<tempfile::TempDir, SortError> {
        let root = if let Some(tmp_dir) = &self.tmp_dir {
            tempfile::tempdir_in(tmp_dir)
        } else {
            tempfile::tempdir()
        }
        .map_err(SortError::TempDir)?;

        log::info!("using {} as a temporary directory", root.path().display());

        return Ok(root);
    }

    /// Split pass: one sorted run per input chunk, written under
    /// `<root>/0/`. Every run is built with the input's chunk width so
    /// all runs in all passes share one geometry.
    fn split(&self, input: &mut Tape, root: &Path, width: usize) -> Result<Vec<Tape>, SortError> {
        let dir = root.join("0");
        fs::create_dir_all(&dir)?;

        let chunks_number = input.chunks_number();
        let mut runs = Vec::with_capacity(chunks_number);
        for i in 0..chunks_number {
            runs.push(make_split_run(input, &dir, i, width)?);
        }

        log::debug!("split {} cells into {} sorted runs", input.size(), runs.len());
        Ok(runs)
    }

    /// One merge pass: adjacent run pairs are merged under
    /// `<root>/<pass>/`; an unpaired trailing run is re-parented into the
    /// new pass directory so the next pass sees a uniform run list.
    fn assemble_pass(
        &self,
        root: &Path,
        pass: usize,
        runs: Vec<Tape>,
        delays: Delays,
    ) -> Result<Vec<Tape>, SortError> {
        let dir = root.join(pass.to_string());
        fs::create_dir_all(&dir)?;

        let mut next = Vec::with_capacity((runs.len() + 1) / 2);
        let mut pairs = runs.into_iter();
        let mut i = 0usize;
        loop {
            match (pairs.next(), pairs.next()) {
                (Some(mut first), Some(mut second)) => {
                    let path = dir.join(format!("{}.txt", i));
                    next.push(merge(&mut first, &mut second, &path, delays)?);
                }
                (Some(unpaired), None) => {
                    let path = dir.join(format!("{}.txt", i));
                    next.push(unpaired.into_renamed(&path)?);
                }
                (None, _) => break,
            }
            i += 1;
        }
        Ok(next)
    }
}

/// Reads the next chunk of the input, sorts it in memory and writes it out
/// as run `<i>.txt`. The run tape is declared with the shared chunk width.
fn make_split_run(input: &mut Tape, dir: &Path, i: usize, width: usize) -> Result<Tape, SortError> {
    input.read_chunk_right()?;
    let mut buffer: Vec<Cell> = input.chunk_cells().to_vec();
    buffer.sort_unstable();

    let path = dir.join(format!("{}.txt", i));
    let file = fs::File::create(&path)?;
    let mut sink = io::BufWriter::new(file);
    for cell in &buffer {
        write!(sink, "{} ", cell)?;
    }
    sink.flush()?;

    return Ok(Tape::with_chunk_width(&path, buffer.len(), width, input.delays())?);
}

/// Merges two sorted runs into a new run tape at `path`.
///
/// The result inherits the first run's chunk width (both runs share it by
/// construction) and is assembled chunk by chunk: all full chunks first,
/// then the final possibly shorter one. Afterwards both inputs' resident
/// chunks are released and the result is rewound so the next pass reads it
/// from the first cell.
fn merge(first: &mut Tape, second: &mut Tape, path: &Path, delays: Delays) -> Result<Tape, SortError> {
    let mut result = Tape::create(
        path,
        first.size() + second.size(),
        first.max_chunk_size(),
        delays,
    )?;
    let full_chunks = result.chunks_number() - 1;
    let full_size = result.max_chunk_size();
    let last_size = result.min_chunk_size();

    let mut ends = (false, false);
    for _ in 0..full_chunks {
        ends = merge_one_chunk(&mut result, first, second, ends, full_size)?;
    }
    merge_one_chunk(&mut result, first, second, ends, last_size)?;

    first.clear_chunk();
    second.clear_chunk();
    result.rewind()?;
    Ok(result)
}

/// Assembles one output chunk of `size` cells from the two runs and writes
/// it to the result tape cell by cell.
///
/// While both runs have cells left, the smaller current cell is taken and
/// that run advances; on equal cells the second run is taken. When a run
/// exhausts mid-chunk the rest of the chunk is drained from the survivor.
fn merge_one_chunk(
    result: &mut Tape,
    first: &mut Tape,
    second: &mut Tape,
    (mut first_end, mut second_end): (bool, bool),
    size: usize,
) -> Result<(bool, bool), SortError> {
    let mut buffer: Vec<Cell> = Vec::with_capacity(size);

    if first_end && !second_end {
        drain_into(second, &mut buffer, size)?;
    } else if second_end && !first_end {
        drain_into(first, &mut buffer, size)?;
    } else {
        while buffer.len() != size {
            while buffer.len() != size {
                if first.read_cell()? < second.read_cell()? {
                    if take_into(first, &mut buffer, &mut first_end)? {
                        break;
                    }
                } else if take_into(second, &mut buffer, &mut second_end)? {
                    break;
                }
            }
            if buffer.len() != size {
                if !first_end && second_end {
                    drain_into(first, &mut buffer, size)?;
                } else if first_end && !second_end {
                    drain_into(second, &mut buffer, size)?;
                }
            }
        }
    }

    for value in buffer {
        result.write_cell(value)?;
        result.move_left()?;
    }

    Ok((first_end, second_end))
}

/// Appends the current cell of `tape` to the buffer and advances the tape.
/// Returns true when the tape just exhausted (the chunk loop must stop
/// comparing and drain the other run).
fn take_into(tape: &mut Tape, buffer: &mut Vec<Cell>, end: &mut bool) -> Result<bool, SortError> {
    buffer.push(tape.read_cell()?);
    if tape.move_left()? {
        return Ok(false);
    }
    *end = true;
    Ok(true)
}

/// Drains cells from `tape` until the buffer holds `size` cells or the
/// tape exhausts.
fn drain_into(tape: &mut Tape, buffer: &mut Vec<Cell>, size: usize) -> Result<(), SortError> {
    buffer.push(tape.read_cell()?);
    while tape.move_left()? && buffer.len() != size {
        buffer.push(tape.read_cell()?);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::path::PathBuf;

    use rstest::*;

    use crate::delays::Delays;
    use crate::tape::Tape;
    use crate::Cell;

    use super::{merge, SortError, TapeSorterBuilder};

    #[fixture]
    fn tmp_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn write_cells(path: &PathBuf, cells: &[Cell]) {
        let mut contents = String::new();
        for cell in cells {
            contents.push_str(&cell.to_string());
            contents.push(' ');
        }
        fs::write(path, contents).unwrap();
    }

    fn read_cells(path: &PathBuf) -> Vec<Cell> {
        fs::read_to_string(path)
            .unwrap()
            .split_whitespace()
            .map(|token| token.parse().unwrap())
            .collect()
    }

    #[rstest]
    fn test_merge_two_runs(tmp_dir: tempfile::TempDir) {
        let first_path = tmp_dir.path().join("a.txt");
        let second_path = tmp_dir.path().join("b.txt");
        write_cells(&first_path, &[1, 3, 5, 7]);
        write_cells(&second_path, &[2, 3, 4]);

        let mut first = Tape::with_chunk_width(&first_path, 4, 4, Delays::zero()).unwrap();
        let mut second = Tape::with_chunk_width(&second_path, 3, 4, Delays::zero()).unwrap();

        let out_path = tmp_dir.path().join("merged.txt");
        let merged = merge(&mut first, &mut second, &out_path, Delays::zero()).unwrap();

        assert_eq!(merged.size(), 7);
        assert_eq!(read_cells(&out_path), vec![1, 2, 3, 3, 4, 5, 7]);
    }

    #[rstest]
    fn test_merge_result_readable_from_start(tmp_dir: tempfile::TempDir) {
        let first_path = tmp_dir.path().join("a.txt");
        let second_path = tmp_dir.path().join("b.txt");
        write_cells(&first_path, &[10, 20]);
        write_cells(&second_path, &[15, 25]);

        let mut first = Tape::with_chunk_width(&first_path, 2, 2, Delays::zero()).unwrap();
        let mut second = Tape::with_chunk_width(&second_path, 2, 2, Delays::zero()).unwrap();

        let out_path = tmp_dir.path().join("merged.txt");
        let mut merged = merge(&mut first, &mut second, &out_path, Delays::zero()).unwrap();

        assert_eq!(merged.read_cell().unwrap(), 10);
    }

    #[rstest]
    #[case(256)]
    #[case(64)]
    fn test_sort_small_tape(tmp_dir: tempfile::TempDir, #[case] memory: usize) {
        let input_path = tmp_dir.path().join("in.txt");
        let output_path = tmp_dir.path().join("out.txt");
        let cells = vec![9, 2, 7, 2, -5, 0, 11, 4, 3, 1];
        write_cells(&input_path, &cells);

        let mut input = Tape::open(&input_path, cells.len(), memory, Delays::zero()).unwrap();
        let sorter = TapeSorterBuilder::new().with_tmp_dir(tmp_dir.path()).build();
        sorter.sort(&mut input, &output_path).unwrap();

        let mut expected = cells;
        expected.sort_unstable();
        assert_eq!(read_cells(&output_path), expected);
    }

    #[rstest]
    fn test_sort_empty_tape(tmp_dir: tempfile::TempDir) {
        let input_path = tmp_dir.path().join("in.txt");
        let output_path = tmp_dir.path().join("out.txt");
        fs::write(&input_path, "").unwrap();

        let mut input = Tape::open(&input_path, 0, 256, Delays::zero()).unwrap();
        let sorter = TapeSorterBuilder::new().with_tmp_dir(tmp_dir.path()).build();
        sorter.sort(&mut input, &output_path).unwrap();

        assert_eq!(fs::read_to_string(&output_path).unwrap(), "");
    }

    #[rstest]
    fn test_sort_rejects_degenerate_geometry(tmp_dir: tempfile::TempDir) {
        let input_path = tmp_dir.path().join("in.txt");
        let output_path = tmp_dir.path().join("out.txt");
        write_cells(&input_path, &[3, 1, 2]);

        // memory below one cell per window
        let mut input = Tape::open(&input_path, 3, 0, Delays::zero()).unwrap();
        let sorter = TapeSorterBuilder::new().with_tmp_dir(tmp_dir.path()).build();

        match sorter.sort(&mut input, &output_path) {
            Err(SortError::DegenerateGeometry { size }) => assert_eq!(size, 3),
            other => panic!("expected geometry error, got {:?}", other.map(|_| ())),
        }
    }

    #[rstest]
    fn test_sort_leaves_no_temp_residue(tmp_dir: tempfile::TempDir) {
        let input_path = tmp_dir.path().join("in.txt");
        let output_path = tmp_dir.path().join("out.txt");
        let cells: Vec<Cell> = (0..30).rev().collect();
        write_cells(&input_path, &cells);

        let tmp_parent = tmp_dir.path().join("work");
        fs::create_dir_all(&tmp_parent).unwrap();

        let mut input = Tape::open(&input_path, cells.len(), 64, Delays::zero()).unwrap();
        let sorter = TapeSorterBuilder::new().with_tmp_dir(&tmp_parent).build();
        sorter.sort(&mut input, &output_path).unwrap();

        assert_eq!(fs::read_dir(&tmp_parent).unwrap().count(), 0);
    }
}
