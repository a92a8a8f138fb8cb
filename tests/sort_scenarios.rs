//! End-to-end sort scenarios: whole tapes sorted through the device
//! primitives, outputs checked against exact file contents.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use rand::seq::SliceRandom;
use rstest::*;

use tape_sort::{Cell, Delays, Tape, TapeSorterBuilder};

#[fixture]
fn tmp_dir() -> tempfile::TempDir {
    tempfile::tempdir().unwrap()
}

fn write_tape(dir: &tempfile::TempDir, name: &str, contents: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

fn sort_tape(
    dir: &tempfile::TempDir,
    input_path: &PathBuf,
    size: usize,
    memory: usize,
    delays: Delays,
) -> String {
    let output_path = dir.path().join("out.txt");
    let mut input = Tape::open(input_path, size, memory, delays).unwrap();
    let sorter = TapeSorterBuilder::new().with_tmp_dir(dir.path()).build();
    sorter.sort(&mut input, &output_path).unwrap();
    fs::read_to_string(&output_path).unwrap()
}

#[rstest]
fn test_empty_tape(tmp_dir: tempfile::TempDir) {
    let input = write_tape(&tmp_dir, "in.txt", "");
    let output = sort_tape(&tmp_dir, &input, 0, 256, Delays::zero());
    assert_eq!(output, "");
}

#[rstest]
fn test_singleton_tape(tmp_dir: tempfile::TempDir) {
    let input = write_tape(&tmp_dir, "in.txt", "14524647");
    let output = sort_tape(&tmp_dir, &input, 1, 256, Delays::zero());
    assert_eq!(output, "14524647 ");
}

#[rstest]
#[case(256)] // two chunks, direct final merge
#[case(64)] // five chunks, several merge passes with odd carries
fn test_small_tape_with_duplicates(tmp_dir: tempfile::TempDir, #[case] memory: usize) {
    let input = write_tape(
        &tmp_dir,
        "in.txt",
        "33 11 5 22 44 22 55 66 77 88 99 111 122 144 5 148 155 12345 54 92",
    );
    let output = sort_tape(&tmp_dir, &input, 20, memory, Delays::zero());
    assert_eq!(
        output,
        "5 5 11 22 22 33 44 54 55 66 77 88 92 99 111 122 144 148 155 12345 "
    );
}

#[rstest]
fn test_negatives_and_wide_range(tmp_dir: tempfile::TempDir) {
    let mut cells: Vec<Cell> = vec![
        -21435246, -6374869, -675162, -76854, -48130, -9876, -6254, 0, 6, 865, 34578, 56342,
        84613, 87645, 235646, 314526, 358128, 3481364, 5343127, 5463276, 7231462, 8125637,
        8745637, 56142738, 61432576, 659298456,
    ];
    cells.shuffle(&mut rand::thread_rng());
    let contents: String = cells.iter().map(|cell| format!("{} ", cell)).collect();

    let input = write_tape(&tmp_dir, "in.txt", &contents);
    let output = sort_tape(&tmp_dir, &input, cells.len(), 1024, Delays::zero());

    assert_eq!(
        output,
        "-21435246 -6374869 -675162 -76854 -48130 -9876 -6254 0 6 865 34578 56342 84613 87645 \
         235646 314526 358128 3481364 5343127 5463276 7231462 8125637 8745637 56142738 61432576 \
         659298456 "
    );
}

#[rstest]
fn test_sorted_input_is_unchanged(tmp_dir: tempfile::TempDir) {
    let contents = "1 2 3 4 5 6 7 8 9 10 11 12 ";
    let input = write_tape(&tmp_dir, "in.txt", contents);
    let output = sort_tape(&tmp_dir, &input, 12, 64, Delays::zero());
    assert_eq!(output, contents);
}

#[rstest]
fn test_multiset_preserved_on_random_tape(tmp_dir: tempfile::TempDir) {
    let mut cells: Vec<Cell> = (0..100).map(|i| i % 17 - 8).collect();
    cells.shuffle(&mut rand::thread_rng());
    let contents: String = cells.iter().map(|cell| format!("{} ", cell)).collect();

    // memory 128 -> window of 8 cells -> 13 runs, odd carries in every pass
    let input = write_tape(&tmp_dir, "in.txt", &contents);
    let output = sort_tape(&tmp_dir, &input, cells.len(), 128, Delays::zero());

    let sorted: Vec<Cell> = output
        .split_whitespace()
        .map(|token| token.parse().unwrap())
        .collect();
    let mut expected = cells;
    expected.sort_unstable();
    assert_eq!(sorted, expected);
}

#[rstest]
fn test_zero_latencies_complete_quickly(tmp_dir: tempfile::TempDir) {
    let cells: Vec<Cell> = (0..200).rev().collect();
    let contents: String = cells.iter().map(|cell| format!("{} ", cell)).collect();
    let input = write_tape(&tmp_dir, "in.txt", &contents);

    let started = Instant::now();
    sort_tape(&tmp_dir, &input, cells.len(), 256, Delays::zero());

    assert!(started.elapsed() < Duration::from_secs(30));
}

#[rstest]
fn test_latency_lower_bound(tmp_dir: tempfile::TempDir) {
    let input = write_tape(&tmp_dir, "in.txt", "4 3 2 1 ");

    // single window of four cells: loading it alone charges four reads
    let delays = Delays::from_millis(5, 0, 0);
    let started = Instant::now();
    let output = sort_tape(&tmp_dir, &input, 4, 256, delays);

    assert!(started.elapsed() >= Duration::from_millis(20));
    assert_eq!(output, "1 2 3 4 ");
}
