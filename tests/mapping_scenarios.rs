//! Black-box scenarios for `bedmap`, run against the built binary.
//!
//! Mirrors the teacher's `tests/comprehensive_flags.rs` pattern: spawn the
//! binary via `cargo run`, write fixtures with `tempfile`, assert on exact
//! stdout.

use std::io::Write;
use std::process::{Command, Output};

use tempfile::NamedTempFile;

fn bed_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{content}").unwrap();
    file.flush().unwrap();
    file
}

fn run_bedmap(args: &[&str]) -> Output {
    Command::new("cargo")
        .args(["run", "--quiet", "--bin", "bedmap", "--"])
        .args(args)
        .output()
        .expect("failed to run bedmap")
}

fn stdout_lines(output: &Output) -> Vec<String> {
    assert!(output.status.success(), "bedmap failed: {}", String::from_utf8_lossy(&output.stderr));
    String::from_utf8(output.stdout.clone()).unwrap().lines().map(String::from).collect()
}

#[test]
fn scenario_1_bp_overlap_count() {
    let reference = bed_file("chr1\t10\t20\nchr1\t100\t110\n");
    let map = bed_file("chr1\t5\t12\nchr1\t15\t25\nchr1\t109\t111\n");

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--bp-ovr",
        "1",
        "--count",
    ]);
    assert_eq!(stdout_lines(&output), vec!["2", "1"]);
}

#[test]
fn scenario_2_fraction_both_excludes_partial_nesting() {
    let reference = bed_file("chr1\t0\t100\n");
    let map = bed_file("chr1\t10\t20\nchr1\t50\t60\n");

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--fraction-both",
        "0.5",
        "--count",
    ]);
    assert_eq!(stdout_lines(&output), vec!["0"]);
}

#[test]
fn scenario_3_echo_and_echo_map_id_in_flag_order() {
    let reference = bed_file("chr1\t0\t100\n");
    let map = bed_file("chr1\t10\t15\tm1\nchr1\t20\t30\tm2\n");

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--echo",
        "--echo-map-id",
    ]);
    assert_eq!(stdout_lines(&output), vec!["chr1\t0\t100|m1;m2"]);
}

#[test]
fn scenario_6_exact_predicate_echo_map_id() {
    let reference = bed_file("chr1\t100\t200\n");
    let map = bed_file("chr1\t100\t200\tfoo\nchr1\t100\t200\tbar\nchr1\t100\t201\tbaz\n");

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--exact",
        "--echo-map-id",
    ]);
    assert_eq!(stdout_lines(&output), vec!["foo;bar"]);
}

#[test]
fn empty_map_file_still_emits_one_line_per_reference() {
    let reference = bed_file("chr1\t0\t10\nchr1\t20\t30\n");
    let map = bed_file("");

    let output = run_bedmap(&[reference.path().to_str().unwrap(), map.path().to_str().unwrap(), "--count"]);
    assert_eq!(stdout_lines(&output), vec!["0", "0"]);
}

fn scored_map_fixture() -> NamedTempFile {
    bed_file("chr1\t10\t20\tm1\t10\nchr1\t20\t30\tm2\t20\nchr1\t30\t40\tm3\t30\nchr1\t40\t50\tm4\t40\n")
}

#[test]
fn kth_flag_takes_its_own_value() {
    let reference = bed_file("chr1\t0\t100\n");
    let map = scored_map_fixture();

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--kth",
        "0.5",
    ]);
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let value: f64 = lines[0].parse().unwrap();
    assert!((value - 30.0).abs() < 1e-9, "expected the median-ranked score, got {}", lines[0]);
}

#[test]
fn tmean_flag_takes_two_values() {
    let reference = bed_file("chr1\t0\t100\n");
    let map = scored_map_fixture();

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--tmean",
        "0.25",
        "0.25",
    ]);
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let value: f64 = lines[0].parse().unwrap();
    assert!((value - 25.0).abs() < 1e-9, "expected the trimmed mean with the outer quarters dropped, got {}", lines[0]);
}

#[test]
fn mad_flag_takes_an_optional_multiplier() {
    let reference = bed_file("chr1\t0\t100\n");
    let map = scored_map_fixture();

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--mad",
        "2.0",
    ]);
    let lines = stdout_lines(&output);
    assert_eq!(lines.len(), 1);
    let value: f64 = lines[0].parse().unwrap();
    assert!((value - 20.0).abs() < 1e-9, "expected 2x the median absolute deviation, got {}", lines[0]);

    // bare `--mad` defaults the multiplier to 1.0
    let output = run_bedmap(&[reference.path().to_str().unwrap(), map.path().to_str().unwrap(), "--mad"]);
    let lines = stdout_lines(&output);
    let value: f64 = lines[0].parse().unwrap();
    assert!((value - 10.0).abs() < 1e-9, "expected the unscaled median absolute deviation, got {}", lines[0]);
}

#[test]
fn skip_unmapped_suppresses_empty_window_lines() {
    let reference = bed_file("chr1\t0\t10\nchr1\t20\t30\n");
    let map = bed_file("chr1\t20\t30\n");

    let output = run_bedmap(&[
        reference.path().to_str().unwrap(),
        map.path().to_str().unwrap(),
        "--skip-unmapped",
        "--count",
    ]);
    assert_eq!(stdout_lines(&output), vec!["1"]);
}
