//! File sinks and rotation

use psrun::sink::{build_sink, LogSink, RotatingFileSink, SinkTarget};
use std::fs;

#[test]
fn test_file_sink_appends_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runner.log");
    fs::write(&path, "existing\n").unwrap();

    let sink = build_sink(&SinkTarget::File(path.clone()), None, None).unwrap();
    sink.write_line("first").unwrap();
    sink.write_line("second").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "existing\nfirst\nsecond\n");
}

#[test]
fn test_rotation_keeps_max_files_backups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ps.log");
    // every line is 6 bytes with its newline, two stay below 13 bytes
    let sink = RotatingFileSink::open(&path, Some(13), Some(2)).unwrap();

    for line in ["aaaaa", "bbbbb", "ccccc", "ddddd", "eeeee", "fffff", "ggggg"] {
        sink.write_line(line).unwrap();
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "ggggg\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("ps.log.1")).unwrap(),
        "eeeee\nfffff\n"
    );
    assert_eq!(
        fs::read_to_string(dir.path().join("ps.log.2")).unwrap(),
        "ccccc\nddddd\n"
    );
    assert!(!dir.path().join("ps.log.3").exists());
}

#[test]
fn test_rollover_when_max_bytes_is_reached() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ps.log");
    let sink = RotatingFileSink::open(&path, Some(12), Some(1)).unwrap();

    sink.write_line("aaaaa").unwrap();
    // 6 + 6 bytes reaches the limit exactly
    sink.write_line("bbbbb").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "bbbbb\n");
    assert_eq!(
        fs::read_to_string(dir.path().join("ps.log.1")).unwrap(),
        "aaaaa\n"
    );
}

#[test]
fn test_no_rotation_without_backups() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stdout.log");
    let sink = RotatingFileSink::open(&path, Some(12), None).unwrap();

    for line in ["aaaaa", "bbbbb", "ccccc"] {
        sink.write_line(line).unwrap();
    }

    assert_eq!(fs::read_to_string(&path).unwrap(), "aaaaa\nbbbbb\nccccc\n");
    assert!(!dir.path().join("stdout.log.1").exists());
}

#[test]
fn test_oversized_line_is_still_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stderr.log");
    let sink = RotatingFileSink::open(&path, Some(4), Some(1)).unwrap();

    sink.write_line("much longer than four bytes").unwrap();

    assert_eq!(
        fs::read_to_string(sink.path()).unwrap(),
        "much longer than four bytes\n"
    );
}

#[test]
fn test_unopenable_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let target = SinkTarget::File(dir.path().join("missing").join("run.log"));
    assert!(build_sink(&target, Some(100), Some(2)).is_err());
}
