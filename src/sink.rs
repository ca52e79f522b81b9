//! Line-oriented log sinks
//!
//! Everything psrun emits (run narration, monitor snapshots and the child's
//! own output) goes to a [`LogSink`]. A sink accepts one line of text at a
//! time; what it does with it is up to the implementation.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::Result;

/// Destination for single lines of text
pub trait LogSink {
    /// Write one line. The line must not carry its own terminator.
    fn write_line(&self, line: &str) -> io::Result<()>;
}

impl<S: LogSink + ?Sized> LogSink for Box<S> {
    fn write_line(&self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }
}

impl<S: LogSink + ?Sized> LogSink for &S {
    fn write_line(&self, line: &str) -> io::Result<()> {
        (**self).write_line(line)
    }
}

/// Discards every line
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl LogSink for NullSink {
    fn write_line(&self, _line: &str) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "{}", line)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let mut err = io::stderr().lock();
        writeln!(err, "{}", line)
    }
}

/// Keeps lines in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every line written so far
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        lock(&self.lines)?.push(line.to_string());
        Ok(())
    }
}

struct FileState {
    file: File,
    size: u64,
}

/// Appends lines to a file, rolling it over once the next line would make
/// it reach `max_bytes`.
///
/// Rolled files are kept as `path.1` (newest) up to `path.n` (oldest) with
/// `max_files` set to `n`. Rotation needs both settings: without
/// `max_files` the file just keeps growing.
pub struct RotatingFileSink {
    path: PathBuf,
    max_bytes: Option<u64>,
    max_files: Option<usize>,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    pub fn open(
        path: impl AsRef<Path>,
        max_bytes: Option<u64>,
        max_files: Option<usize>,
    ) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = open_append(&path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path,
            max_bytes: max_bytes.filter(|bytes| *bytes > 0),
            max_files: max_files.filter(|files| *files > 0),
            state: Mutex::new(FileState { file, size }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn backup_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{}", index));
        PathBuf::from(name)
    }

    fn roll_over(&self, state: &mut FileState, max_files: usize) -> io::Result<()> {
        for index in (1..max_files).rev() {
            let src = self.backup_path(index);
            if src.exists() {
                let dst = self.backup_path(index + 1);
                if dst.exists() {
                    fs::remove_file(&dst)?;
                }
                fs::rename(&src, &dst)?;
            }
        }
        let first = self.backup_path(1);
        if first.exists() {
            fs::remove_file(&first)?;
        }
        fs::rename(&self.path, &first)?;
        state.file = open_append(&self.path)?;
        state.size = 0;
        Ok(())
    }
}

impl LogSink for RotatingFileSink {
    fn write_line(&self, line: &str) -> io::Result<()> {
        let record = format!("{}\n", line);
        let len = record.len() as u64;

        let mut state = lock(&self.state)?;
        if let (Some(max_bytes), Some(max_files)) = (self.max_bytes, self.max_files) {
            // an empty file is never rolled, even for an oversized line
            if state.size > 0 && state.size + len >= max_bytes {
                self.roll_over(&mut state, max_files)?;
            }
        }

        state.file.write_all(record.as_bytes())?;
        state.file.flush()?;
        state.size += len;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}

fn lock<T>(mutex: &Mutex<T>) -> io::Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| io::Error::new(io::ErrorKind::Other, "log sink lock poisoned"))
}

/// Where a sink writes, as selected on the command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkTarget {
    Null,
    Stdout,
    Stderr,
    File(PathBuf),
}

impl From<&str> for SinkTarget {
    fn from(selector: &str) -> Self {
        match selector {
            "/dev/null" | "null" => SinkTarget::Null,
            "stdout" => SinkTarget::Stdout,
            "stderr" => SinkTarget::Stderr,
            path => SinkTarget::File(PathBuf::from(path)),
        }
    }
}

impl FromStr for SinkTarget {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(SinkTarget::from(s))
    }
}

/// Build a sink for `target`. Rotation settings only apply to files.
pub fn build_sink(
    target: &SinkTarget,
    max_bytes: Option<u64>,
    max_files: Option<usize>,
) -> Result<Box<dyn LogSink>> {
    let sink: Box<dyn LogSink> = match target {
        SinkTarget::Null => Box::new(NullSink),
        SinkTarget::Stdout => Box::new(StdoutSink),
        SinkTarget::Stderr => Box::new(StderrSink),
        SinkTarget::File(path) => Box::new(RotatingFileSink::open(path, max_bytes, max_files)?),
    };
    Ok(sink)
}

/// The four destinations of a supervised run
pub struct RunSinks {
    /// Start/stop/error narration
    pub runner: Box<dyn LogSink>,
    /// One snapshot line per tick
    pub monitor: Box<dyn LogSink>,
    /// The child's stdout, line by line
    pub stdout: Box<dyn LogSink>,
    /// The child's stderr, line by line
    pub stderr: Box<dyn LogSink>,
}

impl RunSinks {
    /// Sinks that drop everything
    pub fn discard() -> Self {
        Self {
            runner: Box::new(NullSink),
            monitor: Box::new(NullSink),
            stdout: Box::new(NullSink),
            stderr: Box::new(NullSink),
        }
    }
}
