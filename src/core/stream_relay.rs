//! Background relay of a child's output streams
//!
//! Each stream gets its own worker thread doing blocking line reads and
//! pushing raw lines onto a channel. The poll loop pops from the channel
//! without ever blocking on the stream itself.

use crate::sink::LogSink;
use log::{debug, warn};
use std::io::{self, BufRead, BufReader, Read};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::thread;
use std::time::Instant;

/// FIFO of raw lines read from one stream
///
/// The relay worker is the only producer. Once it reaches end of stream it
/// stops producing; lines already queued stay poppable.
pub struct LineQueue {
    rx: Receiver<Vec<u8>>,
}

impl LineQueue {
    /// Pop the oldest queued line, or `None` if nothing is queued right now.
    /// Never blocks.
    pub fn pop_available(&self) -> Option<Vec<u8>> {
        match self.rx.try_recv() {
            Ok(line) => Some(line),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Queue already holding `lines`, with no worker behind it
    #[cfg(test)]
    pub(crate) fn from_lines(lines: &[&str]) -> Self {
        let (tx, rx) = mpsc::channel();
        for line in lines {
            let _ = tx.send(format!("{}\n", line).into_bytes());
        }
        Self { rx }
    }

    /// Empty queue whose producer stays open until the returned sender drops
    #[cfg(test)]
    pub(crate) fn pending() -> (mpsc::Sender<Vec<u8>>, Self) {
        let (tx, rx) = mpsc::channel();
        (tx, Self { rx })
    }

    /// Forward every currently queued line to `sink`, oldest first.
    /// Returns the number of lines forwarded.
    pub fn drain_all(&self, sink: &dyn LogSink) -> io::Result<usize> {
        let mut count = 0;
        while let Some(line) = self.pop_available() {
            sink.write_line(&decode_line(&line))?;
            count += 1;
        }
        Ok(count)
    }

    /// Like [`drain_all`](Self::drain_all), but keep waiting for lines until
    /// the relay reaches end of stream or `deadline` passes.
    pub fn drain_settled(&self, sink: &dyn LogSink, deadline: Instant) -> io::Result<usize> {
        let mut count = 0;
        loop {
            let wait = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(wait) {
                Ok(line) => {
                    sink.write_line(&decode_line(&line))?;
                    count += 1;
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        Ok(count)
    }
}

/// Start a worker thread that reads `stream` line by line until end of
/// stream. Each line is queued with its terminator.
pub fn start_relay<R>(name: &str, stream: R) -> io::Result<LineQueue>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = mpsc::channel();
    let label = name.to_string();

    thread::Builder::new()
        .name(format!("psrun-relay-{}", name))
        .spawn(move || {
            let mut reader = BufReader::new(stream);
            loop {
                let mut line = Vec::new();
                match reader.read_until(b'\n', &mut line) {
                    Ok(0) => break,
                    Ok(_) => {
                        if tx.send(line).is_err() {
                            // consumer is gone, nobody left to read for
                            break;
                        }
                    }
                    Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("Reading {} failed: {}", label, e);
                        break;
                    }
                }
            }
            debug!("Relay for {} reached end of stream", label);
        })?;

    Ok(LineQueue { rx })
}

/// Decode a raw line for a sink: UTF-8 (lossy), trailing whitespace removed
pub fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end().to_string()
}
