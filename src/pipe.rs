//! In-process single-producer/single-consumer byte pipe.
//!
//! Grounded on the original `rpm_info.py`'s `InProcessPipe` + `threading.Thread`
//! producer/consumer used by its `--list` path: a decompressor thread writes
//! chunks while the main thread's cpio parser reads them. This is a small ring
//! buffer behind a `Mutex`/`Condvar` pair rather than an OS pipe, matching the
//! original's single-producer/single-consumer, FIFO, close-drains-then-EOF
//! contract without shelling out to a real fd.
use std::collections::VecDeque;
use std::io::{self, Read};
use std::sync::{Arc, Condvar, Mutex};

/// Queue and close-flag guarded by one lock so the condvar predicate
/// (non-empty or closed) and its mutation are always observed atomically.
struct State {
    queue: VecDeque<u8>,
    closed: bool,
}

struct Shared {
    state: Mutex<State>,
    not_empty: Condvar,
}

pub struct PipeWriter {
    shared: Arc<Shared>,
}

pub struct PipeReader {
    shared: Arc<Shared>,
}

/// Construct a bounded-in-spirit (unbounded-capacity, since the full payload
/// is already in memory by the time this crate decompresses it) duplex pipe.
pub fn pipe() -> (PipeWriter, PipeReader) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State {
            queue: VecDeque::new(),
            closed: false,
        }),
        not_empty: Condvar::new(),
    });
    (
        PipeWriter { shared: shared.clone() },
        PipeReader { shared },
    )
}

impl PipeWriter {
    pub fn write(&self, data: &[u8]) {
        let mut state = self.shared.state.lock().unwrap();
        state.queue.extend(data.iter().copied());
        self.shared.not_empty.notify_one();
    }

    /// Signal EOF. Reads already queued still drain before the reader sees EOF.
    pub fn close(self) {
        let mut state = self.shared.state.lock().unwrap();
        state.closed = true;
        self.shared.not_empty.notify_one();
    }
}

impl Read for PipeReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = self.shared.state.lock().unwrap();
        loop {
            if !state.queue.is_empty() {
                let n = buf.len().min(state.queue.len());
                for slot in buf.iter_mut().take(n) {
                    *slot = state.queue.pop_front().unwrap();
                }
                return Ok(n);
            }
            if state.closed {
                return Ok(0); // drained and closed: EOF
            }
            state = self.shared.not_empty.wait(state).unwrap();
        }
    }
}

/// Run a producer closure on a background thread feeding `bytes` into a pipe,
/// returning a reader the caller can parse from on the current thread. The
/// consumer join is advisory: a failed producer thread surfaces only through
/// a short read, never a panic across the join.
pub fn spawn_producer(bytes: Vec<u8>) -> PipeReader {
    let (writer, reader) = pipe();
    std::thread::spawn(move || {
        const CHUNK: usize = 64 * 1024;
        for chunk in bytes.chunks(CHUNK) {
            writer.write(chunk);
        }
        writer.close();
    });
    reader
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_then_eofs_after_close() {
        let (writer, mut reader) = pipe();
        writer.write(b"abc");
        writer.close();

        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn spawn_producer_roundtrips() {
        let mut reader = spawn_producer(b"hello pipe".to_vec());
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"hello pipe");
    }
}
