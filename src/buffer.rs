//! Buffer module for accumulating resolved log lines.
//!
//! The buffer is a mutex-guarded `Vec`. Every operation takes the one lock,
//! so an append is never split by a concurrent size query or flush.

use std::sync::{Mutex, MutexGuard};

use crate::entry::Line;

/// Concurrency-safe ordered sequence of lines awaiting transmission.
#[derive(Debug, Default)]
pub struct LineBuffer {
    lines: Mutex<Vec<Line>>,
}

impl LineBuffer {
    /// Create an empty buffer with room for `capacity` lines.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lines: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Append a line to the end of the buffer.
    pub fn push(&self, line: Line) {
        self.lock().push(line);
    }

    /// Get the current number of lines in the buffer.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Take every buffered line, leaving the buffer empty.
    ///
    /// The capture and the reset happen under a single lock acquisition.
    pub fn take(&self) -> Vec<Line> {
        let mut lines = self.lock();
        let capacity = lines.capacity();
        std::mem::replace(&mut *lines, Vec::with_capacity(capacity))
    }

    // A panic while holding the lock can't leave a Vec half-pushed, so a
    // poisoned buffer is still usable.
    fn lock(&self) -> MutexGuard<'_, Vec<Line>> {
        self.lines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
