#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]

use parking_lot::Mutex;

/// A pool of reusable slice buffers of a fixed nominal capacity.
///
/// `get` hands out a buffer of the requested length, reusing a pooled
/// allocation when one is available. Buffers returned through `put` are
/// retained only when their capacity matches the pool's nominal size, so the
/// pool never accumulates odd-sized allocations.
pub struct SlicePool<T> {
    size: usize,
    free: Mutex<Vec<Vec<T>>>,
}

impl<T: Default + Clone> SlicePool<T> {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            free: Mutex::new(Vec::new()),
        }
    }

    /// Returns the pool's nominal buffer capacity.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Checks out a buffer of length `len`.
    ///
    /// When `len` exceeds the nominal size, a fresh buffer of exactly `len`
    /// is allocated instead; such buffers are dropped on `put`.
    pub fn get(&self, len: usize) -> Vec<T> {
        if len > self.size {
            return vec![T::default(); len];
        }

        let mut buf = self
            .free
            .lock()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(self.size));
        buf.clear();
        buf.resize(len, T::default());
        buf
    }

    /// Returns a buffer to the pool. Buffers whose capacity does not match
    /// the nominal size are dropped.
    pub fn put(&self, buf: Vec<T>) {
        if buf.capacity() == self.size {
            self.free.lock().push(buf);
        }
    }
}
