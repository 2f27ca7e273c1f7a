//! Soft cap on the bytes of source being analyzed at once

use std::sync::{Condvar, Mutex, MutexGuard};

use crate::logging;

/// Admits files while the sum of in-flight sizes is within the budget.
///
/// A file that pushes the total over the budget is still admitted; the
/// following requests wait until enough is released. So a single file
/// larger than the whole budget gets through once the others finish.
#[derive(Debug)]
pub struct ByteLimiter {
    budget: u64,
    in_flight: Mutex<u64>,
    released: Condvar,
}

/// Share of the budget held by one file; released on drop
#[derive(Debug)]
pub struct ByteGuard<'a> {
    limiter: &'a ByteLimiter,
    size: u64,
}

impl ByteLimiter {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            in_flight: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Bytes currently held by guards
    pub fn in_flight(&self) -> u64 {
        *self.lock()
    }

    /// Block until `size` bytes may be processed
    pub fn acquire(&self, size: u64, filename: &str) -> ByteGuard<'_> {
        let mut in_flight = self.lock();
        while *in_flight > self.budget {
            in_flight = self.released.wait(in_flight).unwrap_or_else(|e| e.into_inner());
        }
        *in_flight += size;
        if *in_flight > self.budget {
            logging::log_throttle(filename, *in_flight, size);
        }
        ByteGuard { limiter: self, size }
    }

    fn release(&self, size: u64) {
        let mut in_flight = self.lock();
        *in_flight = in_flight.saturating_sub(size);
        self.released.notify_all();
    }

    fn lock(&self) -> MutexGuard<'_, u64> {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ByteGuard<'_> {
    pub fn size(&self) -> u64 {
        self.size
    }
}

impl Drop for ByteGuard<'_> {
    fn drop(&mut self) {
        self.limiter.release(self.size);
    }
}
