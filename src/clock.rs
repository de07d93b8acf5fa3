//! Millisecond time sources for the generator.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// A source of wall-clock time in milliseconds since UNIX_EPOCH.
///
/// The generator reads the clock once per call, plus repeatedly while
/// waiting out an exhausted slot.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// The system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        // A clock set before 1970 reads as zero, which the layout then
        // rejects as earlier than the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64)
    }
}

/// A clock that only moves when told to.
///
/// Lets tests (here and downstream) pin the generator to a given slot,
/// replay a backwards jump, or release a waiting caller by advancing.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    /// Move forward by `ms` and return the new reading.
    pub fn advance(&self, ms: u64) -> u64 {
        self.now.fetch_add(ms, Ordering::SeqCst) + ms
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// Block until `clock` reads strictly later than `last_ms`, then return that reading.
///
/// There is no timeout: a clock that never advances keeps the caller here.
/// The thread yields between polls instead of pegging a core.
pub fn wait_past<C: Clock + ?Sized>(clock: &C, last_ms: u64) -> u64 {
    loop {
        let now = clock.now_ms();
        if now > last_ms {
            return now;
        }
        std::thread::yield_now();
    }
}
