//! The per-node id generator and its slot/sequence state machine.

use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::clock::{self, Clock, SystemClock};
use crate::error::{FlakeError, Result};
use crate::layout::{FlakeParts, Layout};

const LAYOUT: Layout = Layout::DEFAULT;

/// How the sequence is seeded when a call lands in a fresh millisecond.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TieBreak {
    /// Start every new slot at sequence 0.
    #[default]
    ResetOnNewSlot,
    /// Start every new slot at `now & 1`.
    ///
    /// Only varies the low bit with the parity of the timestamp. It adds no
    /// real entropy and exists for compatibility with ids issued that way.
    TimestampParity,
}

impl TieBreak {
    const fn initial_sequence(self, now_ms: u64) -> u64 {
        match self {
            TieBreak::ResetOnNewSlot => 0,
            TieBreak::TimestampParity => now_ms & 1,
        }
    }
}

/// The fixed location codes stamped into every id of one generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Identity {
    /// Room / datacenter code.
    pub primary: u64,
    /// Worker / node code.
    pub secondary: u64,
}

#[derive(Debug)]
struct State {
    /// Millisecond of the last issued id; `None` until the first one.
    last_ms: Option<u64>,
    sequence: u64,
}

/// Issues unique, strictly increasing 64-bit ids for one node.
///
/// One generator must exist per location code pair. Share it between threads
/// behind an `Arc`; every call runs under a single lock, so no two callers
/// ever observe the same `(millisecond, sequence)` pair.
///
/// ```
/// use roomflake::{IdGenerator, TieBreak, decode};
///
/// let generator = IdGenerator::new(1, 1, 0).unwrap();
/// let first = generator.next_id(TieBreak::ResetOnNewSlot).unwrap();
/// let second = generator.next().unwrap();
/// assert!(second > first);
/// assert_eq!(decode(second).primary, 1);
/// ```
#[derive(Debug)]
pub struct IdGenerator<C = SystemClock> {
    identity: Identity,
    clock: C,
    state: Mutex<State>,
}

impl IdGenerator<SystemClock> {
    /// Create a generator reading the system clock.
    ///
    /// # Arguments
    /// * `primary` - Room code (0..=31).
    /// * `secondary` - Worker code (0..=31).
    /// * `sequence` - Initial sequence (0..=4095).
    ///
    /// # Errors
    /// [`FlakeError::InvalidConfiguration`] if any value exceeds its field.
    pub fn new(primary: u64, secondary: u64, sequence: u64) -> Result<Self> {
        Self::with_clock(primary, secondary, sequence, SystemClock)
    }
}

impl<C: Clock> IdGenerator<C> {
    /// Create a generator reading time from `clock`.
    pub fn with_clock(primary: u64, secondary: u64, sequence: u64, clock: C) -> Result<Self> {
        LAYOUT.check_identity(primary, secondary, sequence)?;
        debug!(primary, secondary, sequence, "id generator ready");
        Ok(Self {
            identity: Identity { primary, secondary },
            clock,
            state: Mutex::new(State {
                last_ms: None,
                sequence,
            }),
        })
    }

    pub fn identity(&self) -> Identity {
        self.identity
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Issue the next id with the default [`TieBreak::ResetOnNewSlot`].
    pub fn next(&self) -> Result<u64> {
        self.next_id(TieBreak::default())
    }

    /// Issue the next id.
    ///
    /// Blocks while another caller holds the generator, and also when the
    /// current millisecond has run out of sequence values, until the clock
    /// moves on.
    ///
    /// # Errors
    /// * [`FlakeError::ClockRegression`] if the clock reads earlier than the
    ///   last issued id.
    /// * [`FlakeError::TimestampOverflow`] if the clock is outside the range
    ///   the timestamp field can encode.
    ///
    /// On error the generator is left exactly as it was.
    pub fn next_id(&self, tie_break: TieBreak) -> Result<u64> {
        let mut state = self.lock();
        self.issue(&mut state, tie_break)
    }

    /// Issue `n` consecutive ids under a single lock acquisition.
    ///
    /// Stops at the first error; ids issued before it are not returned but
    /// stay consumed.
    pub fn batch(&self, n: usize, tie_break: TieBreak) -> Result<Vec<u64>> {
        let mut state = self.lock();
        (0..n).map(|_| self.issue(&mut state, tie_break)).collect()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // State is written only after every fallible step, so a guard
        // poisoned by a panicking clock still holds a consistent state.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn issue(&self, state: &mut State, tie_break: TieBreak) -> Result<u64> {
        let mut now = self.clock.now_ms();

        let sequence = match state.last_ms {
            Some(last_ms) if now < last_ms => {
                return Err(FlakeError::ClockRegression {
                    last_ms,
                    now_ms: now,
                });
            }
            Some(last_ms) if now == last_ms => {
                let next = (state.sequence + 1) & LAYOUT.sequence_mask();
                if next == 0 {
                    debug!(slot = last_ms, "sequence exhausted, waiting for next millisecond");
                    now = clock::wait_past(&self.clock, last_ms);
                }
                next
            }
            _ => tie_break.initial_sequence(now),
        };

        let elapsed_ms = LAYOUT.elapsed_since_epoch(now)?;

        state.last_ms = Some(now);
        state.sequence = sequence;

        Ok(LAYOUT.pack(FlakeParts {
            elapsed_ms,
            primary: self.identity.primary,
            secondary: self.identity.secondary,
            sequence,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::layout::{EPOCH_MS, decode};
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn manual(primary: u64, secondary: u64, at_ms: u64) -> IdGenerator<Arc<ManualClock>> {
        IdGenerator::with_clock(primary, secondary, 0, Arc::new(ManualClock::new(at_ms))).unwrap()
    }

    #[test]
    fn rejects_out_of_range_identity() {
        assert_eq!(
            IdGenerator::new(32, 0, 0).unwrap_err(),
            FlakeError::InvalidConfiguration {
                field: "primary",
                value: 32,
                max: 31
            }
        );
        assert!(IdGenerator::new(31, 0, 0).is_ok());
        assert!(matches!(
            IdGenerator::new(0, 32, 0),
            Err(FlakeError::InvalidConfiguration {
                field: "secondary",
                ..
            })
        ));
        assert!(matches!(
            IdGenerator::new(0, 0, 4096),
            Err(FlakeError::InvalidConfiguration {
                field: "sequence",
                ..
            })
        ));
        assert!(IdGenerator::new(31, 31, 4095).is_ok());
    }

    #[test]
    fn reproduces_historical_id() {
        let clock = ManualClock::new(EPOCH_MS + 168_252_144);
        let generator = IdGenerator::with_clock(1, 1, 1, clock).unwrap();
        assert_eq!(generator.next().unwrap(), 705_700_640_722_944);
    }

    #[test]
    fn one_millisecond_apart_resets_sequence() {
        let clock = Arc::new(ManualClock::new(EPOCH_MS + 1_000));
        let generator = IdGenerator::with_clock(1, 1, 1, clock).unwrap();
        let mut ids = Vec::new();
        for _ in 0..8 {
            ids.push(generator.next_id(TieBreak::ResetOnNewSlot).unwrap());
            generator.clock().advance(1);
        }

        for pair in ids.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        for (i, id) in ids.iter().enumerate() {
            let parts = decode(*id);
            assert_eq!(parts.sequence, 0);
            assert_eq!(parts.primary, 1);
            assert_eq!(parts.secondary, 1);
            assert_eq!(parts.elapsed_ms, 1_000 + i as u64);
        }
    }

    #[test]
    fn same_millisecond_increments_sequence() {
        let generator = manual(3, 4, EPOCH_MS + 42);
        let first = decode(generator.next().unwrap());
        let second = decode(generator.next().unwrap());
        assert_eq!(first.elapsed_ms, second.elapsed_ms);
        assert_eq!(second.sequence, first.sequence + 1);
    }

    #[test]
    fn exhausted_slot_waits_for_next_millisecond() {
        let generator = Arc::new(manual(0, 0, EPOCH_MS + 500));
        let full_slot = generator.batch(4096, TieBreak::ResetOnNewSlot).unwrap();
        assert_eq!(decode(full_slot[0]).sequence, 0);
        assert_eq!(decode(full_slot[4095]).sequence, 4095);

        let ticker = {
            let generator = Arc::clone(&generator);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                generator.clock().set(EPOCH_MS + 501);
            })
        };
        let next = generator.next().unwrap();
        ticker.join().unwrap();

        let parts = decode(next);
        assert_eq!(parts.sequence, 0);
        assert_eq!(parts.elapsed_ms, 501);
        assert!(next > full_slot[4095]);
    }

    #[test]
    fn clock_regression_leaves_state_untouched() {
        let generator = manual(1, 2, EPOCH_MS + 1_000);
        let first = generator.next().unwrap();

        generator.clock().set(EPOCH_MS + 999);
        assert_eq!(
            generator.next(),
            Err(FlakeError::ClockRegression {
                last_ms: EPOCH_MS + 1_000,
                now_ms: EPOCH_MS + 999
            })
        );

        generator.clock().set(EPOCH_MS + 1_000);
        let second = generator.next().unwrap();
        assert_eq!(decode(second).sequence, decode(first).sequence + 1);
        assert_eq!(decode(second).elapsed_ms, 1_000);
    }

    #[test]
    fn clock_before_epoch_is_rejected_without_side_effects() {
        let generator = manual(0, 0, EPOCH_MS - 1);
        assert!(matches!(
            generator.next(),
            Err(FlakeError::TimestampOverflow { .. })
        ));

        generator.clock().set(EPOCH_MS);
        assert_eq!(generator.next().unwrap(), 0);
    }

    #[test]
    fn timestamp_parity_seeds_new_slots() {
        let generator = manual(1, 1, EPOCH_MS + 11);
        let odd = generator.clock().now_ms() & 1;
        let first = decode(generator.next_id(TieBreak::TimestampParity).unwrap());
        assert_eq!(first.sequence, odd);

        // within the slot the mode is irrelevant
        let second = decode(generator.next_id(TieBreak::TimestampParity).unwrap());
        assert_eq!(second.sequence, odd + 1);

        generator.clock().advance(1);
        let third = decode(generator.next_id(TieBreak::TimestampParity).unwrap());
        assert_eq!(third.sequence, generator.clock().now_ms() & 1);
    }

    #[test]
    fn system_clock_ids_strictly_increase() {
        let generator = IdGenerator::new(7, 9, 0).unwrap();
        let mut prev = generator.next().unwrap();
        for _ in 0..100_000 {
            let id = generator.next().unwrap();
            assert!(id > prev, "not monotonic: {prev} >= {id}");
            prev = id;
        }
    }

    #[test]
    fn concurrent_callers_never_collide() {
        let generator = Arc::new(IdGenerator::new(2, 5, 0).unwrap());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = Arc::clone(&generator);
                thread::spawn(move || {
                    let ids: Vec<u64> = (0..2_000).map(|_| generator.next().unwrap()).collect();
                    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
                    ids
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(seen.len(), 16_000);
    }

    #[test]
    #[ignore] // long-running, run manually
    fn uniqueness_ten_million() {
        let generator = IdGenerator::new(1, 1, 0).unwrap();
        let mut ids = HashSet::with_capacity(10_000_000);
        for _ in 0..10_000_000 {
            assert!(ids.insert(generator.next().unwrap()), "duplicate id found");
        }
    }
}
