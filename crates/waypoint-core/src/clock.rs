//! Simulated time
//!
//! The forwarding core never reads wall-clock time. Every time-dependent
//! operation takes the current simulated time, in seconds, from a
//! [`SimClock`] driven by the host scheduler.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ClockError;

/// Time abstraction for the discrete-event host
///
/// Implementations must be monotonically non-decreasing.
pub trait SimClock: Send + Sync {
    /// Current simulated time in seconds
    fn now(&self) -> f64;
}

/// Clock that only moves when the scheduler advances it
///
/// Stores the `f64` bit pattern in an atomic so a single clock can be shared
/// by every node of a simulation.
#[derive(Debug, Default)]
pub struct ManualClock {
    bits: AtomicU64,
}

impl ManualClock {
    /// Create a clock starting at `start` seconds
    pub fn starting_at(start: f64) -> Result<Self, ClockError> {
        if !start.is_finite() {
            return Err(ClockError::NotFinite(start));
        }
        Ok(Self {
            bits: AtomicU64::new(start.to_bits()),
        })
    }

    /// Move the clock to an absolute time
    ///
    /// Concurrent callers never move the clock backwards: the comparison and
    /// the store happen in one atomic update.
    pub fn advance_to(&self, time: f64) -> Result<(), ClockError> {
        if !time.is_finite() {
            return Err(ClockError::NotFinite(time));
        }
        self.bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                (time >= f64::from_bits(bits)).then(|| time.to_bits())
            })
            .map(|_| ())
            .map_err(|bits| ClockError::NonMonotonic {
                current: f64::from_bits(bits),
                requested: time,
            })
    }

    /// Move the clock forward by `delta` seconds
    pub fn advance_by(&self, delta: f64) -> Result<(), ClockError> {
        self.advance_to(self.now() + delta)
    }
}

impl SimClock for ManualClock {
    fn now(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_clock_starts_at_zero() {
        let clock = ManualClock::default();
        assert_eq!(clock.now(), 0.0);
    }

    #[test]
    fn test_advance() {
        let clock = ManualClock::starting_at(10.0).unwrap();
        clock.advance_by(5.5).unwrap();
        assert_eq!(clock.now(), 15.5);
        clock.advance_to(20.0).unwrap();
        assert_eq!(clock.now(), 20.0);
    }

    #[test]
    fn test_rejects_backwards_time() {
        let clock = ManualClock::starting_at(10.0).unwrap();
        let err = clock.advance_to(9.0).unwrap_err();
        assert!(matches!(err, ClockError::NonMonotonic { .. }));
        assert_eq!(clock.now(), 10.0);
    }

    #[test]
    fn test_rejects_non_finite() {
        assert!(ManualClock::starting_at(f64::NAN).is_err());
        let clock = ManualClock::default();
        assert!(clock.advance_to(f64::INFINITY).is_err());
    }

    #[test]
    fn test_clock_error_lifts_into_core_error() {
        let clock = ManualClock::starting_at(5.0).unwrap();
        let err: crate::CoreError = clock.advance_to(1.0).unwrap_err().into();
        assert!(err.to_string().contains("backwards"));
    }

    #[test]
    fn test_concurrent_advances_never_go_backwards() {
        let clock = ManualClock::default();

        std::thread::scope(|s| {
            for t in 1..=8 {
                let clock = &clock;
                s.spawn(move || {
                    for step in 0..500 {
                        let target = f64::from(step * 8 + t);
                        let before = clock.now();
                        match clock.advance_to(target) {
                            Ok(()) => assert!(clock.now() >= target),
                            Err(ClockError::NonMonotonic { current, .. }) => {
                                assert!(current > target);
                                assert!(current >= before);
                            }
                            Err(e) => panic!("unexpected error: {e}"),
                        }
                    }
                });
            }
        });

        // Thread 8 always requests the largest time of the last round
        assert_eq!(clock.now(), f64::from(499 * 8 + 8));
    }
}
