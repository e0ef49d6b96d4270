//! Contains the [`TimeBase`] and [`LogicalTime`] types
//!
//! The hardware counter is only 16 bits wide and ticks once per millisecond,
//! so it wraps roughly every 65.5 seconds. We extend it with a software epoch
//! counter, bumped from the overflow interrupt, giving a millisecond clock
//! that won't wrap for thousands of years.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicU16, AtomicU32, Ordering};

use crate::hardware::{COUNTER_MAX, IrqSource, TimerHardware};

/// The number of distinct counter values in one epoch
const COUNTER_RANGE: u64 = COUNTER_MAX as u64 + 1;

/// Counter values below this, seen with the overflow flag still set, were
/// read after the wrap the flag is reporting
const WRAP_WINDOW: u16 = COUNTER_MAX / 2;

/// A point on the logical clock, in milliseconds
///
/// This is `epoch * 65536 + counter`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Default, Hash)]
pub struct LogicalTime(u64);

impl LogicalTime {
    /// The instant the time base was created
    pub const ZERO: LogicalTime = LogicalTime(0);

    /// Combine an epoch and a raw counter value
    pub const fn from_parts(epoch: u32, counter: u16) -> LogicalTime {
        LogicalTime(epoch as u64 * COUNTER_RANGE + counter as u64)
    }

    /// Build a time from a count of milliseconds
    pub const fn from_millis(millis: u64) -> LogicalTime {
        LogicalTime(millis)
    }

    /// The number of milliseconds since the time base started
    pub const fn as_millis(self) -> u64 {
        self.0
    }

    /// How many times the hardware counter had wrapped at this instant
    pub const fn epoch(self) -> u32 {
        (self.0 / COUNTER_RANGE) as u32
    }

    /// The hardware counter value at this instant
    ///
    /// This is what gets programmed into the compare channel.
    pub const fn counter(self) -> u16 {
        (self.0 % COUNTER_RANGE) as u16
    }

    /// The time `millis` milliseconds after this one
    ///
    /// A `u32` delay added to a 48-bit time cannot overflow a `u64`.
    pub const fn add_millis(self, millis: u32) -> LogicalTime {
        LogicalTime(self.0 + millis as u64)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LogicalTime {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{=u32}:{=u16:05}", self.epoch(), self.counter());
    }
}

impl core::fmt::Display for LogicalTime {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(fmt, "{}:{:05}", self.epoch(), self.counter())
    }
}

/// The software half of the logical clock
pub struct TimeBase {
    /// Number of counter wraparounds seen by the overflow interrupt
    epoch: AtomicU32,
    /// The counter value from the most recent [`TimeBase::now`]
    counter: AtomicU16,
}

impl TimeBase {
    /// Create a time base at epoch zero
    pub const fn new() -> TimeBase {
        TimeBase {
            epoch: AtomicU32::new(0),
            counter: AtomicU16::new(0),
        }
    }

    /// Read the current logical time
    ///
    /// The counter is always re-read from hardware. If the overflow interrupt
    /// runs between reading the epoch and reading the counter we go round
    /// again. If the overflow is pending but not yet serviced (because we are
    /// in the interrupt handler, or interrupts are masked) and the counter is
    /// in its lower half, the counter has already wrapped and we count the
    /// pending epoch.
    pub fn now(&self, hw: &dyn TimerHardware) -> LogicalTime {
        loop {
            let epoch = self.epoch.load(Ordering::Acquire);
            let counter = hw.counter();
            let wrap_pending = hw.flag(IrqSource::Overflow) && counter < WRAP_WINDOW;
            if self.epoch.load(Ordering::Acquire) != epoch {
                continue;
            }
            self.counter.store(counter, Ordering::Relaxed);
            let epoch = if wrap_pending {
                epoch.wrapping_add(1)
            } else {
                epoch
            };
            break LogicalTime::from_parts(epoch, counter);
        }
    }

    /// Count one hardware counter wraparound
    ///
    /// Only call this from the overflow interrupt path, after clearing the
    /// overflow flag.
    pub fn tick(&self) {
        #[cfg(not(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base")))]
        self.epoch.fetch_add(1, Ordering::AcqRel);

        #[cfg(any(arm_architecture = "v6-m", arm_architecture = "v8-m.base"))]
        critical_section::with(|_| {
            self.epoch.store(
                self.epoch.load(Ordering::Relaxed).wrapping_add(1),
                Ordering::Release,
            );
        });
    }

    /// The number of wraparounds counted so far
    pub fn epoch(&self) -> u32 {
        self.epoch.load(Ordering::Acquire)
    }

    /// The counter value captured by the last call to [`TimeBase::now`]
    pub fn last_counter(&self) -> u16 {
        self.counter.load(Ordering::Relaxed)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        TimeBase::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTimer;

    #[test]
    fn parts_round_trip() {
        let t = LogicalTime::from_parts(3, 0x1234);
        assert_eq!(t.epoch(), 3);
        assert_eq!(t.counter(), 0x1234);
        assert_eq!(t.as_millis(), 3 * 65536 + 0x1234);
    }

    #[test]
    fn adding_carries_into_epoch() {
        let t = LogicalTime::from_parts(0, 65530).add_millis(10);
        assert_eq!(t, LogicalTime::from_parts(1, 4));
    }

    #[test]
    fn largest_delay_does_not_overflow() {
        let t = LogicalTime::from_parts(u32::MAX, u16::MAX).add_millis(u32::MAX);
        assert!(t > LogicalTime::from_parts(u32::MAX, u16::MAX));
    }

    #[test]
    fn display_format() {
        let t = LogicalTime::from_parts(2, 42);
        assert_eq!(format!("{t}"), "2:00042");
    }

    #[test]
    fn now_combines_epoch_and_live_counter() {
        let hw = MockTimer::new();
        let time = TimeBase::new();
        hw.set_counter(100);
        assert_eq!(time.now(&hw), LogicalTime::from_parts(0, 100));
        time.tick();
        time.tick();
        hw.set_counter(7);
        assert_eq!(time.now(&hw), LogicalTime::from_parts(2, 7));
        assert_eq!(time.last_counter(), 7);
        assert_eq!(time.epoch(), 2);
    }

    #[test]
    fn pending_overflow_is_counted() {
        let hw = MockTimer::new();
        let time = TimeBase::new();
        hw.start();
        hw.set_counter(COUNTER_MAX);
        let before = time.now(&hw);
        // wraps to zero and raises the overflow flag, but nobody services it
        hw.tick();
        hw.tick();
        let after = time.now(&hw);
        assert_eq!(after, LogicalTime::from_parts(1, 1));
        assert!(after > before);

        // servicing the overflow doesn't move time again
        hw.clear_flag(IrqSource::Overflow);
        time.tick();
        assert_eq!(time.now(&hw), after);
    }

    #[test]
    fn stale_overflow_flag_in_upper_half_is_ignored() {
        let hw = MockTimer::new();
        let time = TimeBase::new();
        time.tick();
        hw.raise(IrqSource::Overflow);
        hw.set_counter(60000);
        assert_eq!(time.now(&hw), LogicalTime::from_parts(1, 60000));
    }
}

// End of File
