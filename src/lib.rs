//! # timeouts
//!
//! Deadline-ordered callbacks for a single-core microcontroller, driven by
//! one 16-bit hardware timer.
//!
//! Put a [`Timeout`] in a `static`, then ask for a callback some number of
//! milliseconds from now:
//!
//! ```rust,ignore
//! static SCHEDULER: timeouts::Scheduler = timeouts::Scheduler::new(&TIMER, 16_000_000);
//! static BLINK: timeouts::Timeout = timeouts::Timeout::new();
//!
//! SCHEDULER.install();
//! timeouts::schedule(&BLINK, 500, blink, core::ptr::null_mut())?;
//! ```
//!
//! Nothing is allocated. The pending queue links the caller's entries
//! together, and the timer's compare channel is always programmed for the
//! entry at the head of the queue. When nothing is pending the timer is
//! stopped.
//!
//! Callbacks run in interrupt context. Keep them short.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![cfg_attr(not(test), no_std)]

mod fmt;

mod critical;
mod hardware;
#[cfg(test)]
mod mock;
mod queue;
mod scheduler;
pub mod stm32;
mod time_base;

pub use critical::IrqGuard;
pub use hardware::{COUNTER_MAX, IrqSource, TimerHardware};
pub use queue::{Timeout, TimeoutCallback};
pub use scheduler::{ScheduleError, Scheduler};
pub use time_base::{LogicalTime, TimeBase};

/// Timer interrupt handler
///
/// Bind this to the timer's interrupt vector. It does nothing until a
/// [`Scheduler`] has been installed with [`Scheduler::install`].
pub fn interrupt_handler() {
    if let Some(scheduler) = Scheduler::get_scheduler() {
        scheduler.on_interrupt();
    }
}

/// Schedule a callback on the installed [`Scheduler`]
///
/// See [`Scheduler::schedule`].
pub fn schedule(
    entry: &'static Timeout,
    delay_ms: u32,
    callback: TimeoutCallback,
    arg: *mut (),
) -> Result<(), ScheduleError> {
    match Scheduler::get_scheduler() {
        Some(scheduler) => scheduler.schedule(entry, delay_ms, callback, arg),
        None => Err(ScheduleError::NotInitialised),
    }
}

/// Get the current time from the installed [`Scheduler`]
///
/// Returns [`LogicalTime::ZERO`] if nothing is installed yet.
pub fn now() -> LogicalTime {
    match Scheduler::get_scheduler() {
        Some(scheduler) => scheduler.now(),
        None => LogicalTime::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicU32, Ordering};
    use crate::mock::MockTimer;

    static FIRED: AtomicU32 = AtomicU32::new(0);

    fn count(_arg: *mut ()) {
        FIRED.fetch_add(1, Ordering::SeqCst);
    }

    /// The only test that touches the global scheduler
    #[test]
    fn installed_scheduler_serves_free_functions() {
        static ENTRY: Timeout = Timeout::new();
        let hw = MockTimer::leak();
        let scheduler: &'static Scheduler = Box::leak(Box::new(Scheduler::new(hw, 8_000_000)));

        assert_eq!(
            schedule(&ENTRY, 5, count, core::ptr::null_mut()),
            Err(ScheduleError::NotInitialised)
        );
        assert_eq!(now(), LogicalTime::ZERO);
        // harmless before install
        interrupt_handler();

        scheduler.install();
        assert_eq!(hw.prescaler(), 8000);
        hw.set_counter(40);
        assert_eq!(now(), LogicalTime::from_millis(40));

        schedule(&ENTRY, 5, count, core::ptr::null_mut()).unwrap();
        for _ in 0..5 {
            hw.tick();
            while hw.irq_pending() {
                interrupt_handler();
            }
        }
        assert_eq!(FIRED.load(Ordering::SeqCst), 1);
        assert_eq!(now(), LogicalTime::from_millis(45));
        assert!(!ENTRY.is_pending());
    }
}

// End of File
