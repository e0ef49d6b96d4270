//! A simulated timer peripheral for host tests

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicU8, AtomicU16, AtomicU32, Ordering};

use crate::hardware::{IrqSource, TimerHardware};
use crate::scheduler::Scheduler;

/// Simulates a 16-bit up-counter with one compare channel
///
/// Time only moves when the test calls [`MockTimer::tick`] or
/// [`MockTimer::advance`].
pub(crate) struct MockTimer {
    counter: AtomicU16,
    period: AtomicU16,
    compare: AtomicU16,
    running: AtomicBool,
    irq_enabled: AtomicU8,
    flags: AtomicU8,
    prescaler: AtomicU32,
    clock_enabled: AtomicBool,
    resets: AtomicU32,
    /// How many times the test harness entered the interrupt handler
    interrupts: AtomicU32,
    /// Counts that slip by during the next compare write
    compare_lag: AtomicU16,
}

const fn bit(source: IrqSource) -> u8 {
    match source {
        IrqSource::Overflow => 1 << 0,
        IrqSource::Compare => 1 << 1,
    }
}

impl MockTimer {
    pub(crate) const fn new() -> MockTimer {
        MockTimer {
            counter: AtomicU16::new(0),
            period: AtomicU16::new(u16::MAX),
            compare: AtomicU16::new(0),
            running: AtomicBool::new(false),
            irq_enabled: AtomicU8::new(0),
            flags: AtomicU8::new(0),
            prescaler: AtomicU32::new(1),
            clock_enabled: AtomicBool::new(false),
            resets: AtomicU32::new(0),
            interrupts: AtomicU32::new(0),
            compare_lag: AtomicU16::new(0),
        }
    }

    /// Make a mock that lives forever, as a scheduler needs
    pub(crate) fn leak() -> &'static MockTimer {
        Box::leak(Box::new(MockTimer::new()))
    }

    /// Jump the counter to the given value without raising any flags
    pub(crate) fn set_counter(&self, value: u16) {
        self.counter.store(value, Ordering::SeqCst);
    }

    /// Make the next `set_compare` take `counts` ticks to land
    ///
    /// The counter jumps forward without raising any flags, so a target
    /// inside the gap is missed, as it would be on real hardware.
    pub(crate) fn lag_next_compare(&self, counts: u16) {
        self.compare_lag.store(counts, Ordering::SeqCst);
    }

    /// Advance the counter by one count, if it is running
    pub(crate) fn tick(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }
        let current = self.counter.load(Ordering::SeqCst);
        let next = if current == self.period.load(Ordering::SeqCst) {
            self.flags.fetch_or(bit(IrqSource::Overflow), Ordering::SeqCst);
            0
        } else {
            current + 1
        };
        self.counter.store(next, Ordering::SeqCst);
        if next == self.compare.load(Ordering::SeqCst) {
            self.flags.fetch_or(bit(IrqSource::Compare), Ordering::SeqCst);
        }
    }

    /// Set a status flag, as the hardware would
    pub(crate) fn raise(&self, source: IrqSource) {
        self.flags.fetch_or(bit(source), Ordering::SeqCst);
    }

    /// Would the NVIC be taking an interrupt right now?
    pub(crate) fn irq_pending(&self) -> bool {
        self.flags.load(Ordering::SeqCst) & self.irq_enabled.load(Ordering::SeqCst) != 0
    }

    /// Run the interrupt handler for as long as the peripheral asks for it
    pub(crate) fn service(&self, scheduler: &Scheduler) {
        let mut rounds = 0;
        while self.irq_pending() {
            self.interrupts.fetch_add(1, Ordering::SeqCst);
            scheduler.on_interrupt();
            rounds += 1;
            assert!(rounds < 16, "interrupt handler never cleared its flags");
        }
    }

    /// Let `millis` counts go by, servicing interrupts after each one
    pub(crate) fn advance(&self, scheduler: &Scheduler, millis: u32) {
        self.service(scheduler);
        for _ in 0..millis {
            self.tick();
            self.service(scheduler);
        }
    }

    pub(crate) fn compare(&self) -> u16 {
        self.compare.load(Ordering::SeqCst)
    }

    pub(crate) fn period(&self) -> u16 {
        self.period.load(Ordering::SeqCst)
    }

    pub(crate) fn prescaler(&self) -> u32 {
        self.prescaler.load(Ordering::SeqCst)
    }

    pub(crate) fn clock_enabled(&self) -> bool {
        self.clock_enabled.load(Ordering::SeqCst)
    }

    pub(crate) fn resets(&self) -> u32 {
        self.resets.load(Ordering::SeqCst)
    }

    pub(crate) fn interrupts(&self) -> u32 {
        self.interrupts.load(Ordering::SeqCst)
    }
}

impl TimerHardware for MockTimer {
    fn enable_clock(&self) {
        self.clock_enabled.store(true, Ordering::SeqCst);
    }

    fn reset(&self) {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.counter.store(0, Ordering::SeqCst);
        self.compare.store(0, Ordering::SeqCst);
        self.period.store(u16::MAX, Ordering::SeqCst);
        self.running.store(false, Ordering::SeqCst);
        self.irq_enabled.store(0, Ordering::SeqCst);
        self.flags.store(0, Ordering::SeqCst);
        self.prescaler.store(1, Ordering::SeqCst);
    }

    fn set_prescaler(&self, divisor: u32) {
        self.prescaler.store(divisor, Ordering::SeqCst);
    }

    fn set_period(&self, top: u16) {
        self.period.store(top, Ordering::SeqCst);
    }

    fn enable_irq(&self, source: IrqSource) {
        self.irq_enabled.fetch_or(bit(source), Ordering::SeqCst);
    }

    fn disable_irq(&self, source: IrqSource) {
        self.irq_enabled.fetch_and(!bit(source), Ordering::SeqCst);
    }

    fn irq_enabled(&self, source: IrqSource) -> bool {
        self.irq_enabled.load(Ordering::SeqCst) & bit(source) != 0
    }

    fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn counter(&self) -> u16 {
        self.counter.load(Ordering::SeqCst)
    }

    fn set_compare(&self, value: u16) {
        self.compare.store(value, Ordering::SeqCst);
        let lag = self.compare_lag.swap(0, Ordering::SeqCst);
        self.counter.fetch_add(lag, Ordering::SeqCst);
    }

    fn flag(&self, source: IrqSource) -> bool {
        self.flags.load(Ordering::SeqCst) & bit(source) != 0
    }

    fn clear_flag(&self, source: IrqSource) {
        self.flags.fetch_and(!bit(source), Ordering::SeqCst);
    }

    fn trigger_compare(&self) {
        self.raise(IrqSource::Compare);
    }
}

// End of File
