//! Contains the [`Scheduler`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::sync::atomic::{AtomicBool, AtomicPtr, Ordering};

use crate::critical::IrqGuard;
use crate::fmt::{debug, info, trace};
use crate::hardware::{COUNTER_MAX, IrqSource, TimerHardware};
use crate::queue::{PendingQueue, Timeout, TimeoutCallback};
use crate::time_base::{LogicalTime, TimeBase};

/// The location of our one and only installed [`Scheduler`] object.
///
/// We need this so that the free-standing interrupt handler knows where all
/// our system state is.
static SCHEDULER_PTR: AtomicPtr<Scheduler> = AtomicPtr::new(core::ptr::null_mut());

/// Store `scheduler` in `slot`, unless something is already there
///
/// Returns `false` if the slot was taken.
fn claim_slot(slot: &AtomicPtr<Scheduler>, scheduler: *mut Scheduler) -> bool {
    critical_section::with(|_| {
        if slot.load(Ordering::Acquire).is_null() {
            slot.store(scheduler, Ordering::Release);
            true
        } else {
            false
        }
    })
}

/// Ticks per second we ask the prescaler for
const TICK_HZ: u32 = 1000;

/// Reasons [`Scheduler::schedule`] can refuse an entry
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScheduleError {
    /// The entry is still waiting to fire
    AlreadyPending,
    /// [`Scheduler::init`] hasn't been called
    NotInitialised,
}

impl core::fmt::Display for ScheduleError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ScheduleError::AlreadyPending => write!(fmt, "timeout is already pending"),
            ScheduleError::NotInitialised => write!(fmt, "timeout scheduler not initialised"),
        }
    }
}

/// Calls callbacks at (or shortly after) their deadlines, using one hardware
/// timer
///
/// The timer counts milliseconds. Its overflow interrupt extends the counter
/// into a [`LogicalTime`], and its compare channel is kept programmed with
/// the deadline at the head of the pending queue. When nothing is pending,
/// the counter is stopped and the compare interrupt is off.
pub struct Scheduler {
    /// The timer peripheral
    hw: &'static dyn TimerHardware,
    /// What the peripheral is clocked at, in Hz
    input_clock_hz: u32,
    /// Epoch-extended clock
    time: TimeBase,
    /// Everything waiting to fire, soonest first
    queue: PendingQueue,
    /// Has `init` run?
    initialised: AtomicBool,
}

impl Scheduler {
    /// Build the scheduler
    ///
    /// `input_clock_hz` is the frequency of the clock feeding the timer's
    /// prescaler.
    pub const fn new(hw: &'static dyn TimerHardware, input_clock_hz: u32) -> Scheduler {
        // Cannot make a millisecond tick from a slower clock
        assert!(input_clock_hz >= TICK_HZ);
        Scheduler {
            hw,
            input_clock_hz,
            time: TimeBase::new(),
            queue: PendingQueue::new(),
            initialised: AtomicBool::new(false),
        }
    }

    /// Configure the timer for a free-running millisecond count
    ///
    /// You may only call this once, and must call it before
    /// [`Scheduler::schedule`]. The platform must route the timer's interrupt
    /// to [`Scheduler::on_interrupt`] (or to [`crate::interrupt_handler`], if
    /// you used [`Scheduler::install`]).
    pub fn init(&self) {
        // No compare-and-swap on Armv6-M, so check-then-set with interrupts off
        let was_initialised = critical_section::with(|_| {
            let was_initialised = self.initialised.load(Ordering::Acquire);
            self.initialised.store(true, Ordering::Release);
            was_initialised
        });
        if was_initialised {
            panic!("Tried to re-initialise timeout scheduler!");
        }

        let divisor = self.input_clock_hz / TICK_HZ;
        info!(
            "Timer input {=u32} Hz, prescale /{=u32}",
            self.input_clock_hz,
            divisor
        );

        self.hw.enable_clock();
        self.hw.reset();
        self.hw.set_prescaler(divisor);
        self.hw.set_period(COUNTER_MAX);
        self.hw.enable_irq(IrqSource::Overflow);
        self.hw.start();
    }

    /// Make this the scheduler that [`crate::interrupt_handler`],
    /// [`crate::schedule`] and [`crate::now`] talk to, then initialise it
    ///
    /// You may only call this once.
    pub fn install(&'static self) {
        let self_addr = self as *const Scheduler as *mut Scheduler;
        if !claim_slot(&SCHEDULER_PTR, self_addr) {
            panic!("Tried to install a second timeout scheduler!");
        }
        info!("Scheduler @ {=usize:08x}", self_addr as usize);

        // Must do this /after/ setting SCHEDULER_PTR because the interrupt
        // handler will use SCHEDULER_PTR
        self.init();
    }

    /// Get the installed scheduler, if there is one
    pub(crate) fn get_scheduler() -> Option<&'static Scheduler> {
        let scheduler_ptr = SCHEDULER_PTR.load(Ordering::Acquire);
        if scheduler_ptr.is_null() {
            None
        } else {
            // SAFETY: Only [`Scheduler::install`] writes to [`SCHEDULER_PTR`]
            // and it always sets it to a `&'static Scheduler`.
            Some(unsafe { &*scheduler_ptr })
        }
    }

    /// Get the current logical time
    pub fn now(&self) -> LogicalTime {
        self.time.now(self.hw)
    }

    /// Arrange for `callback(arg)` to be called, in interrupt context, no
    /// earlier than `delay_ms` milliseconds from now
    ///
    /// Entries with the same deadline fire in the order they were scheduled.
    /// A delay of zero fires at the next opportunity. Inside a callback that
    /// is the same interrupt, so an entry that always re-schedules itself with
    /// zero delay keeps the interrupt handler busy forever.
    pub fn schedule(
        &self,
        entry: &'static Timeout,
        delay_ms: u32,
        callback: TimeoutCallback,
        arg: *mut (),
    ) -> Result<(), ScheduleError> {
        if !self.initialised.load(Ordering::Acquire) {
            return Err(ScheduleError::NotInitialised);
        }

        let is_head = {
            let guard = IrqGuard::acquire();
            let cs = guard.token();
            if entry.is_pending() {
                return Err(ScheduleError::AlreadyPending);
            }
            let deadline = self.now().add_millis(delay_ms);
            entry.prepare(deadline, callback, arg);
            trace!("Insert timeout for {}", deadline);
            self.queue.insert(cs, entry)
        };

        if is_head && self.rearm() {
            // Already due - get the interrupt handler to dispatch it
            self.hw.trigger_compare();
        }
        Ok(())
    }

    /// Handle the timer interrupt
    ///
    /// Counts overflows, calls every callback whose deadline has passed, and
    /// rearms the hardware for whatever is left.
    pub fn on_interrupt(&self) {
        if self.hw.flag(IrqSource::Overflow) {
            self.hw.clear_flag(IrqSource::Overflow);
            self.time.tick();
            trace!("Overflow, epoch {=u32}", self.time.epoch());
        }

        if self.hw.irq_enabled(IrqSource::Compare) && self.hw.flag(IrqSource::Compare) {
            self.hw.clear_flag(IrqSource::Compare);
            loop {
                self.dispatch_expired();
                if !self.rearm() {
                    break;
                }
            }
        }
    }

    /// Is the hardware counting towards a deadline?
    pub fn is_armed(&self) -> bool {
        self.hw.is_running() && self.hw.irq_enabled(IrqSource::Compare)
    }

    /// How many timeouts are waiting to fire
    pub fn pending(&self) -> usize {
        let guard = IrqGuard::acquire();
        self.queue.iter(guard.token()).count()
    }

    /// Call every callback that is due
    ///
    /// Time is re-read after every callback, because callbacks take time.
    fn dispatch_expired(&self) {
        loop {
            let entry = {
                let guard = IrqGuard::acquire();
                let now = self.now();
                self.queue.pop_expired(guard.token(), now)
            };
            let Some(entry) = entry else {
                break;
            };
            debug!("Fire timeout for {}", entry.deadline());
            entry.fire();
        }
    }

    /// Point the hardware at the head of the queue, or switch it off if the
    /// queue is empty
    ///
    /// Returns `true` if the head was already due by the time the compare
    /// channel was programmed, in which case the compare match may have been
    /// missed.
    fn rearm(&self) -> bool {
        let guard = IrqGuard::acquire();
        match self.queue.head(guard.token()) {
            None => {
                self.hw.disable_irq(IrqSource::Compare);
                self.hw.stop();
                debug!("Idle");
                false
            }
            Some(head) => {
                let deadline = head.deadline();
                if !self.hw.irq_enabled(IrqSource::Compare) {
                    // Throw away any match from while we weren't listening
                    self.hw.clear_flag(IrqSource::Compare);
                }
                self.hw.set_compare(deadline.counter());
                self.hw.enable_irq(IrqSource::Compare);
                self.hw.start();
                debug!("Armed for {}", deadline);
                deadline <= self.now()
            }
        }
    }
}


// End of File
