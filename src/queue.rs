//! Holds the [`Timeout`] entry type and the [`PendingQueue`]
//!
//! The queue is intrusive: each [`Timeout`] carries its own link, and the
//! queue only ever re-points links between entries that the application owns.
//! Entries are borrowed for `'static`, which is how we know an entry is still
//! there when its deadline comes round.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use core::cell::Cell;

use critical_section::{CriticalSection, Mutex};

use crate::time_base::LogicalTime;

/// The function called when a timeout expires
///
/// It runs in interrupt context, so it must be short and must not block. The
/// argument is whatever pointer was handed to `schedule`.
///
/// A callback may schedule its own entry again. With a delay of zero the
/// entry is due straight away and fires again before the interrupt returns,
/// so a callback that always does this never lets the interrupt finish.
pub type TimeoutCallback = fn(*mut ());

/// Placeholder callback for entries that have never been scheduled
fn no_callback(_arg: *mut ()) {}

/// One pending (or previously pending) timeout
///
/// Put these in a `static` and hand them to `schedule`. While an entry is
/// pending the scheduler owns its fields. Once its callback has been called,
/// the entry is yours again and can be scheduled again, even from within its
/// own callback.
pub struct Timeout {
    /// When to fire
    deadline: Cell<LogicalTime>,
    /// What to call
    callback: Cell<TimeoutCallback>,
    /// What to call it with
    arg: Cell<*mut ()>,
    /// The next entry in the pending queue
    next: Cell<Option<&'static Timeout>>,
    /// Are we linked into the pending queue?
    pending: Cell<bool>,
}

impl Timeout {
    /// Create a new, unscheduled, [`Timeout`]
    pub const fn new() -> Timeout {
        Timeout {
            deadline: Cell::new(LogicalTime::ZERO),
            callback: Cell::new(no_callback as TimeoutCallback),
            arg: Cell::new(core::ptr::null_mut()),
            next: Cell::new(None),
            pending: Cell::new(false),
        }
    }

    /// The deadline this entry was last scheduled for
    pub fn deadline(&self) -> LogicalTime {
        self.deadline.get()
    }

    /// Is this entry waiting to fire?
    pub fn is_pending(&self) -> bool {
        self.pending.get()
    }

    /// Fill in everything but the link
    ///
    /// Only valid while the entry is not pending.
    pub(crate) fn prepare(&self, deadline: LogicalTime, callback: TimeoutCallback, arg: *mut ()) {
        self.deadline.set(deadline);
        self.callback.set(callback);
        self.arg.set(arg);
    }

    /// Call the callback
    pub(crate) fn fire(&self) {
        let callback = self.callback.get();
        callback(self.arg.get());
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Timeout::new()
    }
}

/// SAFETY: The fields are only written by the owner while the entry is not
/// pending, or by the scheduler while holding a critical section. There is
/// only one core.
unsafe impl Sync for Timeout {}

/// A deadline-sorted, singly-linked list of [`Timeout`] entries
///
/// Entries with equal deadlines stay in the order they were inserted.
pub struct PendingQueue {
    head: Mutex<Cell<Option<&'static Timeout>>>,
}

impl PendingQueue {
    /// Create an empty queue
    pub const fn new() -> PendingQueue {
        PendingQueue {
            head: Mutex::new(Cell::new(None)),
        }
    }

    /// Link `entry` in, after every entry with a deadline at or before its own
    ///
    /// Returns `true` if `entry` is now the head of the queue. The entry must
    /// not already be pending.
    pub fn insert(&self, cs: CriticalSection<'_>, entry: &'static Timeout) -> bool {
        let deadline = entry.deadline.get();
        let mut prev: Option<&'static Timeout> = None;
        let mut cursor = self.head.borrow(cs).get();
        while let Some(node) = cursor {
            if node.deadline.get() > deadline {
                break;
            }
            prev = Some(node);
            cursor = node.next.get();
        }

        entry.next.set(cursor);
        entry.pending.set(true);
        match prev {
            Some(prev) => {
                prev.next.set(Some(entry));
                false
            }
            None => {
                self.head.borrow(cs).set(Some(entry));
                true
            }
        }
    }

    /// Unlink and return the head, if its deadline is at or before `now`
    ///
    /// Call this repeatedly to drain the expired prefix of the queue. Each
    /// call can be given a fresher `now`.
    pub fn pop_expired(
        &self,
        cs: CriticalSection<'_>,
        now: LogicalTime,
    ) -> Option<&'static Timeout> {
        let head = self.head.borrow(cs);
        let entry = head.get().filter(|entry| entry.deadline.get() <= now)?;
        head.set(entry.next.take());
        entry.pending.set(false);
        Some(entry)
    }

    /// The entry with the earliest deadline
    pub fn head(&self, cs: CriticalSection<'_>) -> Option<&'static Timeout> {
        self.head.borrow(cs).get()
    }

    /// Walk the queue from head to tail
    pub fn iter<'cs>(
        &'cs self,
        cs: CriticalSection<'cs>,
    ) -> impl Iterator<Item = &'static Timeout> + 'cs {
        core::iter::successors(self.head(cs), |entry| entry.next.get())
    }
}

impl Default for PendingQueue {
    fn default() -> Self {
        PendingQueue::new()
    }
}


// End of File
