//! Holds the [`IrqGuard`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use critical_section::{CriticalSection, RestoreState};

/// Masks interrupts for as long as it is alive
///
/// Dropping the guard puts the interrupt mask back the way it was when the
/// guard was acquired, so guards may nest. They must be dropped in the
/// reverse order to which they were acquired, which is what happens when they
/// are held in local variables.
pub struct IrqGuard {
    state: RestoreState,
    /// Guards must not cross contexts
    _not_send: core::marker::PhantomData<*mut ()>,
}

impl IrqGuard {
    /// Mask interrupts
    pub fn acquire() -> IrqGuard {
        // SAFETY: the matching release is in our Drop impl, and the guard
        // cannot be sent elsewhere, so acquire/release pairs nest properly.
        let state = unsafe { critical_section::acquire() };
        IrqGuard {
            state,
            _not_send: core::marker::PhantomData,
        }
    }

    /// Get a token proving interrupts are masked
    ///
    /// The token cannot outlive the guard.
    pub fn token(&self) -> CriticalSection<'_> {
        // SAFETY: interrupts stay masked until `self` is dropped, and the
        // token borrows `self`.
        unsafe { CriticalSection::new() }
    }
}

impl Drop for IrqGuard {
    fn drop(&mut self) {
        // SAFETY: `state` came from the `acquire` in `IrqGuard::acquire`
        unsafe { critical_section::release(self.state) }
    }
}


// End of File
