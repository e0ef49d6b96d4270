//! Holds the [`TimerHardware`] trait and [`IrqSource`] type

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// The largest value the free-running hardware counter can hold
///
/// The counter wraps from here back to zero, raising an overflow event.
pub const COUNTER_MAX: u16 = u16::MAX;

/// The two interrupt causes we care about on the timer peripheral
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqSource {
    /// The counter wrapped from [`COUNTER_MAX`] to zero
    Overflow,
    /// The counter reached the programmed compare target
    Compare,
}

/// Everything the scheduler needs from a timer peripheral
///
/// One implementor drives one peripheral with one 16-bit up-counter and one
/// compare channel. All methods take `&self` because they are register
/// accesses, and the scheduler calls them from both foreground and interrupt
/// context.
pub trait TimerHardware: Sync {
    /// Turn on the bus clock for the peripheral
    fn enable_clock(&self);

    /// Put the peripheral back into its reset state
    fn reset(&self);

    /// Divide the input clock by `divisor` before it reaches the counter
    fn set_prescaler(&self, divisor: u32);

    /// Set the value at which the counter wraps back to zero
    fn set_period(&self, top: u16);

    /// Allow the given cause to raise an interrupt
    fn enable_irq(&self, source: IrqSource);

    /// Stop the given cause from raising an interrupt
    fn disable_irq(&self, source: IrqSource);

    /// Is the given cause currently allowed to raise an interrupt?
    fn irq_enabled(&self, source: IrqSource) -> bool;

    /// Start the free-running counter
    fn start(&self);

    /// Stop the free-running counter, leaving its value in place
    fn stop(&self);

    /// Is the counter running?
    fn is_running(&self) -> bool;

    /// Read the live counter value
    fn counter(&self) -> u16;

    /// Program the compare-channel target
    fn set_compare(&self, value: u16);

    /// Is the status flag for this cause set?
    fn flag(&self, source: IrqSource) -> bool;

    /// Clear the status flag for this cause
    fn clear_flag(&self, source: IrqSource);

    /// Raise the compare-match flag in software
    ///
    /// If the compare interrupt is enabled, the interrupt becomes pending.
    fn trigger_compare(&self);
}

// End of File
