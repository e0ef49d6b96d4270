//! Holds the [`Stm32GpTimer`] type
//!
//! Drives one of the 16-bit general-purpose timers (TIM3, TIM4, ...) found on
//! STM32F1/F2/F4 parts, using compare channel 1.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

use vcell::VolatileCell;

use crate::hardware::{IrqSource, TimerHardware};

/// `CR1.CEN` - counter enable
const CR1_CEN: u32 = 1 << 0;
/// `CR1.URS` - only counter overflow raises the update flag
const CR1_URS: u32 = 1 << 2;
/// `EGR.UG` - generate an update event
const EGR_UG: u32 = 1 << 0;
/// `EGR.CC1G` - generate a channel 1 compare event
const EGR_CC1G: u32 = 1 << 1;

/// The largest prescale divisor `PSC` can express
const MAX_DIVISOR: u32 = 0x1_0000;

/// The layout of a general-purpose timer's registers
#[repr(C)]
pub struct RegisterBlock {
    /// Control register 1 (0x00)
    pub cr1: VolatileCell<u32>,
    /// Control register 2 (0x04)
    pub cr2: VolatileCell<u32>,
    /// Slave mode control register (0x08)
    pub smcr: VolatileCell<u32>,
    /// DMA/interrupt enable register (0x0C)
    pub dier: VolatileCell<u32>,
    /// Status register (0x10)
    pub sr: VolatileCell<u32>,
    /// Event generation register (0x14)
    pub egr: VolatileCell<u32>,
    /// Capture/compare mode register 1 (0x18)
    pub ccmr1: VolatileCell<u32>,
    /// Capture/compare mode register 2 (0x1C)
    pub ccmr2: VolatileCell<u32>,
    /// Capture/compare enable register (0x20)
    pub ccer: VolatileCell<u32>,
    /// Counter (0x24)
    pub cnt: VolatileCell<u32>,
    /// Prescaler (0x28)
    pub psc: VolatileCell<u32>,
    /// Auto-reload register (0x2C)
    pub arr: VolatileCell<u32>,
    /// Repetition counter register (0x30), reserved on general-purpose timers
    pub rcr: VolatileCell<u32>,
    /// Capture/compare register 1 (0x34)
    pub ccr1: VolatileCell<u32>,
    /// Capture/compare register 2 (0x38)
    pub ccr2: VolatileCell<u32>,
    /// Capture/compare register 3 (0x3C)
    pub ccr3: VolatileCell<u32>,
    /// Capture/compare register 4 (0x40)
    pub ccr4: VolatileCell<u32>,
}

/// The bit for an interrupt cause
///
/// It's the same bit in `DIER` (enable) and `SR` (flag).
const fn irq_bit(source: IrqSource) -> u32 {
    match source {
        IrqSource::Overflow => 1 << 0,
        IrqSource::Compare => 1 << 1,
    }
}

/// The RCC clock-enable and reset bits for one peripheral
pub struct RccGate {
    enable: *const VolatileCell<u32>,
    reset: *const VolatileCell<u32>,
    mask: u32,
}

impl RccGate {
    /// Describe the gate at bit `bit` of the given RCC enable and reset
    /// registers (e.g. `APB1ENR` and `APB1RSTR`)
    ///
    /// # Safety
    ///
    /// Both pointers must point at the real registers, or at memory that
    /// lives forever.
    pub const unsafe fn new(
        enable: *const VolatileCell<u32>,
        reset: *const VolatileCell<u32>,
        bit: u8,
    ) -> RccGate {
        RccGate {
            enable,
            reset,
            mask: 1 << bit,
        }
    }

    fn enable_reg(&self) -> &VolatileCell<u32> {
        // SAFETY: checked by the caller of `RccGate::new`
        unsafe { &*self.enable }
    }

    fn reset_reg(&self) -> &VolatileCell<u32> {
        // SAFETY: checked by the caller of `RccGate::new`
        unsafe { &*self.reset }
    }
}

/// A general-purpose STM32 timer, counting up through its full 16-bit range
pub struct Stm32GpTimer {
    regs: *const RegisterBlock,
    rcc: RccGate,
}

impl Stm32GpTimer {
    /// Wrap the timer at `regs`, gated by `rcc`
    ///
    /// # Safety
    ///
    /// `regs` must point at a general-purpose timer's registers (or at
    /// memory that lives forever), and nothing else may drive that timer.
    pub const unsafe fn new(regs: *const RegisterBlock, rcc: RccGate) -> Stm32GpTimer {
        Stm32GpTimer { regs, rcc }
    }

    fn regs(&self) -> &RegisterBlock {
        // SAFETY: checked by the caller of `Stm32GpTimer::new`
        unsafe { &*self.regs }
    }
}

/// SAFETY: We only touch our own timer's registers, there is only one core,
/// and the scheduler masks interrupts around read-modify-write sequences that
/// both contexts use.
unsafe impl Sync for Stm32GpTimer {}

impl TimerHardware for Stm32GpTimer {
    fn enable_clock(&self) {
        let enr = self.rcc.enable_reg();
        enr.set(enr.get() | self.rcc.mask);
        // Read back, so the clock is running before we touch the timer
        let _ = enr.get();
    }

    fn reset(&self) {
        let rstr = self.rcc.reset_reg();
        rstr.set(rstr.get() | self.rcc.mask);
        rstr.set(rstr.get() & !self.rcc.mask);
    }

    fn set_prescaler(&self, divisor: u32) {
        assert!(
            (1..=MAX_DIVISOR).contains(&divisor),
            "Timer prescale divisor does not fit in PSC"
        );
        let regs = self.regs();
        regs.cr1.set(regs.cr1.get() | CR1_URS);
        regs.psc.set(divisor - 1);
        // PSC is buffered - load it now. URS stops this raising an overflow.
        regs.egr.set(EGR_UG);
    }

    fn set_period(&self, top: u16) {
        self.regs().arr.set(u32::from(top));
    }

    fn enable_irq(&self, source: IrqSource) {
        let dier = &self.regs().dier;
        dier.set(dier.get() | irq_bit(source));
    }

    fn disable_irq(&self, source: IrqSource) {
        let dier = &self.regs().dier;
        dier.set(dier.get() & !irq_bit(source));
    }

    fn irq_enabled(&self, source: IrqSource) -> bool {
        self.regs().dier.get() & irq_bit(source) != 0
    }

    fn start(&self) {
        let cr1 = &self.regs().cr1;
        cr1.set(cr1.get() | CR1_CEN);
    }

    fn stop(&self) {
        let cr1 = &self.regs().cr1;
        cr1.set(cr1.get() & !CR1_CEN);
    }

    fn is_running(&self) -> bool {
        self.regs().cr1.get() & CR1_CEN != 0
    }

    fn counter(&self) -> u16 {
        self.regs().cnt.get() as u16
    }

    fn set_compare(&self, value: u16) {
        self.regs().ccr1.set(u32::from(value));
    }

    fn flag(&self, source: IrqSource) -> bool {
        self.regs().sr.get() & irq_bit(source) != 0
    }

    fn clear_flag(&self, source: IrqSource) {
        // SR bits are rc_w0: writing one leaves them alone
        self.regs().sr.set(!irq_bit(source));
        // Make sure the write lands before we return from the interrupt,
        // or the NVIC sees the old flag and calls us again.
        #[cfg(target_arch = "arm")]
        cortex_m::asm::dsb();
    }

    fn trigger_compare(&self) {
        self.regs().egr.set(EGR_CC1G);
    }
}


// End of File
