//! Common board support and panic/fault/timestamp handlers for the demos
//!
//! Targets the STM32F401 on a Nucleo-F401RE, running from the 16 MHz HSI
//! clock (the reset default), with TIM4 as the timeout timer.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]

use defmt_semihosting as _;
use timeouts::Scheduler;
use timeouts::stm32::{RccGate, RegisterBlock, Stm32GpTimer};
use vcell::VolatileCell;

/// Where TIM4's registers live
const TIM4_ADDR: usize = 0x4000_0800;
/// RCC APB1 peripheral reset register
const RCC_APB1RSTR_ADDR: usize = 0x4002_3820;
/// RCC APB1 peripheral clock enable register
const RCC_APB1ENR_ADDR: usize = 0x4002_3840;
/// TIM4's bit in the two APB1 registers above
const RCC_APB1_TIM4_BIT: u8 = 2;
/// TIM4's position in the NVIC
const TIM4_IRQ: u16 = 30;
/// How many device-specific interrupts the STM32F401 has, up to and including TIM4
const NUM_IRQS: usize = TIM4_IRQ as usize + 1;

/// APB1 timer clock - HSI, with no bus prescaling
pub const TIMER_CLOCK_HZ: u32 = 16_000_000;

/// SAFETY: these are the real TIM4 and RCC register addresses, and nothing
/// else in the demos touches TIM4.
static TIMER: Stm32GpTimer = unsafe {
    Stm32GpTimer::new(
        TIM4_ADDR as *const RegisterBlock,
        RccGate::new(
            RCC_APB1ENR_ADDR as *const VolatileCell<u32>,
            RCC_APB1RSTR_ADDR as *const VolatileCell<u32>,
            RCC_APB1_TIM4_BIT,
        ),
    )
};

/// The one and only timeout scheduler
pub static SCHEDULER: Scheduler = Scheduler::new(&TIMER, TIMER_CLOCK_HZ);

/// TIM4's interrupt number, for the NVIC
#[derive(Copy, Clone)]
struct Tim4Irq;

// SAFETY: 30 is TIM4's real interrupt number on the STM32F401
unsafe impl cortex_m::interrupt::InterruptNumber for Tim4Irq {
    fn number(self) -> u16 {
        TIM4_IRQ
    }
}

/// Install the scheduler and let TIM4 interrupt us
pub fn start() {
    SCHEDULER.install();
    // SAFETY: the TIM4 handler only touches the scheduler, which guards its
    // own state.
    unsafe {
        cortex_m::peripheral::NVIC::unmask(Tim4Irq);
    }
}

/// TIM4 global interrupt
#[unsafe(no_mangle)]
unsafe extern "C" fn TIM4() {
    timeouts::interrupt_handler();
}

unsafe extern "C" {
    /// Provided by cortex-m-rt
    fn DefaultHandler();
}

/// The device-specific part of the vector table
#[unsafe(link_section = ".vector_table.interrupts")]
#[unsafe(no_mangle)]
static __INTERRUPTS: [unsafe extern "C" fn(); NUM_IRQS] = {
    let mut vectors = [DefaultHandler as unsafe extern "C" fn(); NUM_IRQS];
    vectors[TIM4_IRQ as usize] = TIM4;
    vectors
};

/// Called when a panic occurs.
///
/// Logs the panic to defmt and then crashes the CPU.
#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    defmt::println!("PANIC: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

/// Called when a HardFault occurs.
///
/// Logs the fault to defmt and then crashes the CPU.
#[cortex_m_rt::exception]
unsafe fn HardFault(info: &cortex_m_rt::ExceptionFrame) -> ! {
    defmt::println!("FAULT: {}", defmt::Debug2Format(info));
    cortex_m::asm::udf();
}

// Log the timeout clock in the defmt logs
defmt::timestamp!("{=u64:010}", timeouts::now().as_millis());

// End of File
