//! Schedules four timeouts out of order and checks they fire in deadline
//! order, with ties going to whoever asked first

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::cell::RefCell;

use critical_section::Mutex;
use timeouts::Timeout;

use timeouts_demos as _;

/// Who to schedule, and how far in the future
static PLAN: [(&str, u32); 4] = [("rabbit", 100), ("hamster", 50), ("cat", 50), ("dog", 0)];

/// The order we expect them back in
const EXPECTED: [&str; 4] = ["dog", "hamster", "cat", "rabbit"];

static ENTRIES: [Timeout; 4] = [const { Timeout::new() }; 4];

static FIRED: Mutex<RefCell<heapless::Vec<&'static str, 4>>> =
    Mutex::new(RefCell::new(heapless::Vec::new()));

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("Hello!");
    timeouts_demos::start();

    for (entry, (name, delay_ms)) in ENTRIES.iter().zip(PLAN.iter()) {
        let arg = name as *const &'static str as *mut ();
        if let Err(e) = timeouts::schedule(entry, *delay_ms, record, arg) {
            defmt::panic!("Could not schedule {=str}: {}", name, e);
        }
    }
    defmt::info!("{=usize} pending", timeouts_demos::SCHEDULER.pending());

    loop {
        let done = critical_section::with(|cs| {
            let fired = FIRED.borrow_ref(cs);
            (fired.len() == EXPECTED.len()).then(|| fired.as_slice() == EXPECTED)
        });
        match done {
            Some(true) => {
                defmt::info!("All fired in order");
                semihosting::process::exit(0);
            }
            Some(false) => {
                defmt::error!("Fired out of order!");
                semihosting::process::exit(1);
            }
            None => cortex_m::asm::wfi(),
        }
    }
}

/// Runs in the TIM4 interrupt
fn record(arg: *mut ()) {
    // SAFETY: every `arg` we hand out points at a name in PLAN
    let name = unsafe { *(arg as *const &'static str) };
    defmt::info!("{=str} fired", name);
    critical_section::with(|cs| {
        if FIRED.borrow_ref_mut(cs).push(name).is_err() {
            defmt::error!("Too many callbacks!");
        }
    });
}

// End of File
