//! A heartbeat that re-arms its own timeout every half second

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

#![no_std]
#![no_main]

use core::sync::atomic::{AtomicU32, Ordering};

use timeouts::Timeout;

use timeouts_demos as _;

const PERIOD_MS: u32 = 500;
const BEATS_TO_RUN: u32 = 10;

static HEARTBEAT: Timeout = Timeout::new();
static BEATS: AtomicU32 = AtomicU32::new(0);

#[cortex_m_rt::entry]
fn main() -> ! {
    defmt::info!("Hello!");
    timeouts_demos::start();

    if let Err(e) = timeouts::schedule(&HEARTBEAT, PERIOD_MS, heartbeat, core::ptr::null_mut()) {
        defmt::panic!("Could not arm heartbeat: {}", e);
    }

    loop {
        if BEATS.load(Ordering::Relaxed) >= BEATS_TO_RUN {
            defmt::info!("Done, timer armed = {=bool}", timeouts_demos::SCHEDULER.is_armed());
            semihosting::process::exit(0);
        }
        cortex_m::asm::wfi();
    }
}

/// Runs in the TIM4 interrupt
fn heartbeat(_arg: *mut ()) {
    let beat = BEATS.fetch_add(1, Ordering::Relaxed) + 1;
    defmt::info!("Beat {=u32}", beat);
    if beat < BEATS_TO_RUN {
        if let Err(e) = timeouts::schedule(&HEARTBEAT, PERIOD_MS, heartbeat, core::ptr::null_mut())
        {
            defmt::error!("Could not re-arm heartbeat: {}", e);
        }
    }
}

// End of File
