//! Build script for the timeouts crate
//!
//! Emits the `arm_architecture` / `arm_abi` cfgs so the time base can tell
//! whether the target has atomic read-modify-write instructions.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: GPL-3.0-or-later

/// Entry point to the build script
fn main() {
    arm_targets::process();
}

// End of File
