//! Puts the demo linker scripts where the linker can see them
//!
//! The library crate doesn't need any of this.

// Copyright (c) 2025 Ferrous Systems
// SPDX-License-Identifier: CC0-1.0

use std::{env, error::Error, fs, path::PathBuf};

/// Scripts that `link.x` pulls in by name
const LINKER_SCRIPTS: [&str; 2] = ["memory.x", "device.x"];

fn main() -> Result<(), Box<dyn Error>> {
    let out_dir = PathBuf::from(env::var("OUT_DIR")?);
    for script in LINKER_SCRIPTS {
        // Cargo doesn't always put the package root on the search path
        fs::copy(script, out_dir.join(script))?;
        println!("cargo::rerun-if-changed={script}");
    }
    println!("cargo::rustc-link-search={}", out_dir.display());
    Ok(())
}

// End of File
