//! The challenge binary.
//!
//! Configuration comes from the command line, then `CHALLENGE_*` variables, then the build:
//! a build with the `unprotected` feature copies unchecked by default.
#![deny(clippy::pedantic)]

use std::{hint, process};

use clap::Parser;
use ctf_bolts::{
    cli::{parse_envs, ChallengeOptions},
    console::{self, Console, ConsoleIn},
    flag::{self, FLAG_FILE},
    stackbuf::BoundsMode,
    BOUNDS_VIOLATION_EXIT_CODE,
};
use ctf_challenge::{default_bounds, run, stack_layout};

/// Discloses `flag.txt` on stdout. Never called by the challenge itself.
///
/// Exported unmangled so its address can be looked up in the binary and used as a
/// return target.
#[no_mangle]
#[inline(never)]
pub extern "C" fn print_flag() {
    if let Err(err) = flag::print_flag(FLAG_FILE, &mut Console::stdout()) {
        log::error!("Failed to disclose the flag: {err}");
    }
}

fn main() {
    env_logger::init();

    let mut options = ChallengeOptions::parse();
    let config = match parse_envs(&mut options, default_bounds()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("invalid configuration: {err}");
            process::exit(2);
        }
    };

    // Nothing calls it; taking the address keeps the symbol in the link
    let target = hint::black_box(print_flag as extern "C" fn());
    log::debug!("print_flag is at {:p}", target as *const ());

    if let Err(err) = console::disable_buffering() {
        log::warn!("Could not switch to unbuffered streams: {err}");
    }
    log::info!(
        "Starting challenge: bounds {}, flag at {}",
        config.bounds,
        config.flag_file.display()
    );
    if config.bounds == BoundsMode::Unchecked {
        if let Some(offset) = stack_layout() {
            log::debug!("The saved return address is {offset} bytes past the start of the buffer");
        }
    }

    match run(&config, &mut ConsoleIn::stdin(), &mut Console::stdout()) {
        Ok(()) => {}
        Err(err) if err.is_bounds_violation() => {
            eprintln!("*** bounds violation detected ***: {err}");
            process::exit(BOUNDS_VIOLATION_EXIT_CODE);
        }
        Err(err) => {
            log::error!("Challenge failed: {err}");
            process::exit(1);
        }
    }
}
