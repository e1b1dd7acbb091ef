/*!
* Welcome to `ctf_bolts`
*
* Small building blocks for stack buffer overflow challenges: a fixed capacity
* stack buffer with a checked and an unchecked copy, unbuffered console streams,
* the flag disclosure routine and a payload builder for reference solutions.
*/
#![warn(clippy::cargo)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::cast_possible_truncation
)]
#![cfg_attr(not(test), warn(
    missing_debug_implementations,
    missing_docs,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
))]
#![cfg_attr(test, deny(
    missing_debug_implementations,
    missing_docs,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    unused_must_use,
))]

#[cfg(feature = "cli")]
pub mod cli;
pub mod console;
pub mod flag;
pub mod fs;
pub mod payload;
pub mod stackbuf;

use core::{
    fmt::{self, Display},
    num::ParseIntError,
};
use std::{
    io,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use log::{Metadata, Record};

/// Capacity of the vulnerable routine's stack buffer, in bytes.
pub const BUFFER_SIZE: usize = 64;

/// Exit status used when a checked copy refuses an oversized line.
///
/// Matches the status of a process killed by `SIGABRT` from a stack protector.
pub const BOUNDS_VIOLATION_EXIT_CODE: i32 = 134;

#[cfg(feature = "errors_backtrace")]
/// Error Backtrace type when `errors_backtrace` feature is enabled (== [`backtrace::Backtrace`])
pub type ErrorBacktrace = backtrace::Backtrace;

#[cfg(not(feature = "errors_backtrace"))]
#[derive(Debug, Default)]
/// Empty struct to use when `errors_backtrace` is disabled
pub struct ErrorBacktrace {}
#[cfg(not(feature = "errors_backtrace"))]
impl ErrorBacktrace {
    /// Nop
    #[must_use]
    pub fn new() -> Self {
        Self {}
    }
}

#[cfg(feature = "errors_backtrace")]
fn display_error_backtrace(f: &mut fmt::Formatter, err: &ErrorBacktrace) -> fmt::Result {
    write!(f, "\nBacktrace: {err:?}")
}
#[cfg(not(feature = "errors_backtrace"))]
#[allow(clippy::unnecessary_wraps)]
fn display_error_backtrace(_f: &mut fmt::Formatter, _err: &ErrorBacktrace) -> fmt::Result {
    fmt::Result::Ok(())
}

/// Main error struct for `ctf_bolts`
#[derive(Debug)]
pub enum Error {
    /// File related error
    File(io::Error, ErrorBacktrace),
    /// A checked copy was asked to store more than the buffer can hold
    BoundsViolation {
        /// Bytes that were about to be written, excluding the terminator
        len: usize,
        /// Capacity of the destination buffer, including the terminator
        capacity: usize,
        /// Where the copy was refused
        backtrace: ErrorBacktrace,
    },
    /// You're holding it wrong
    IllegalState(String, ErrorBacktrace),
    /// The argument passed to this method or function is not valid
    IllegalArgument(String, ErrorBacktrace),
    /// Something else happened
    Unknown(String, ErrorBacktrace),
}

impl Error {
    /// File related error
    #[must_use]
    pub fn file(arg: io::Error) -> Self {
        Error::File(arg, ErrorBacktrace::new())
    }
    /// A checked copy of `len` bytes does not fit into `capacity`
    #[must_use]
    pub fn bounds_violation(len: usize, capacity: usize) -> Self {
        Error::BoundsViolation {
            len,
            capacity,
            backtrace: ErrorBacktrace::new(),
        }
    }
    /// You're holding it wrong
    #[must_use]
    pub fn illegal_state<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::IllegalState(arg.into(), ErrorBacktrace::new())
    }
    /// The argument passed to this method or function is not valid
    #[must_use]
    pub fn illegal_argument<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::IllegalArgument(arg.into(), ErrorBacktrace::new())
    }
    /// Something else happened
    #[must_use]
    pub fn unknown<S>(arg: S) -> Self
    where
        S: Into<String>,
    {
        Error::Unknown(arg.into(), ErrorBacktrace::new())
    }

    /// `true` if this error is a refused checked copy
    #[must_use]
    pub fn is_bounds_violation(&self) -> bool {
        matches!(self, Self::BoundsViolation { .. })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::File(err, b) => {
                write!(f, "File IO failed: {:?}", &err)?;
                display_error_backtrace(f, b)
            }
            Self::BoundsViolation {
                len,
                capacity,
                backtrace,
            } => {
                write!(
                    f,
                    "{len} bytes (plus terminator) do not fit into a {capacity} byte buffer"
                )?;
                display_error_backtrace(f, backtrace)
            }
            Self::IllegalState(s, b) => {
                write!(f, "Illegal state: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::IllegalArgument(s, b) => {
                write!(f, "Illegal argument: {0}", &s)?;
                display_error_backtrace(f, b)
            }
            Self::Unknown(s, b) => {
                write!(f, "Unknown error: {0}", &s)?;
                display_error_backtrace(f, b)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::File(err, _) => Some(err),
            _ => None,
        }
    }
}

/// Create an Error from io Error
impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::file(err)
    }
}

#[cfg(unix)]
impl From<nix::Error> for Error {
    fn from(err: nix::Error) -> Self {
        Self::file(io::Error::from(err))
    }
}

impl From<ParseIntError> for Error {
    fn from(err: ParseIntError) -> Self {
        Self::illegal_argument(format!("Failed to parse Int: {err:?}"))
    }
}

/// Current time
#[must_use]
#[inline]
pub fn current_time() -> Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

/// Stderr logger
pub static CTF_STDERR_LOGGER: SimpleStderrLogger = SimpleStderrLogger::new();

/// A simple logger struct that logs to stderr when used with [`log::set_logger`].
///
/// Stdout carries the challenge transcript, so there is no stdout variant.
#[derive(Debug)]
pub struct SimpleStderrLogger {}

impl Default for SimpleStderrLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl SimpleStderrLogger {
    /// Create a new [`log::Log`] logger that will write logs to stderr
    #[must_use]
    pub const fn new() -> Self {
        Self {}
    }

    /// register stderr logger
    pub fn set_logger() -> Result<(), Error> {
        log::set_logger(&CTF_STDERR_LOGGER)
            .map_err(|_| Error::unknown("Failed to register logger"))
    }
}

impl log::Log for SimpleStderrLogger {
    #[inline]
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        eprintln!(
            "[{:?}] {}: {}",
            current_time(),
            record.level(),
            record.args()
        );
    }

    fn flush(&self) {}
}
