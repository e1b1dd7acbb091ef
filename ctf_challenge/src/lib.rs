//! The challenge: read a line into a 64 byte stack buffer, echo it, say goodbye.
//!
//! With [`BoundsMode::Unchecked`] the line is copied without looking at its length, so
//! anything from 64 bytes on runs over the buffer and into the rest of the stack frame.
//! That overrun is the exercise. [`BoundsMode::Checked`] refuses the same input with an
//! [`Error::BoundsViolation`] instead.
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::missing_errors_doc, clippy::module_name_repetitions)]
#![cfg_attr(not(test), warn(missing_debug_implementations, missing_docs))]

use std::io::{Read, Write};

use ctf_bolts::{
    cli::ChallengeConfig,
    console::read_line,
    flag::{print_flag, Disclosure},
    stackbuf::{BoundsMode, StackBuf},
    Error, BUFFER_SIZE,
};

/// First line of the transcript
pub const WELCOME: &str = "Welcome to the CTF challenge!\n";
/// Printed, and flushed, before blocking on input
pub const PROMPT: &str = "Enter your input: ";
/// Precedes the echoed line
pub const ECHO_PREFIX: &str = "You entered: ";
/// Last line of the transcript
pub const GOODBYE: &str = "Thanks for playing!\n";

/// The bounds mode this build uses unless configured otherwise
#[must_use]
pub fn default_bounds() -> BoundsMode {
    if cfg!(feature = "unprotected") {
        BoundsMode::Unchecked
    } else {
        BoundsMode::Checked
    }
}

/// Distance from `$buffer` to the saved return address of the current frame.
///
/// With frame pointers `rbp` holds the address of the saved frame pointer, and the return
/// address sits right above it. Expanded in place, so `rbp` belongs to the caller's frame.
#[cfg(all(target_arch = "x86_64", frame_pointers))]
macro_rules! return_address_offset {
    ($buffer:expr) => {{
        let frame: usize;
        // SAFETY: only copies `rbp` into a register
        unsafe {
            core::arch::asm!(
                "mov {}, rbp",
                out(reg) frame,
                options(nomem, nostack, preserves_flags)
            );
        }
        frame
            .wrapping_add(8)
            .checked_sub(core::ptr::addr_of!($buffer) as usize)
    }};
}

#[cfg(not(all(target_arch = "x86_64", frame_pointers)))]
macro_rules! return_address_offset {
    ($buffer:expr) => {{
        let _ = &$buffer;
        None
    }};
}

/// Copy `line` into a fresh stack buffer as `mode` prescribes, then append the buffer,
/// read as a C string, to `echo`.
///
/// The buffer is the only local of this frame; the caller owns the line and the echo.
/// Lines of [`BUFFER_SIZE`] bytes or more copied [`BoundsMode::Unchecked`] run over the
/// buffer towards the saved return address.
///
/// Returns how far that return address is from the start of the buffer, where it can be
/// measured.
#[inline(never)]
fn stack_echo(
    line: &[u8],
    mode: BoundsMode,
    echo: &mut Vec<u8>,
) -> Result<Option<usize>, Error> {
    let mut buffer = StackBuf::<BUFFER_SIZE>::new();
    // Either copy terminates the string, so the echo finds its NUL.
    unsafe {
        buffer.copy_with(line, mode)?;
        echo.extend_from_slice(buffer.as_c_str_unbounded().to_bytes());
    }
    Ok(return_address_offset!(buffer))
}

/// Distance in bytes from the start of the 64 byte buffer to the saved return address
/// behind it, the padding an overflow payload needs.
///
/// Only measured on `x86_64` builds with frame pointers, `None` elsewhere.
#[must_use]
pub fn stack_layout() -> Option<usize> {
    stack_echo(b"", BoundsMode::Checked, &mut Vec::new())
        .ok()
        .flatten()
}

/// Prompt, read one line into a stack buffer and echo it back.
///
/// The line is read into the heap first; only the copy into the 64 byte buffer happens in
/// a frame of its own, right below the saved return address the overrun is aimed at.
pub fn vulnerable_function<R, W>(
    input: &mut R,
    out: &mut W,
    mode: BoundsMode,
) -> Result<(), Error>
where
    R: Read,
    W: Write,
{
    out.write_all(WELCOME.as_bytes())?;
    out.write_all(PROMPT.as_bytes())?;
    out.flush()?;

    let line = read_line(input)?.unwrap_or_else(|| {
        log::debug!("End of input before any byte was read");
        Vec::new()
    });
    log::debug!("Read {} bytes, copying {mode}", line.len());

    let mut echo = Vec::with_capacity(ECHO_PREFIX.len() + line.len() + 1);
    echo.extend_from_slice(ECHO_PREFIX.as_bytes());
    stack_echo(&line, mode, &mut echo)?;
    echo.push(b'\n');
    out.write_all(&echo)?;
    out.flush()?;
    Ok(())
}

/// The whole challenge: the vulnerable routine once, optionally the flag, then goodbye.
pub fn run<R, W>(config: &ChallengeConfig, input: &mut R, out: &mut W) -> Result<(), Error>
where
    R: Read,
    W: Write,
{
    vulnerable_function(input, out, config.bounds)?;

    if config.check_flag && print_flag(&config.flag_file, out)? != Disclosure::Revealed {
        log::warn!(
            "Flag check failed, nothing was disclosed from {}",
            config.flag_file.display()
        );
    }

    out.write_all(GOODBYE.as_bytes())?;
    out.flush()?;
    Ok(())
}
